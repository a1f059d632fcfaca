use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    Clock, LimiterRegistry, RateLimitSettings, RoomRegistry, RoomRegistryDependencies,
    RoomSettings, SystemClock,
};
use futures_util::{SinkExt, StreamExt};
use infrastructure::MemoryChatLogProvider;
use serde_json::Value;
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::CloseFrame, Message as TungsteniteMessage},
    MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 绑定随机端口的测试服务，drop 时优雅关闭
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn spawn_server() -> TestServer {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiters = Arc::new(LimiterRegistry::new(
        RateLimitSettings::default(),
        clock.clone(),
    ));
    let rooms = Arc::new(RoomRegistry::new(RoomRegistryDependencies {
        chat_logs: Arc::new(MemoryChatLogProvider::new()),
        limiters: limiters.clone(),
        clock,
        settings: RoomSettings::default(),
    }));
    let app = router(AppState::new(rooms, limiters));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .ok();
    });

    TestServer {
        addr,
        shutdown: Some(shutdown_tx),
    }
}

pub async fn connect(server: &TestServer, room: &str) -> WsClient {
    let (ws, _) = connect_async(server.ws(&format!("/api/room/{room}/websocket")))
        .await
        .expect("ws connect");
    ws
}

/// 连接并声明名称，返回时已收到 ready
pub async fn join(server: &TestServer, room: &str, name: &str) -> (WsClient, Vec<Value>) {
    let mut ws = connect(server, room).await;
    send_json(&mut ws, serde_json::json!({ "name": name })).await;
    let mut frames = Vec::new();
    loop {
        let frame = next_json(&mut ws).await;
        let ready = frame.get("ready").is_some();
        frames.push(frame);
        if ready {
            return (ws, frames);
        }
    }
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(TungsteniteMessage::text(value.to_string()))
        .await
        .expect("ws send");
}

pub async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        if let TungsteniteMessage::Text(payload) = message {
            return serde_json::from_str(payload.as_str()).expect("json frame");
        }
    }
}

pub async fn next_close(ws: &mut WsClient) -> Option<CloseFrame> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close");
        match message {
            Some(Ok(TungsteniteMessage::Close(frame))) => return frame,
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}
