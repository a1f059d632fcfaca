use std::sync::{Arc, Mutex, PoisonError};

use application::{DisconnectCause, RoomError, RoomHandle, SessionSink, TransportError};
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use domain::{Identity, RoomName, SessionDescriptor, SessionId};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;

/// 关闭帧原因字段的字节上限
const MAX_CLOSE_REASON_BYTES: usize = 123;

/// 单个 WebSocket 连接
///
/// 读循环把文本帧转交给房间 actor；所有写操作经由 [`ChannelSink`] 进入写任务。
/// 房间 actor 不可用时重新解析房间并用保存的会话描述恢复会话。
pub struct RoomConnection {
    socket: WebSocket,
    state: AppState,
    room: RoomName,
    identity: Identity,
    session_id: SessionId,
}

impl RoomConnection {
    pub fn new(socket: WebSocket, state: AppState, room: RoomName, identity: Identity) -> Self {
        Self {
            socket,
            state,
            room,
            identity,
            session_id: SessionId::new(),
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            state,
            room: room_name,
            identity,
            session_id,
        } = self;
        tracing::info!(room = %room_name, session_id = %session_id, identity = %identity, "WebSocket 连接已建立");

        let (mut sender, mut incoming) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let sink = Arc::new(ChannelSink::new(outbound_tx));

        // 写任务：统一处理所有对 WebSocket sender 的写操作
        let mut writer = tokio::spawn(async move {
            while let Some(outbound) = outbound_rx.recv().await {
                match outbound {
                    Outbound::Text(text) => {
                        if sender.send(WsMessage::Text(text.into())).await.is_err() {
                            tracing::warn!("Failed to send text message");
                            break;
                        }
                    }
                    Outbound::Close { code, reason } => {
                        let frame = CloseFrame {
                            code,
                            reason: reason.into(),
                        };
                        let _ = sender.send(WsMessage::Close(Some(frame))).await;
                        break;
                    }
                }
            }
        });

        let mut link = RoomLink {
            state,
            room_name,
            identity,
            session_id,
            sink: sink.clone(),
            room: None,
        };
        if let Err(err) = link.admit().await {
            tracing::warn!(session_id = %session_id, error = %err, "无法加入房间");
            sink.close(application::CLOSE_INTERNAL_ERROR, "Room unavailable.");
            let _ = writer.await;
            return;
        }

        let cause = loop {
            tokio::select! {
                message = incoming.next() => match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Err(err) = link.forward(text.as_str().to_owned()).await {
                            tracing::warn!(session_id = %session_id, error = %err, "房间不可用");
                            sink.close(application::CLOSE_INTERNAL_ERROR, "Room unavailable.");
                            break DisconnectCause::SocketError(err.to_string());
                        }
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        tracing::debug!(session_id = %session_id, "忽略二进制帧");
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break DisconnectCause::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break DisconnectCause::SocketError(err.to_string()),
                },
                _ = &mut writer => break DisconnectCause::TransportFailure,
            }
        };

        tracing::info!(session_id = %session_id, cause = ?cause, "WebSocket 连接已断开");
        link.disconnect(cause).await;
        drop(link);
        drop(sink);
        writer.abort();
    }
}

/// 连接与其房间 actor 的关联
struct RoomLink {
    state: AppState,
    room_name: RoomName,
    identity: Identity,
    session_id: SessionId,
    sink: Arc<ChannelSink>,
    room: Option<RoomHandle>,
}

impl RoomLink {
    async fn admit(&mut self) -> Result<(), RoomError> {
        let sink: Arc<dyn SessionSink> = self.sink.clone();
        let first = self.resolve();
        match first
            .admit(self.session_id, self.identity.clone(), sink.clone())
            .await
        {
            Err(RoomError::RoomUnavailable) => {
                self.room = None;
                self.resolve()
                    .admit(self.session_id, self.identity.clone(), sink)
                    .await
            }
            other => other,
        }
    }

    async fn forward(&mut self, text: String) -> Result<(), RoomError> {
        let Err(text) = self.resolve().deliver_frame(self.session_id, text).await else {
            return Ok(());
        };
        tracing::warn!(room = %self.room_name, session_id = %self.session_id, "房间 actor 已退出，恢复会话");
        self.room = None;
        let room = self.resolve();
        let descriptor = self
            .sink
            .descriptor()
            .unwrap_or_else(|| SessionDescriptor::new(self.identity.clone()));
        room.restore(self.session_id, descriptor, self.sink.clone())
            .await?;
        room.frame(self.session_id, text).await
    }

    async fn disconnect(&mut self, cause: DisconnectCause) {
        if let Some(room) = self.room.take() {
            if let Err(err) = room.disconnect(self.session_id, cause).await {
                tracing::debug!(session_id = %self.session_id, error = %err, "断开时房间已不可用");
            }
        }
    }

    fn resolve(&mut self) -> RoomHandle {
        match &self.room {
            Some(room) if !room.is_closed() => room.clone(),
            _ => {
                let room = self.state.rooms.room(&self.room_name);
                self.room = Some(room.clone());
                room
            }
        }
    }
}

/// 写任务命令
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// 房间协调器看到的连接
struct ChannelSink {
    outbound: mpsc::UnboundedSender<Outbound>,
    /// 会话描述的 JSON 编码
    descriptor: Mutex<Option<String>>,
}

impl ChannelSink {
    fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            outbound,
            descriptor: Mutex::new(None),
        }
    }

    fn descriptor(&self) -> Option<SessionDescriptor> {
        let raw = self
            .descriptor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        match serde_json::from_str(&raw) {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                tracing::warn!(error = %err, "会话描述已损坏");
                None
            }
        }
    }
}

impl SessionSink for ChannelSink {
    fn send(&self, text: &str) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(text.to_owned()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.outbound.send(Outbound::Close {
            code,
            reason: truncate_reason(reason),
        });
    }

    fn save_descriptor(&self, descriptor: &SessionDescriptor) {
        match serde_json::to_string(descriptor) {
            Ok(raw) => {
                *self
                    .descriptor
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(raw)
            }
            Err(err) => tracing::warn!(error = %err, "无法保存会话描述"),
        }
    }
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_CLOSE_REASON_BYTES {
        return reason.to_owned();
    }
    let mut end = MAX_CLOSE_REASON_BYTES;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_owned()
}
