use std::net::SocketAddr;

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, Path, State},
    http::HeaderMap,
    response::Response,
    routing::{any, get, post},
    Router,
};
use domain::{Identity, RoomName};
use tower_http::trace::TraceLayer;

use crate::{error::ApiError, state::AppState, ws_connection::RoomConnection};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .nest("/limiters", limiter_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/room", post(create_room))
        .route("/room/{room}/websocket", get(room_websocket))
}

fn limiter_routes() -> Router<AppState> {
    Router::new()
        .route("/{identity}/check", post(check_limit).get(peek_limit))
        .route("/{identity}/config", any(not_implemented))
        .route("/{identity}/stats", any(not_implemented))
        .route("/{identity}/reset", any(not_implemented))
}

async fn health() -> &'static str {
    "ok"
}

/// 生成一个新的私有房间 ID（纯文本）
async fn create_room() -> String {
    RoomName::unique().to_string()
}

async fn room_websocket(
    State(state): State<AppState>,
    Path(room): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let room = RoomName::parse(room).map_err(|err| ApiError::not_found(err.to_string()))?;
    let identity = client_identity(&headers, peer);
    tracing::debug!(room = %room, identity = %identity, "WebSocket 升级请求");

    Ok(ws.on_upgrade(move |socket| RoomConnection::new(socket, state, room, identity).run()))
}

/// 限流身份：优先 `CF-Connecting-IP`，其次 `X-Forwarded-For` 的第一项，最后是对端地址
fn client_identity(headers: &HeaderMap, peer: SocketAddr) -> Identity {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    header("cf-connecting-ip")
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|value| value.split(',').next().map(str::to_owned))
        })
        .and_then(|raw| Identity::parse(raw).ok())
        .unwrap_or_else(|| Identity::from(peer.ip()))
}

async fn check_limit(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<String, ApiError> {
    let identity = Identity::parse(identity).map_err(|err| ApiError::bad_request(err.to_string()))?;
    let cooldown = state.limiters.check(&identity).await?;
    Ok(cooldown.to_string())
}

async fn peek_limit(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<String, ApiError> {
    let identity = Identity::parse(identity).map_err(|err| ApiError::bad_request(err.to_string()))?;
    let cooldown = state.limiters.peek(&identity).await?;
    Ok(cooldown.to_string())
}

async fn not_implemented() -> ApiError {
    ApiError::not_implemented()
}
