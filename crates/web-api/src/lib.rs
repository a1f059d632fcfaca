//! Web API 层。
//!
//! 提供 Axum 路由：房间创建、房间 WebSocket 以及进程内限流服务的 HTTP 接口。

mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
