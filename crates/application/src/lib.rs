//! 应用层实现。
//!
//! 房间协调器、按身份的限流 actor 以及限流客户端。外部适配器（持久化日志、
//! 远程限流服务、WebSocket 连接）通过这里定义的端口接入。

pub mod clock;
pub mod error;
pub mod limiter_client;
pub mod rate_limiter;
pub mod room;

pub use clock::{Clock, SystemClock};
pub use error::{LimiterError, RoomError};
pub use limiter_client::{ErrorReporter, LimiterDirectory, LimiterStub, RateLimiterClient};
pub use rate_limiter::{LimiterRegistry, LocalLimiterStub, RateLimitSettings, RateLimiter};
pub use room::{
    DisconnectCause, RoomCoordinator, RoomDependencies, RoomHandle, RoomRegistry,
    RoomRegistryDependencies, RoomSettings, Session, SessionSink, TransportError,
    CLOSE_INTERNAL_ERROR, CLOSE_POLICY_VIOLATION,
};
