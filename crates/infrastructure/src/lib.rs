//! 基础设施层实现。
//!
//! 提供聊天日志（内存 / Postgres）与远程限流服务客户端，实现应用/领域层定义的接口。

pub mod builder;
pub mod db;
pub mod limiter;
pub mod memory;
pub mod migrations;
pub mod retry;

pub use builder::{Infrastructure, InfrastructureError};
pub use db::{create_pg_pool, PgChatLog, PgChatLogProvider};
pub use limiter::{HttpLimiterDirectory, HttpLimiterStub};
pub use memory::{MemoryChatLog, MemoryChatLogProvider};
pub use migrations::MIGRATOR;
