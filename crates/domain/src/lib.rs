//! 聊天室系统核心领域模型
//!
//! 包含房间、会话、聊天消息与帧格式等核心类型，以及持久化日志的端口定义。

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use value_objects::*;
