//! Repository接口定义
//!
//! 定义持久化日志的抽象接口，内层定义接口，外层实现接口。

pub mod chat_log;

pub use chat_log::{ChatLog, ChatLogProvider};

#[cfg(any(test, feature = "testing"))]
pub use chat_log::MockChatLog;
