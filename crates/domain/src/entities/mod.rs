//! 领域实体定义
//!
//! 包含聊天消息、客户端/服务端帧以及可序列化的会话描述。

pub mod frame;
pub mod message;
pub mod session;

// 重新导出核心实体
pub use frame::{ClientFrame, FrameExpectation, ServerFrame};
pub use message::ChatMessage;
pub use session::SessionDescriptor;
