use std::sync::Arc;

use domain::{DisplayName, SessionDescriptor, SessionId};
use thiserror::Error;

use crate::limiter_client::RateLimiterClient;

/// WebSocket 关闭码：策略违规
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// WebSocket 关闭码：服务端内部错误
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// 向连接发送失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,
}

/// 会话的出站传输
///
/// `send` 不阻塞，失败即视为连接已断开。
pub trait SessionSink: Send + Sync {
    fn send(&self, text: &str) -> Result<(), TransportError>;

    fn close(&self, code: u16, reason: &str);

    /// 保存最新的会话描述，供房间 actor 重启后恢复
    fn save_descriptor(&self, descriptor: &SessionDescriptor);
}

/// 会话断开原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// 客户端主动关闭
    ClientClosed,
    /// 连接读取出错
    SocketError(String),
    /// 名称过长被强制关闭
    PolicyViolation,
    /// 发送失败
    TransportFailure,
    /// 限流服务不可用
    LimiterFailure(String),
}

/// 单个连接在房间内的记录，只属于其房间协调器
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) sink: Arc<dyn SessionSink>,
    pub(crate) name: Option<DisplayName>,
    pub(crate) limiter: RateLimiterClient,
    /// 命名之前暂存的出站消息
    pub(crate) blocked_messages: Vec<String>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        sink: Arc<dyn SessionSink>,
        limiter: RateLimiterClient,
    ) -> Self {
        Self {
            id,
            sink,
            name: None,
            limiter,
            blocked_messages: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> Option<&DisplayName> {
        self.name.as_ref()
    }

    pub fn blocked_messages(&self) -> &[String] {
        &self.blocked_messages
    }

    pub fn descriptor(&self) -> SessionDescriptor {
        SessionDescriptor {
            identity: self.limiter.identity().clone(),
            name: self.name.clone(),
        }
    }
}
