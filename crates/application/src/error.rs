use domain::DomainError;
use thiserror::Error;

use crate::room::session::TransportError;

/// 房间内单帧处理的错误分类
///
/// 所有错误都只作用于引发它的连接或帧，房间 actor 本身没有致命错误路径。
#[derive(Debug, Error)]
pub enum RoomError {
    /// 帧格式错误、正文为空或过长：仅通知发送方，连接保持
    #[error("{0}")]
    Validation(DomainError),
    /// 名称过长：通知发送方后强制关闭连接
    #[error("{0}")]
    PolicyViolation(DomainError),
    /// 被限流：通知发送方并丢弃消息
    #[error("Your IP is being rate-limited, please try again later.")]
    RateLimited,
    /// 向某个连接发送失败，视为该连接断开
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// 持久化或限流服务不可用
    #[error("{0}")]
    Infrastructure(String),
    /// 房间 actor 的邮箱已关闭
    #[error("room is unavailable")]
    RoomUnavailable,
}

impl RoomError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        RoomError::Infrastructure(message.into())
    }

    /// 是否应当以 `{ "error": ... }` 帧告知发起连接
    pub fn notifies_sender(&self) -> bool {
        matches!(
            self,
            RoomError::Validation(_) | RoomError::RateLimited | RoomError::Infrastructure(_)
        )
    }
}

impl From<DomainError> for RoomError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NameTooLong { .. } => RoomError::PolicyViolation(value),
            DomainError::StorageError { message } => RoomError::Infrastructure(message),
            other => RoomError::Validation(other),
        }
    }
}

/// 限流服务调用错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LimiterError {
    #[error("rate limiter unreachable: {0}")]
    Transport(String),
    #[error("rate limiter returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl LimiterError {
    pub fn transport(message: impl Into<String>) -> Self {
        LimiterError::Transport(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        LimiterError::InvalidResponse(message.into())
    }

    /// 只有传输层失败才值得换一个句柄重试
    pub fn is_transport(&self) -> bool {
        matches!(self, LimiterError::Transport(_))
    }
}
