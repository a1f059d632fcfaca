//! 领域模型错误定义
//!
//! 定义了系统中所有可能的错误类型，错误文本会原样返回给发起连接。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 帧无法解析（非 JSON、非对象、字段类型错误）
    #[error("Invalid frame: {message}")]
    InvalidFrame { message: String },

    /// 显示名称超出长度限制
    #[error("Name too long.")]
    NameTooLong { max: usize },

    /// 聊天消息缺失或为空
    #[error("Message is required.")]
    MessageRequired,

    /// 聊天消息超出长度限制
    #[error("Message too long (max {max} characters).")]
    MessageTooLong { max: usize },

    /// 验证错误
    #[error("{field}: {message}")]
    ValidationError { field: String, message: String },

    /// 持久化存储错误
    #[error("storage error: {message}")]
    StorageError { message: String },
}

impl DomainError {
    /// 创建帧解析错误
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建存储错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
