use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{DisplayName, MessageBody};

/// 已被房间接受的聊天消息，创建后不可变。
///
/// `timestamp` 为毫秒级 Unix 时间，同一房间内严格递增。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub name: String,
    pub message: String,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(name: &DisplayName, body: MessageBody, timestamp: i64) -> Self {
        Self {
            name: name.as_str().to_owned(),
            message: body.into_inner(),
            timestamp,
        }
    }

    /// 持久化键：定宽 ISO-8601（UTC，毫秒精度），字典序与时间顺序一致。
    pub fn storage_key(&self) -> DomainResult<String> {
        DateTime::from_timestamp_millis(self.timestamp)
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .ok_or_else(|| {
                DomainError::validation_error("timestamp", "out of representable range")
            })
    }

    pub fn to_json(&self) -> DomainResult<String> {
        serde_json::to_string(self).map_err(|err| DomainError::storage(err.to_string()))
    }

    pub fn from_json(raw: &str) -> DomainResult<Self> {
        serde_json::from_str(raw).map_err(|err| DomainError::storage(err.to_string()))
    }
}
