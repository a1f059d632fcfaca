use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 显示名称的默认最大字符数。
pub const MAX_NAME_CHARS: usize = 32;
/// 聊天消息的默认最大字符数。
pub const MAX_MESSAGE_CHARS: usize = 256;
/// 身份帧未携带名称时使用的名称。
pub const DEFAULT_DISPLAY_NAME: &str = "anonymous";

const MAX_IDENTITY_LEN: usize = 128;
const UNIQUE_ROOM_ID_LEN: usize = 64;

/// 房间内单个连接的唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// 限流身份，由客户端的网络来源派生。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::validation_error("identity", "cannot be empty"));
        }
        if value.len() > MAX_IDENTITY_LEN {
            return Err(DomainError::validation_error("identity", "too long"));
        }
        if value.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(DomainError::validation_error(
                "identity",
                "contains illegal characters",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for Identity {
    fn from(value: IpAddr) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for Identity {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 经过验证的显示名称。
///
/// 长度按 Unicode 标量值计数。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// 解析身份帧中的名称；缺失或为空时回退为 `anonymous`。
    pub fn parse(value: Option<String>, max_chars: usize) -> DomainResult<Self> {
        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => DEFAULT_DISPLAY_NAME.to_owned(),
        };
        if value.chars().count() > max_chars {
            return Err(DomainError::NameTooLong { max: max_chars });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(Some(value), MAX_NAME_CHARS)
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 经过验证的聊天消息正文。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    pub fn parse(value: Option<String>, max_chars: usize) -> DomainResult<Self> {
        let value = match value {
            Some(value) if !value.is_empty() => value,
            _ => return Err(DomainError::MessageRequired),
        };
        if value.chars().count() > max_chars {
            return Err(DomainError::MessageTooLong { max: max_chars });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// 房间名称：64 位小写十六进制的唯一 ID，或不超过 32 个字符的具名房间。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if Self::looks_unique(&value) {
            return Ok(Self(value));
        }
        if value.is_empty() {
            return Err(DomainError::validation_error("room", "cannot be empty"));
        }
        if value.chars().count() > MAX_NAME_CHARS {
            return Err(DomainError::validation_error("room", "invalid room id"));
        }
        Ok(Self(value))
    }

    /// 生成新的私有房间 ID。
    pub fn unique() -> Self {
        Self(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        ))
    }

    pub fn is_unique_id(&self) -> bool {
        Self::looks_unique(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn looks_unique(value: &str) -> bool {
        value.len() == UNIQUE_ROOM_ID_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }
}

impl TryFrom<String> for RoomName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomName> for String {
    fn from(value: RoomName) -> Self {
        value.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
