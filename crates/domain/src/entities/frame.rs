//! WebSocket 帧定义
//!
//! 客户端只有两种形状：首帧为身份声明 `{ "name": string }`，其后均为聊天提交
//! `{ "message": string }`。帧的含义取决于会话是否已命名，因此解析时需要调用方
//! 给出期望的形状。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::message::ChatMessage;
use crate::errors::{DomainError, DomainResult};

/// 调用方期望的客户端帧形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameExpectation {
    /// 会话尚未命名，帧为身份声明
    Identity,
    /// 会话已命名，帧为聊天提交
    Chat,
}

/// 客户端帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// 身份声明，名称可缺省
    Identify { name: Option<String> },
    /// 聊天提交，正文由上层校验
    Chat { message: Option<String> },
}

impl ClientFrame {
    pub fn parse(raw: &str, expectation: FrameExpectation) -> DomainResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| DomainError::invalid_frame(err.to_string()))?;
        let fields = match value {
            Value::Object(fields) => fields,
            _ => return Err(DomainError::invalid_frame("expected a JSON object")),
        };

        match expectation {
            FrameExpectation::Identity => Ok(Self::Identify {
                name: optional_string(&fields, "name")?,
            }),
            FrameExpectation::Chat => Ok(Self::Chat {
                message: optional_string(&fields, "message")?,
            }),
        }
    }
}

fn optional_string(fields: &Map<String, Value>, key: &str) -> DomainResult<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(DomainError::invalid_frame(format!(
            "`{key}` must be a string"
        ))),
    }
}

/// 服务端帧，序列化时不带类型标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// 聊天消息（历史回放或实时）
    Chat(ChatMessage),
    /// 用户加入
    Joined { joined: String },
    /// 用户离开
    Quit { quit: String },
    /// 仅发给发起连接的非致命提示
    Error { error: String },
    /// 身份被接受、历史已回放完毕
    Ready { ready: bool },
}

impl ServerFrame {
    pub fn joined(name: impl Into<String>) -> Self {
        Self::Joined {
            joined: name.into(),
        }
    }

    pub fn quit(name: impl Into<String>) -> Self {
        Self::Quit { quit: name.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn ready() -> Self {
        Self::Ready { ready: true }
    }

    pub fn to_json(&self) -> DomainResult<String> {
        serde_json::to_string(self).map_err(|err| DomainError::invalid_frame(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_frame_with_and_without_name() {
        assert_eq!(
            ClientFrame::parse(r#"{"name":"alice"}"#, FrameExpectation::Identity).unwrap(),
            ClientFrame::Identify {
                name: Some("alice".into())
            }
        );
        assert_eq!(
            ClientFrame::parse("{}", FrameExpectation::Identity).unwrap(),
            ClientFrame::Identify { name: None }
        );
    }

    #[test]
    fn chat_frame_ignores_unrelated_fields() {
        assert_eq!(
            ClientFrame::parse(r#"{"message":"hi","name":"x"}"#, FrameExpectation::Chat).unwrap(),
            ClientFrame::Chat {
                message: Some("hi".into())
            }
        );
    }

    #[test]
    fn malformed_frames_are_validation_failures() {
        for raw in ["not json", "[1,2]", "\"text\"", r#"{"message":7}"#] {
            let result = ClientFrame::parse(raw, FrameExpectation::Chat);
            assert!(
                matches!(result, Err(DomainError::InvalidFrame { .. })),
                "{raw} should be rejected"
            );
        }
        assert!(ClientFrame::parse(r#"{"name":true}"#, FrameExpectation::Identity).is_err());
    }

    #[test]
    fn server_frames_serialize_without_tags() {
        let cases = [
            (ServerFrame::joined("a"), r#"{"joined":"a"}"#),
            (ServerFrame::quit("a"), r#"{"quit":"a"}"#),
            (ServerFrame::error("boom"), r#"{"error":"boom"}"#),
            (ServerFrame::ready(), r#"{"ready":true}"#),
        ];
        for (frame, expected) in cases {
            assert_eq!(frame.to_json().unwrap(), expected);
        }
    }

    #[test]
    fn server_frames_deserialize_by_shape() {
        let chat: ServerFrame =
            serde_json::from_str(r#"{"name":"a","message":"m","timestamp":5}"#).unwrap();
        assert!(matches!(chat, ServerFrame::Chat(ChatMessage { timestamp: 5, .. })));
        let joined: ServerFrame = serde_json::from_str(r#"{"joined":"a"}"#).unwrap();
        assert_eq!(joined, ServerFrame::joined("a"));
    }
}
