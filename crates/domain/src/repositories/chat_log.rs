//! 房间持久化日志接口

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::DomainResult;
use crate::value_objects::RoomName;

/// 单个房间的只追加有序日志
///
/// 键为字典序与时间顺序一致的时间戳字符串，值为聊天消息的 JSON 编码。
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChatLog: Send + Sync {
    /// 追加一条记录
    async fn append(&self, key: &str, value: &str) -> DomainResult<()>;

    /// 按键倒序返回最多 `limit` 条记录（最新的在前）
    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<String>>;
}

/// 按房间打开日志，不同房间之间不共享
pub trait ChatLogProvider: Send + Sync {
    fn open(&self, room: &RoomName) -> Arc<dyn ChatLog>;
}
