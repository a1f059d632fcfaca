//! 进程内聊天日志，进程退出即丢失

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::{ChatLog, ChatLogProvider, DomainResult, RoomName};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryChatLogProvider {
    logs: Mutex<HashMap<RoomName, Arc<MemoryChatLog>>>,
}

impl MemoryChatLogProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatLogProvider for MemoryChatLogProvider {
    fn open(&self, room: &RoomName) -> Arc<dyn ChatLog> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        logs.entry(room.clone()).or_default().clone()
    }
}

/// 以键排序的单房间日志
#[derive(Default)]
pub struct MemoryChatLog {
    entries: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl ChatLog for MemoryChatLog {
    async fn append(&self, key: &str, value: &str) -> DomainResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries.values().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_newest_first_up_to_limit() {
        let provider = MemoryChatLogProvider::new();
        let log = provider.open(&RoomName::parse("lobby").unwrap());
        for (key, value) in [
            ("2024-01-01T00:00:00.002Z", "b"),
            ("2024-01-01T00:00:00.001Z", "a"),
            ("2024-01-01T00:00:00.003Z", "c"),
        ] {
            log.append(key, value).await.unwrap();
        }

        assert_eq!(log.list_recent(2).await.unwrap(), vec!["c", "b"]);
        assert_eq!(log.list_recent(10).await.unwrap(), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn rooms_are_isolated_and_reopening_shares_state() {
        let provider = MemoryChatLogProvider::new();
        let lobby = RoomName::parse("lobby").unwrap();
        provider
            .open(&lobby)
            .append("2024-01-01T00:00:00.000Z", "hello")
            .await
            .unwrap();

        assert_eq!(provider.open(&lobby).list_recent(1).await.unwrap().len(), 1);
        assert!(provider
            .open(&RoomName::parse("elsewhere").unwrap())
            .list_recent(1)
            .await
            .unwrap()
            .is_empty());
    }
}
