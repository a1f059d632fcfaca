use std::sync::Arc;

use async_trait::async_trait;
use domain::{ChatLog, ChatLogProvider, DomainError, DomainResult, RoomName};
use sqlx::PgPool;

fn map_sqlx_err(err: sqlx::Error) -> DomainError {
    DomainError::storage(err.to_string())
}

/// 所有房间共用一张 `chat_log` 表，按 `(room, key)` 区分
#[derive(Clone)]
pub struct PgChatLogProvider {
    pool: PgPool,
}

impl PgChatLogProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ChatLogProvider for PgChatLogProvider {
    fn open(&self, room: &RoomName) -> Arc<dyn ChatLog> {
        Arc::new(PgChatLog {
            pool: self.pool.clone(),
            room: room.as_str().to_owned(),
        })
    }
}

pub struct PgChatLog {
    pool: PgPool,
    room: String,
}

#[async_trait]
impl ChatLog for PgChatLog {
    async fn append(&self, key: &str, value: &str) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO chat_log (room, key, value) VALUES ($1, $2, $3)
               ON CONFLICT (room, key) DO UPDATE SET value = EXCLUDED.value"#,
        )
        .bind(&self.room)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<String>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query_scalar::<_, String>(
            r#"SELECT value FROM chat_log WHERE room = $1 ORDER BY key DESC LIMIT $2"#,
        )
        .bind(&self.room)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }
}
