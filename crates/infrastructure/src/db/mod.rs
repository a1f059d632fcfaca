//! Postgres 连接池与聊天日志

pub mod chat_log;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use chat_log::{PgChatLog, PgChatLogProvider};

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
