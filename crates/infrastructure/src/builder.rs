use std::sync::Arc;

use application::{Clock, LimiterDirectory, LimiterRegistry, RateLimitSettings};
use config::{AppConfig, LimiterMode, StorageBackend, StorageConfig};
use domain::ChatLogProvider;
use thiserror::Error;

use crate::{
    db::{create_pg_pool, PgChatLogProvider},
    limiter::HttpLimiterDirectory,
    memory::MemoryChatLogProvider,
    migrations::MIGRATOR,
    retry::{retry_async, RetryConfig},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("missing setting: {0}")]
    MissingSetting(&'static str),
}

/// 按配置组装好的适配器
#[derive(Clone)]
pub struct Infrastructure {
    pub chat_logs: Arc<dyn ChatLogProvider>,
    /// 房间协调器使用的限流目录（本地或远程）
    pub limiters: Arc<dyn LimiterDirectory>,
    /// 本进程托管的限流 actor，供 `/limiters` 路由使用
    pub local_limiters: Arc<LimiterRegistry>,
}

impl Infrastructure {
    pub async fn connect(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, InfrastructureError> {
        let chat_logs = connect_storage(&config.storage).await?;
        let local_limiters = Arc::new(LimiterRegistry::new(
            RateLimitSettings::from(&config.rate_limit),
            clock,
        ));

        let limiters: Arc<dyn LimiterDirectory> = match config.rate_limit.mode {
            LimiterMode::Local => local_limiters.clone(),
            LimiterMode::Remote => {
                let url = config
                    .rate_limit
                    .service_url
                    .as_deref()
                    .ok_or(InfrastructureError::MissingSetting("rate_limit.service_url"))?;
                tracing::info!(service_url = %url, "使用远程限流服务");
                Arc::new(HttpLimiterDirectory::new(url)?)
            }
        };

        Ok(Self {
            chat_logs,
            limiters,
            local_limiters,
        })
    }
}

async fn connect_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn ChatLogProvider>, InfrastructureError> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("使用内存聊天日志，重启后历史将丢失");
            Ok(Arc::new(MemoryChatLogProvider::new()))
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(InfrastructureError::MissingSetting("storage.database_url"))?;
            let pool = retry_async(&RetryConfig::startup(), is_transient, || {
                create_pg_pool(url, config.max_connections)
            })
            .await?;
            MIGRATOR.run(&pool).await?;
            tracing::info!("聊天日志数据库已就绪");
            Ok(Arc::new(PgChatLogProvider::new(pool)))
        }
    }
}

fn is_transient(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}
