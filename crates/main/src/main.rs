//! 主应用程序入口
//!
//! 按配置组装房间注册表与限流服务，启动 Axum Web API 服务。

use std::{net::SocketAddr, sync::Arc};

use application::{Clock, RoomRegistry, RoomRegistryDependencies, RoomSettings, SystemClock};
use config::AppConfig;
use infrastructure::Infrastructure;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "配置已加载");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let infra = Infrastructure::connect(&config, clock.clone()).await?;

    let rooms = Arc::new(RoomRegistry::new(RoomRegistryDependencies {
        chat_logs: infra.chat_logs.clone(),
        limiters: infra.limiters.clone(),
        clock,
        settings: RoomSettings::from(&config.room),
    }));
    let state = AppState::new(rooms, infra.local_limiters.clone());

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("聊天服务启动在 http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听退出信号");
    }
}
