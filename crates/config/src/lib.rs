//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 房间协调器参数
//! - 限流参数与限流服务位置
//! - 持久化日志后端
//!
//! 加载优先级：默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> 环境变量（`APP_*`，
//! 以 `__` 分隔嵌套字段）。

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// 全局应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 服务配置
    #[validate(nested)]
    pub server: ServerConfig,
    /// 房间配置
    #[validate(nested)]
    pub room: RoomConfig,
    /// 限流配置
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    /// 持久化配置
    #[validate(nested)]
    pub storage: StorageConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8787,
        }
    }
}

/// 房间协调器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RoomConfig {
    /// 新会话加入时回放的最近消息条数
    #[validate(range(min = 1, max = 10000))]
    pub history_limit: usize,
    #[validate(range(min = 1))]
    pub max_name_chars: usize,
    #[validate(range(min = 1))]
    pub max_message_chars: usize,
    /// 房间 actor 邮箱容量
    #[validate(range(min = 1))]
    pub mailbox_capacity: usize,
    /// 没有会话的房间 actor 空闲多久后退出（秒）
    #[validate(range(min = 1))]
    pub idle_timeout_secs: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            max_name_chars: 32,
            max_message_chars: 256,
            mailbox_capacity: 256,
            idle_timeout_secs: 300,
        }
    }
}

/// 限流服务所在位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterMode {
    /// 进程内的限流 actor
    Local,
    /// 通过 HTTP 访问的独立限流服务
    Remote,
}

/// 限流配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_rate_limit"))]
pub struct RateLimitConfig {
    /// 每条消息推进的冷却时间（秒）
    #[validate(range(min = 0.0))]
    pub cooldown_period_secs: f64,
    /// 初始宽限额度（秒）
    #[validate(range(min = 0.0))]
    pub grace_period_secs: f64,
    pub mode: LimiterMode,
    /// `remote` 模式下的限流服务地址
    pub service_url: Option<String>,
    /// 已回到初始状态的限流 actor 空闲多久后退出（秒）
    #[validate(range(min = 1))]
    pub idle_timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cooldown_period_secs: 5.0,
            grace_period_secs: 20.0,
            mode: LimiterMode::Local,
            service_url: None,
            idle_timeout_secs: 60,
        }
    }
}

fn validate_rate_limit(config: &RateLimitConfig) -> Result<(), ValidationError> {
    if config.mode == LimiterMode::Remote && config.service_url.is_none() {
        return Err(ValidationError::new("service_url_required"));
    }
    Ok(())
}

/// 持久化日志后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

/// 持久化配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_storage"))]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 5,
        }
    }
}

fn validate_storage(config: &StorageConfig) -> Result<(), ValidationError> {
    if config.backend == StorageBackend::Postgres && config.database_url.is_none() {
        return Err(ValidationError::new("database_url_required"));
    }
    Ok(())
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

impl AppConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的顺序加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 构建分层配置源
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(fig: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = fig.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 返回适合写入日志的配置摘要（隐藏数据库密码）
    pub fn sanitize(&self) -> String {
        let database = self
            .storage
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "-".to_string());
        format!(
            "server={} storage={:?}({}) limiter={:?} cooldown={}s grace={}s history={}",
            self.bind_addr(),
            self.storage.backend,
            database,
            self.rate_limit.mode,
            self.rate_limit.cooldown_period_secs,
            self.rate_limit.grace_period_secs,
            self.room.history_limit,
        )
    }
}

fn mask_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    match rest[..at].find(':') {
        Some(colon) => format!(
            "{}://{}:***{}",
            &url[..scheme_end],
            &rest[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}
