//! 限流客户端
//!
//! 房间协调器为每个会话持有一个客户端。`check_limit` 从不阻塞：不在冷却中时立即放行，
//! 同时在后台任务里调用限流服务并按返回值睡眠；后台任务未结束前的后续调用都返回 `false`。
//! 因此触发检查的那条消息总是被放行，被拒绝的只会是冷却期间的下一条消息。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::Identity;

use crate::error::LimiterError;

/// 指向某个身份限流 actor 的句柄
#[async_trait]
pub trait LimiterStub: Send + Sync {
    /// 推进计数器并返回需要等待的秒数
    async fn check(&self) -> Result<f64, LimiterError>;
}

/// 将身份解析为限流句柄；每次调用都返回一个新句柄
pub trait LimiterDirectory: Send + Sync {
    fn resolve(&self, identity: &Identity) -> Arc<dyn LimiterStub>;
}

/// 后台检查最终失败时的回调
pub type ErrorReporter = Arc<dyn Fn(LimiterError) + Send + Sync>;

pub struct RateLimiterClient {
    identity: Identity,
    directory: Arc<dyn LimiterDirectory>,
    limiter: Arc<Mutex<Arc<dyn LimiterStub>>>,
    in_cooldown: Arc<AtomicBool>,
    report_error: ErrorReporter,
}

impl RateLimiterClient {
    pub fn new(
        identity: Identity,
        directory: Arc<dyn LimiterDirectory>,
        report_error: ErrorReporter,
    ) -> Self {
        let limiter = directory.resolve(&identity);
        Self {
            identity,
            directory,
            limiter: Arc::new(Mutex::new(limiter)),
            in_cooldown: Arc::new(AtomicBool::new(false)),
            report_error,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn in_cooldown(&self) -> bool {
        self.in_cooldown.load(Ordering::Acquire)
    }

    /// 是否放行当前消息；放行时总会在后台发起一次限流检查
    pub fn check_limit(&self) -> bool {
        if self.in_cooldown.swap(true, Ordering::AcqRel) {
            return false;
        }

        let call = LimiterCall {
            identity: self.identity.clone(),
            directory: self.directory.clone(),
            limiter: self.limiter.clone(),
            in_cooldown: self.in_cooldown.clone(),
            report_error: self.report_error.clone(),
        };
        tokio::spawn(call.run());
        true
    }
}

struct LimiterCall {
    identity: Identity,
    directory: Arc<dyn LimiterDirectory>,
    limiter: Arc<Mutex<Arc<dyn LimiterStub>>>,
    in_cooldown: Arc<AtomicBool>,
    report_error: ErrorReporter,
}

impl LimiterCall {
    async fn run(self) {
        match self.check_with_retry().await {
            Ok(cooldown) => {
                if !cooldown.is_zero() {
                    tracing::debug!(identity = %self.identity, cooldown = ?cooldown, "进入限流冷却");
                    tokio::time::sleep(cooldown).await;
                }
                self.in_cooldown.store(false, Ordering::Release);
            }
            Err(err) => {
                tracing::warn!(identity = %self.identity, error = %err, "限流检查失败");
                (self.report_error)(err);
            }
        }
    }

    async fn check_with_retry(&self) -> Result<Duration, LimiterError> {
        let current = self.current();
        let cooldown = match current.check().await {
            Ok(cooldown) => cooldown,
            Err(err) if err.is_transport() => {
                tracing::info!(
                    identity = %self.identity,
                    error = %err,
                    "限流服务连接断开，重新获取句柄后重试"
                );
                let fresh = self.directory.resolve(&self.identity);
                *self.limiter.lock().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
                fresh.check().await?
            }
            Err(err) => return Err(err),
        };
        validate_cooldown(cooldown)
    }

    fn current(&self) -> Arc<dyn LimiterStub> {
        self.limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// 负数、NaN 以及超出 `Duration` 表示范围的秒数都视为无效响应
fn validate_cooldown(cooldown: f64) -> Result<Duration, LimiterError> {
    Duration::try_from_secs_f64(cooldown)
        .map_err(|_| LimiterError::invalid_response(cooldown.to_string()))
}
