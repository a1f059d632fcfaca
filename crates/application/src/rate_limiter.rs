//! 按身份的限流 actor
//!
//! 每个身份只维护一个 `next_allowed_time` 计数器。每次检查都把计数器从
//! `max(now, next_allowed_time)` 向后推进一个冷却周期，并返回超出宽限额度的部分。
//! 每个身份由独立的 actor 任务串行处理，身份之间互不影响。计数器追上墙钟后的 actor
//! 与新建的没有区别，空闲超时后即退出。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::Identity;
use tokio::sync::{mpsc, oneshot};

use crate::clock::Clock;
use crate::error::LimiterError;
use crate::limiter_client::{LimiterDirectory, LimiterStub};

const LIMITER_MAILBOX_CAPACITY: usize = 32;

/// 限流参数（秒）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    pub cooldown_period: f64,
    pub grace_period: f64,
    pub idle_timeout: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            cooldown_period: 5.0,
            grace_period: 20.0,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&config::RateLimitConfig> for RateLimitSettings {
    fn from(value: &config::RateLimitConfig) -> Self {
        Self {
            cooldown_period: value.cooldown_period_secs,
            grace_period: value.grace_period_secs,
            idle_timeout: Duration::from_secs(value.idle_timeout_secs),
        }
    }
}

/// 单个身份的限流状态
pub struct RateLimiter {
    next_allowed_time: f64,
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            next_allowed_time: 0.0,
            settings,
            clock,
        }
    }

    /// 记录一次消息并返回需要等待的秒数
    pub fn check(&mut self) -> f64 {
        let now = self.catch_up();
        self.next_allowed_time += self.settings.cooldown_period;
        self.cooldown_at(now)
    }

    /// 只查询当前冷却，不推进计数器
    pub fn peek(&mut self) -> f64 {
        let now = self.catch_up();
        self.cooldown_at(now)
    }

    pub fn next_allowed_time(&self) -> f64 {
        self.next_allowed_time
    }

    /// 计数器已不超前于当前时间，状态等同于新建
    pub fn is_idle(&self) -> bool {
        self.next_allowed_time <= self.clock.now_secs()
    }

    fn catch_up(&mut self) -> f64 {
        let now = self.clock.now_secs();
        self.next_allowed_time = self.next_allowed_time.max(now);
        now
    }

    fn cooldown_at(&self, now: f64) -> f64 {
        (self.next_allowed_time - now - self.settings.grace_period).max(0.0)
    }
}

enum LimiterCommand {
    Check { reply: oneshot::Sender<f64> },
    Peek { reply: oneshot::Sender<f64> },
}

fn spawn_limiter(
    identity: Identity,
    mut limiter: RateLimiter,
    idle_timeout: Duration,
) -> mpsc::Sender<LimiterCommand> {
    let (tx, mut rx) = mpsc::channel(LIMITER_MAILBOX_CAPACITY);
    tokio::spawn(async move {
        tracing::debug!(identity = %identity, "限流 actor 已启动");
        loop {
            match tokio::time::timeout(idle_timeout, rx.recv()).await {
                Ok(Some(LimiterCommand::Check { reply })) => {
                    let _ = reply.send(limiter.check());
                }
                Ok(Some(LimiterCommand::Peek { reply })) => {
                    let _ = reply.send(limiter.peek());
                }
                Ok(None) => break,
                Err(_) if limiter.is_idle() => break,
                Err(_) => {}
            }
        }
        // 丢弃邮箱：尚未处理的请求以传输错误返回，调用方重新解析后会启动新的 actor
        tracing::debug!(identity = %identity, "限流 actor 已退出");
    });
    tx
}

/// 进程内的限流 actor 注册表
///
/// 首次访问某个身份时启动其 actor；actor 已退出时重新启动一个空状态的 actor，
/// 同时清理其它已退出 actor 的条目。
pub struct LimiterRegistry {
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
    actors: Mutex<HashMap<Identity, mpsc::Sender<LimiterCommand>>>,
}

impl LimiterRegistry {
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            actors: Mutex::new(HashMap::new()),
        }
    }

    /// 推进计数器并返回冷却秒数
    pub async fn check(&self, identity: &Identity) -> Result<f64, LimiterError> {
        self.ask(identity, |reply| LimiterCommand::Check { reply })
            .await
    }

    /// 查询冷却秒数，不推进计数器
    pub async fn peek(&self, identity: &Identity) -> Result<f64, LimiterError> {
        self.ask(identity, |reply| LimiterCommand::Peek { reply })
            .await
    }

    /// 存活的限流 actor 数量
    pub fn len(&self) -> usize {
        let mut actors = self.actors.lock().unwrap_or_else(PoisonError::into_inner);
        actors.retain(|_, mailbox| !mailbox.is_closed());
        actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// actor 恰好因空闲退出时，请求以传输错误失败；换新的 actor 再试一次
    async fn ask(
        &self,
        identity: &Identity,
        command: impl Fn(oneshot::Sender<f64>) -> LimiterCommand,
    ) -> Result<f64, LimiterError> {
        match request(&self.mailbox(identity), &command).await {
            Err(err) if err.is_transport() => request(&self.mailbox(identity), &command).await,
            other => other,
        }
    }

    fn mailbox(&self, identity: &Identity) -> mpsc::Sender<LimiterCommand> {
        let mut actors = self.actors.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mailbox) = actors.get(identity) {
            if !mailbox.is_closed() {
                return mailbox.clone();
            }
            tracing::debug!(identity = %identity, "限流 actor 已退出，重新启动");
        }
        actors.retain(|_, mailbox| !mailbox.is_closed());
        let mailbox = spawn_limiter(
            identity.clone(),
            RateLimiter::new(self.settings, self.clock.clone()),
            self.settings.idle_timeout,
        );
        actors.insert(identity.clone(), mailbox.clone());
        mailbox
    }
}

async fn request(
    mailbox: &mpsc::Sender<LimiterCommand>,
    command: impl FnOnce(oneshot::Sender<f64>) -> LimiterCommand,
) -> Result<f64, LimiterError> {
    let (reply, response) = oneshot::channel();
    mailbox
        .send(command(reply))
        .await
        .map_err(|_| LimiterError::transport("limiter actor is gone"))?;
    response
        .await
        .map_err(|_| LimiterError::transport("limiter actor dropped the request"))
}

/// 指向某个进程内限流 actor 的句柄
pub struct LocalLimiterStub {
    mailbox: mpsc::Sender<LimiterCommand>,
}

#[async_trait]
impl LimiterStub for LocalLimiterStub {
    async fn check(&self) -> Result<f64, LimiterError> {
        request(&self.mailbox, |reply| LimiterCommand::Check { reply }).await
    }
}

impl LimiterDirectory for LimiterRegistry {
    fn resolve(&self, identity: &Identity) -> Arc<dyn LimiterStub> {
        Arc::new(LocalLimiterStub {
            mailbox: self.mailbox(identity),
        })
    }
}
