use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domain::{ChatLog, DomainResult, SessionDescriptor};
use serde_json::Value;

use crate::error::LimiterError;
use crate::limiter_client::{LimiterDirectory, LimiterStub};
use crate::room::session::{SessionSink, TransportError};

/// 记录所有出站帧的连接
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<String>>,
    closed: Mutex<Option<(u16, String)>>,
    descriptor: Mutex<Option<SessionDescriptor>>,
    broken: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    pub fn take_frames(&self) -> Vec<Value> {
        let frames = self.frames();
        self.sent.lock().unwrap().clear();
        frames
    }

    pub fn closed(&self) -> Option<(u16, String)> {
        self.closed.lock().unwrap().clone()
    }

    pub fn descriptor(&self) -> Option<SessionDescriptor> {
        self.descriptor.lock().unwrap().clone()
    }
}

impl SessionSink for RecordingSink {
    fn send(&self, text: &str) -> Result<(), TransportError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        self.closed
            .lock()
            .unwrap()
            .get_or_insert((code, reason.to_owned()));
    }

    fn save_descriptor(&self, descriptor: &SessionDescriptor) {
        *self.descriptor.lock().unwrap() = Some(descriptor.clone());
    }
}

/// 返回固定结果的限流目录
pub struct FixedLimiters {
    response: Result<f64, LimiterError>,
}

impl FixedLimiters {
    pub fn open() -> Arc<Self> {
        Arc::new(Self { response: Ok(0.0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: Err(LimiterError::transport("limiter offline")),
        })
    }
}

struct FixedStub(Result<f64, LimiterError>);

#[async_trait]
impl LimiterStub for FixedStub {
    async fn check(&self) -> Result<f64, LimiterError> {
        self.0.clone()
    }
}

impl LimiterDirectory for FixedLimiters {
    fn resolve(&self, _identity: &domain::Identity) -> Arc<dyn LimiterStub> {
        Arc::new(FixedStub(self.response.clone()))
    }
}

/// 内存日志
#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn values(&self) -> Vec<String> {
        self.entries.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ChatLog for MemoryLog {
    async fn append(&self, key: &str, value: &str) -> DomainResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

/// 让后台限流任务跑完
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// 按房间区分的内存日志
#[derive(Default)]
pub struct MemoryLogs {
    logs: Mutex<std::collections::HashMap<domain::RoomName, Arc<MemoryLog>>>,
}

impl MemoryLogs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl domain::ChatLogProvider for MemoryLogs {
    fn open(&self, room: &domain::RoomName) -> Arc<dyn ChatLog> {
        self.logs
            .lock()
            .unwrap()
            .entry(room.clone())
            .or_default()
            .clone()
    }
}

/// 轮询直到条件成立
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
