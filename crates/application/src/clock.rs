use domain::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// 毫秒级 Unix 时间
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// 秒级 Unix 时间（带小数）
    fn now_secs(&self) -> f64 {
        self.now_millis() as f64 / 1000.0
    }
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}
