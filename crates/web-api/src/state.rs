use std::sync::Arc;

use application::{LimiterRegistry, RoomRegistry};

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomRegistry>,
    /// 本进程托管的限流 actor，对外暴露为限流服务
    pub limiters: Arc<LimiterRegistry>,
}

impl AppState {
    pub fn new(rooms: Arc<RoomRegistry>, limiters: Arc<LimiterRegistry>) -> Self {
        Self { rooms, limiters }
    }
}
