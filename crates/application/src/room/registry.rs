use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use domain::{ChatLogProvider, RoomName};

use crate::clock::Clock;
use crate::limiter_client::LimiterDirectory;
use crate::room::actor::RoomHandle;
use crate::room::coordinator::{RoomDependencies, RoomSettings};

/// 房间注册表依赖
pub struct RoomRegistryDependencies {
    pub chat_logs: Arc<dyn ChatLogProvider>,
    pub limiters: Arc<dyn LimiterDirectory>,
    pub clock: Arc<dyn Clock>,
    pub settings: RoomSettings,
}

/// 按房间名查找或启动房间 actor
///
/// 同一房间名在进程内只对应一个存活的 actor；actor 退出（包括空闲退出）后下一次访问
/// 会重新启动，新 actor 从持久化日志恢复水位线，连接随后通过会话描述恢复自身。
pub struct RoomRegistry {
    deps: RoomRegistryDependencies,
    rooms: Mutex<HashMap<RoomName, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new(deps: RoomRegistryDependencies) -> Self {
        Self {
            deps,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn room(&self, name: &RoomName) -> RoomHandle {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = rooms.get(name) {
            if !handle.is_closed() {
                return handle.clone();
            }
            tracing::debug!(room = %name, "房间 actor 已退出，重新启动");
        }
        rooms.retain(|_, handle| !handle.is_closed());

        let handle = RoomHandle::spawn(
            name.clone(),
            RoomDependencies {
                chat_log: self.deps.chat_logs.open(name),
                limiters: self.deps.limiters.clone(),
                clock: self.deps.clock.clone(),
                settings: self.deps.settings,
            },
        );
        rooms.insert(name.clone(), handle.clone());
        handle
    }

    pub fn active_rooms(&self) -> usize {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.retain(|_, handle| !handle.is_closed());
        rooms.len()
    }
}
