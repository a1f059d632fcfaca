use serde::{Deserialize, Serialize};

use crate::value_objects::{DisplayName, Identity};

/// 会话描述：连接在房间 actor 重启后重建会话所需的最小信息。
///
/// 暂存队列与限流客户端不在其中，重建时总是全新创建。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<DisplayName>,
}

impl SessionDescriptor {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            name: None,
        }
    }

    pub fn with_name(mut self, name: DisplayName) -> Self {
        self.name = Some(name);
        self
    }
}
