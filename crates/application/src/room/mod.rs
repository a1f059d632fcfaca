//! 房间：协调器、actor 与注册表

pub mod actor;
pub mod coordinator;
pub mod registry;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use actor::{RoomCommand, RoomHandle};
pub use coordinator::{LimiterFailure, RoomCoordinator, RoomDependencies, RoomSettings};
pub use registry::{RoomRegistry, RoomRegistryDependencies};
pub use session::{
    DisconnectCause, Session, SessionSink, TransportError, CLOSE_INTERNAL_ERROR,
    CLOSE_POLICY_VIOLATION,
};
