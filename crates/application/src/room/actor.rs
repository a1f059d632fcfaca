//! 房间 actor
//!
//! 每个房间一个 tokio 任务，通过有界邮箱串行处理连接命令。限流失败通过独立的无界通道
//! 回送，与命令一起在同一个循环里处理。会话表为空且空闲超时后 actor 关闭邮箱并退出，
//! 注册表下一次访问该房间时会重新启动。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use domain::{Identity, RoomName, SessionDescriptor, SessionId};
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::error::RoomError;
use crate::room::coordinator::{LimiterFailure, RoomCoordinator, RoomDependencies};
use crate::room::session::{DisconnectCause, SessionSink};

/// 连接发给房间 actor 的命令
pub enum RoomCommand {
    Admit {
        session_id: SessionId,
        identity: Identity,
        sink: Arc<dyn SessionSink>,
    },
    Restore {
        session_id: SessionId,
        descriptor: SessionDescriptor,
        sink: Arc<dyn SessionSink>,
    },
    Frame {
        session_id: SessionId,
        text: String,
    },
    Disconnect {
        session_id: SessionId,
        cause: DisconnectCause,
    },
}

impl RoomCommand {
    fn session_id(&self) -> SessionId {
        match self {
            RoomCommand::Admit { session_id, .. }
            | RoomCommand::Restore { session_id, .. }
            | RoomCommand::Frame { session_id, .. }
            | RoomCommand::Disconnect { session_id, .. } => *session_id,
        }
    }
}

/// 房间 actor 的句柄，可廉价克隆
#[derive(Clone)]
pub struct RoomHandle {
    room: RoomName,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// 启动房间 actor
    pub fn spawn(room: RoomName, deps: RoomDependencies) -> Self {
        let (sender, commands) = mpsc::channel(deps.settings.mailbox_capacity.max(1));
        let idle_timeout = deps.settings.idle_timeout;
        let (coordinator, failures) = RoomCoordinator::new(room.clone(), deps);
        tokio::spawn(run_room(coordinator, commands, failures, idle_timeout));
        Self { room, sender }
    }

    pub fn room(&self) -> &RoomName {
        &self.room
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn admit(
        &self,
        session_id: SessionId,
        identity: Identity,
        sink: Arc<dyn SessionSink>,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Admit {
            session_id,
            identity,
            sink,
        })
        .await
    }

    pub async fn restore(
        &self,
        session_id: SessionId,
        descriptor: SessionDescriptor,
        sink: Arc<dyn SessionSink>,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Restore {
            session_id,
            descriptor,
            sink,
        })
        .await
    }

    pub async fn frame(&self, session_id: SessionId, text: String) -> Result<(), RoomError> {
        self.deliver_frame(session_id, text)
            .await
            .map_err(|_| RoomError::RoomUnavailable)
    }

    /// 投递入站帧；actor 已退出时把帧原样交还
    pub async fn deliver_frame(&self, session_id: SessionId, text: String) -> Result<(), String> {
        match self.sender.reserve().await {
            Ok(permit) => {
                permit.send(RoomCommand::Frame { session_id, text });
                Ok(())
            }
            Err(_) => Err(text),
        }
    }

    pub async fn disconnect(
        &self,
        session_id: SessionId,
        cause: DisconnectCause,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnect { session_id, cause })
            .await
    }

    async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| RoomError::RoomUnavailable)
    }
}

async fn run_room(
    mut coordinator: RoomCoordinator,
    mut commands: mpsc::Receiver<RoomCommand>,
    mut failures: mpsc::UnboundedReceiver<LimiterFailure>,
    idle_timeout: Duration,
) {
    coordinator.bootstrap().await;
    tracing::info!(room = %coordinator.room(), "房间 actor 已启动");

    let idle = sleep(idle_timeout);
    tokio::pin!(idle);
    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(command) => {
                    dispatch(&mut coordinator, command).await;
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                }
                None => break,
            },
            Some(failure) = failures.recv() => coordinator.on_limiter_failure(failure),
            () = &mut idle, if coordinator.session_count() == 0 => {
                tracing::info!(room = %coordinator.room(), "房间空闲，关闭邮箱");
                // 关闭后不再接收新命令，已入队的命令照常处理完
                commands.close();
                while let Some(command) = commands.recv().await {
                    dispatch(&mut coordinator, command).await;
                }
                break;
            }
        }
    }

    tracing::info!(room = %coordinator.room(), "房间 actor 已退出");
}

/// 单条命令的 panic 边界：只影响发起命令的连接
async fn dispatch(coordinator: &mut RoomCoordinator, command: RoomCommand) {
    let origin = command.session_id();
    let outcome = AssertUnwindSafe(apply(coordinator, command))
        .catch_unwind()
        .await;
    if outcome.is_err() {
        tracing::warn!(room = %coordinator.room(), session_id = %origin, "处理命令时发生 panic");
        coordinator.notify(origin, "An error occurred");
    }
}

async fn apply(coordinator: &mut RoomCoordinator, command: RoomCommand) {
    match command {
        RoomCommand::Admit {
            session_id,
            identity,
            sink,
        } => {
            if let Err(err) = coordinator.admit(session_id, identity, sink).await {
                tracing::warn!(room = %coordinator.room(), session_id = %session_id, error = %err, "接入会话时出错");
                if err.notifies_sender() {
                    coordinator.notify(session_id, &err.to_string());
                }
            }
        }
        RoomCommand::Restore {
            session_id,
            descriptor,
            sink,
        } => coordinator.restore(session_id, descriptor, sink),
        RoomCommand::Frame { session_id, text } => {
            coordinator.handle_frame(session_id, &text).await
        }
        RoomCommand::Disconnect { session_id, cause } => {
            coordinator.disconnect(session_id, cause);
        }
    }
}
