//! 房间协调器
//!
//! 每个房间一个实例，持有会话表与 `last_timestamp` 水位线。所有方法都只由房间 actor
//! 串行调用，因此同一房间内不会出现相同或倒退的时间戳，也不需要加锁。

use std::sync::Arc;
use std::time::Duration;

use domain::{
    ChatLog, ChatMessage, ClientFrame, DisplayName, FrameExpectation, Identity, MessageBody,
    RoomName, ServerFrame, SessionDescriptor, SessionId,
};
use tokio::sync::mpsc;

use crate::clock::Clock;
use crate::error::{LimiterError, RoomError};
use crate::limiter_client::{LimiterDirectory, RateLimiterClient};
use crate::room::session::{
    DisconnectCause, Session, SessionSink, CLOSE_INTERNAL_ERROR, CLOSE_POLICY_VIOLATION,
};

const BROKEN_REASON: &str = "WebSocket broken.";

/// 房间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSettings {
    pub history_limit: usize,
    pub max_name_chars: usize,
    pub max_message_chars: usize,
    pub mailbox_capacity: usize,
    /// 会话表为空时，actor 在该时长内未收到命令即退出
    pub idle_timeout: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            history_limit: 100,
            max_name_chars: domain::MAX_NAME_CHARS,
            max_message_chars: domain::MAX_MESSAGE_CHARS,
            mailbox_capacity: 256,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&config::RoomConfig> for RoomSettings {
    fn from(value: &config::RoomConfig) -> Self {
        Self {
            history_limit: value.history_limit,
            max_name_chars: value.max_name_chars,
            max_message_chars: value.max_message_chars,
            mailbox_capacity: value.mailbox_capacity,
            idle_timeout: Duration::from_secs(value.idle_timeout_secs),
        }
    }
}

/// 房间协调器依赖
pub struct RoomDependencies {
    pub chat_log: Arc<dyn ChatLog>,
    pub limiters: Arc<dyn LimiterDirectory>,
    pub clock: Arc<dyn Clock>,
    pub settings: RoomSettings,
}

/// 限流客户端上报的失败，回送到房间 actor 处理
#[derive(Debug)]
pub struct LimiterFailure {
    pub session_id: SessionId,
    pub error: LimiterError,
}

pub struct RoomCoordinator {
    room: RoomName,
    /// 按加入顺序排列
    sessions: Vec<Session>,
    last_timestamp: i64,
    chat_log: Arc<dyn ChatLog>,
    limiters: Arc<dyn LimiterDirectory>,
    clock: Arc<dyn Clock>,
    settings: RoomSettings,
    failures: mpsc::UnboundedSender<LimiterFailure>,
}

impl RoomCoordinator {
    pub fn new(
        room: RoomName,
        deps: RoomDependencies,
    ) -> (Self, mpsc::UnboundedReceiver<LimiterFailure>) {
        let (failures, failure_rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            room,
            sessions: Vec::new(),
            last_timestamp: 0,
            chat_log: deps.chat_log,
            limiters: deps.limiters,
            clock: deps.clock,
            settings: deps.settings,
            failures,
        };
        (coordinator, failure_rx)
    }

    /// 以最近一条已持久化消息的时间戳作为水位线起点
    pub async fn bootstrap(&mut self) {
        match self.chat_log.list_recent(1).await {
            Ok(latest) => {
                if let Some(raw) = latest.first() {
                    match ChatMessage::from_json(raw) {
                        Ok(message) => self.last_timestamp = message.timestamp,
                        Err(err) => {
                            tracing::warn!(room = %self.room, error = %err, "无法解析最近一条消息")
                        }
                    }
                }
            }
            Err(err) => tracing::warn!(room = %self.room, error = %err, "读取房间历史失败"),
        }
    }

    pub fn room(&self) -> &RoomName {
        &self.room
    }

    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    /// 接纳新连接
    ///
    /// 新会话的暂存队列里依次放入当前每个已命名会话的 joined 通知，以及最近的历史消息
    /// （按时间正序）。此时不做任何广播。
    pub async fn admit(
        &mut self,
        id: SessionId,
        identity: Identity,
        sink: Arc<dyn SessionSink>,
    ) -> Result<(), RoomError> {
        let limiter = self.new_limiter(id, identity);
        let mut session = Session::new(id, sink, limiter);
        for other in &self.sessions {
            if let Some(name) = &other.name {
                session
                    .blocked_messages
                    .push(encode(&ServerFrame::joined(name.as_str()))?);
            }
        }
        session.sink.save_descriptor(&session.descriptor());
        self.sessions.push(session);
        tracing::info!(room = %self.room, session_id = %id, "会话已接入");

        let backlog = self
            .chat_log
            .list_recent(self.settings.history_limit)
            .await
            .map_err(|err| RoomError::infrastructure(format!("failed to load history: {err}")))?;
        if let Some(session) = self.find_mut(id) {
            session.blocked_messages.extend(backlog.into_iter().rev());
        }
        Ok(())
    }

    /// 根据会话描述重建会话（房间 actor 重启后）
    ///
    /// 名称沿用描述中的值；暂存队列为空，限流客户端重新创建，不回放历史也不广播。
    pub fn restore(
        &mut self,
        id: SessionId,
        descriptor: SessionDescriptor,
        sink: Arc<dyn SessionSink>,
    ) {
        if let Some(index) = self.position(id) {
            self.sessions.remove(index);
        }
        let limiter = self.new_limiter(id, descriptor.identity);
        let mut session = Session::new(id, sink, limiter);
        session.name = descriptor.name;
        session.sink.save_descriptor(&session.descriptor());
        self.sessions.push(session);
        tracing::info!(room = %self.room, session_id = %id, "会话已恢复");
    }

    /// 单帧处理边界：错误只回报给发起连接
    pub async fn handle_frame(&mut self, id: SessionId, raw: &str) {
        if let Err(err) = self.on_frame(id, raw).await {
            tracing::debug!(room = %self.room, session_id = %id, error = %err, "帧处理失败");
            if err.notifies_sender() {
                self.notify(id, &err.to_string());
            }
        }
    }

    pub async fn on_frame(&mut self, id: SessionId, raw: &str) -> Result<(), RoomError> {
        // 会话被移除时其连接已被关闭（或连接自身已结束读循环），迟到的帧直接丢弃
        let Some(session) = self.find(id) else {
            tracing::debug!(room = %self.room, session_id = %id, "忽略已移除会话的帧");
            return Ok(());
        };

        let expectation = if session.name.is_some() {
            FrameExpectation::Chat
        } else {
            FrameExpectation::Identity
        };
        match ClientFrame::parse(raw, expectation)? {
            ClientFrame::Identify { name } => self.identify(id, name),
            ClientFrame::Chat { message } => self.submit(id, message).await,
        }
    }

    /// 身份声明：一次性且不可逆
    fn identify(&mut self, id: SessionId, name: Option<String>) -> Result<(), RoomError> {
        let name = match DisplayName::parse(name, self.settings.max_name_chars) {
            Ok(name) => name,
            Err(err) => {
                let reason = err.to_string();
                if let Some(session) = self.find(id) {
                    let _ = session.sink.send(&encode(&ServerFrame::error(&reason))?);
                    session.sink.close(CLOSE_POLICY_VIOLATION, &reason);
                }
                self.disconnect(id, DisconnectCause::PolicyViolation);
                return Err(err.into());
            }
        };

        let Some(session) = self.find_mut(id) else {
            return Ok(());
        };
        session.name = Some(name.clone());
        session.sink.save_descriptor(&session.descriptor());
        let queued = std::mem::take(&mut session.blocked_messages);
        let sink = session.sink.clone();

        for payload in &queued {
            if let Err(err) = sink.send(payload) {
                self.drop_broken(id);
                return Err(err.into());
            }
        }

        self.broadcast(&ServerFrame::joined(name.as_str()))?;
        if self.find(id).is_none() {
            return Ok(());
        }
        if let Err(err) = sink.send(&encode(&ServerFrame::ready())?) {
            self.drop_broken(id);
            return Err(err.into());
        }

        tracing::info!(room = %self.room, session_id = %id, name = %name, "会话已命名");
        Ok(())
    }

    /// 聊天提交：校验 -> 限流 -> 分配时间戳 -> 广播 -> 持久化
    async fn submit(&mut self, id: SessionId, message: Option<String>) -> Result<(), RoomError> {
        let body = MessageBody::parse(message, self.settings.max_message_chars)?;
        let Some(session) = self.find(id) else {
            return Ok(());
        };
        let Some(name) = session.name.clone() else {
            return Ok(());
        };
        if !session.limiter.check_limit() {
            return Err(RoomError::RateLimited);
        }

        let timestamp = self.clock.now_millis().max(self.last_timestamp + 1);
        self.last_timestamp = timestamp;
        let message = ChatMessage::new(&name, body, timestamp);
        let payload = message.to_json()?;

        // 先广播，持久化失败不会撤回已经送出的消息
        self.broadcast_raw(payload.clone());

        let key = message.storage_key()?;
        self.chat_log
            .append(&key, &payload)
            .await
            .map_err(|err| RoomError::infrastructure(format!("failed to persist message: {err}")))
    }

    /// 断开会话；会话不存在时为空操作
    pub fn disconnect(&mut self, id: SessionId, cause: DisconnectCause) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let mut session = self.sessions.remove(index);
        tracing::info!(room = %self.room, session_id = %id, cause = ?cause, "会话已断开");

        if let Some(name) = session.name.take() {
            if let Err(err) = self.broadcast(&ServerFrame::quit(name.as_str())) {
                tracing::warn!(room = %self.room, error = %err, "quit 广播失败");
            }
        }
        true
    }

    /// 向所有已命名会话投递；未命名会话追加到其暂存队列
    pub fn broadcast(&mut self, frame: &ServerFrame) -> Result<(), RoomError> {
        let payload = encode(frame)?;
        self.broadcast_raw(payload);
        Ok(())
    }

    fn broadcast_raw(&mut self, payload: String) {
        let mut broken = Vec::new();
        for session in self.sessions.iter_mut() {
            if session.name.is_some() {
                if session.sink.send(&payload).is_err() {
                    broken.push(session.id);
                }
            } else {
                session.blocked_messages.push(payload.clone());
            }
        }

        // 整轮投递结束后再处理失败的接收方
        let mut quitters = Vec::new();
        for id in broken {
            if let Some(index) = self.position(id) {
                let session = self.sessions.remove(index);
                tracing::warn!(room = %self.room, session_id = %id, "发送失败，移除会话");
                session.sink.close(CLOSE_INTERNAL_ERROR, BROKEN_REASON);
                if let Some(name) = session.name {
                    quitters.push(name);
                }
            }
        }
        for name in quitters {
            if let Err(err) = self.broadcast(&ServerFrame::quit(name.as_str())) {
                tracing::warn!(room = %self.room, error = %err, "quit 广播失败");
            }
        }
    }

    /// 限流服务在重试后仍不可用：强制关闭对应连接
    pub fn on_limiter_failure(&mut self, failure: LimiterFailure) {
        let LimiterFailure { session_id, error } = failure;
        let Some(session) = self.find(session_id) else {
            return;
        };
        let reason = error.to_string();
        tracing::warn!(room = %self.room, session_id = %session_id, error = %reason, "限流服务不可用，关闭连接");
        session.sink.close(CLOSE_INTERNAL_ERROR, &reason);
        self.disconnect(session_id, DisconnectCause::LimiterFailure(reason));
    }

    /// 向单个会话发送错误提示
    pub fn notify(&mut self, id: SessionId, message: &str) {
        let Some(session) = self.find(id) else {
            return;
        };
        let failed = match encode(&ServerFrame::error(message)) {
            Ok(payload) => session.sink.send(&payload).is_err(),
            Err(err) => {
                tracing::warn!(room = %self.room, error = %err, "无法编码错误帧");
                false
            }
        };
        if failed {
            self.drop_broken(id);
        }
    }

    fn drop_broken(&mut self, id: SessionId) {
        if let Some(session) = self.find(id) {
            session.sink.close(CLOSE_INTERNAL_ERROR, BROKEN_REASON);
        }
        self.disconnect(id, DisconnectCause::TransportFailure);
    }

    fn new_limiter(&self, id: SessionId, identity: Identity) -> RateLimiterClient {
        let failures = self.failures.clone();
        RateLimiterClient::new(
            identity,
            self.limiters.clone(),
            Arc::new(move |error: LimiterError| {
                let _ = failures.send(LimiterFailure {
                    session_id: id,
                    error,
                });
            }),
        )
    }

    fn position(&self, id: SessionId) -> Option<usize> {
        self.sessions.iter().position(|session| session.id == id)
    }

    fn find(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    fn find_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }
}

fn encode(frame: &ServerFrame) -> Result<String, RoomError> {
    frame.to_json().map_err(RoomError::from)
}
