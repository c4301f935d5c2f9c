use std::fmt;

use serde::Serialize;

use crate::{config::BackoffPolicy, error::SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Reconnecting => "RECONNECTING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub attempts: u32,
    #[serde(rename = "retryInMs")]
    pub retry_in_ms: Option<u64>,
    #[serde(rename = "awaitingSnapshot")]
    pub awaiting_snapshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    Open(SessionId),
    ScheduleReconnect { timer: TimerId, delay_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    Snapshot,
    Delta,
}

#[derive(Debug, Clone, Copy)]
struct PendingReconnect {
    timer: TimerId,
    delay_ms: u64,
}

/// Lifecycle of the link to the node:
/// `IDLE -> CONNECTING -> OPEN -> CLOSED -> RECONNECTING -> CONNECTING -> ...`
///
/// Every session gets a fresh [`SessionId`]; events carrying an older id are stale.
/// Only a close schedules a reconnect, and each new schedule supersedes the
/// previous timer, so at most one timer can ever produce the next session.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    backoff: BackoffPolicy,
    state: ConnectionState,
    session: Option<SessionId>,
    attempts: u32,
    awaiting_snapshot: bool,
    pending: Option<PendingReconnect>,
    next_session: u64,
    next_timer: u64,
}

impl ConnectionManager {
    pub fn new(backoff: BackoffPolicy) -> Self {
        Self {
            backoff,
            state: ConnectionState::Idle,
            session: None,
            attempts: 0,
            awaiting_snapshot: false,
            pending: None,
            next_session: 1,
            next_timer: 1,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn awaiting_snapshot(&self) -> bool {
        self.awaiting_snapshot
    }

    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending.map(|pending| pending.timer)
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            attempts: self.attempts,
            retry_in_ms: self.pending.map(|pending| pending.delay_ms),
            awaiting_snapshot: self.awaiting_snapshot,
        }
    }

    pub fn connect(&mut self) -> Option<ConnectionAction> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            return None;
        }

        let session = SessionId(self.next_session);
        self.next_session += 1;
        self.session = Some(session);
        self.state = ConnectionState::Connecting;
        self.pending = None;
        Some(ConnectionAction::Open(session))
    }

    pub fn on_open(&mut self, session: SessionId) -> Result<(), SyncError> {
        if !self.is_current(session) || self.state != ConnectionState::Connecting {
            return Err(SyncError::StaleSession(session));
        }

        self.state = ConnectionState::Open;
        self.attempts = 0;
        self.awaiting_snapshot = true;
        Ok(())
    }

    pub fn on_error(&self, session: SessionId, reason: String) -> SyncError {
        if self.is_current(session) {
            SyncError::Transport { session, reason }
        } else {
            SyncError::StaleSession(session)
        }
    }

    pub fn on_close(&mut self, session: SessionId) -> Result<ConnectionAction, SyncError> {
        if !self.is_current(session) {
            return Err(SyncError::StaleSession(session));
        }

        self.session = None;
        self.state = ConnectionState::Closed;
        self.awaiting_snapshot = false;
        Ok(self.schedule_reconnect())
    }

    pub fn on_reconnect_timer(&mut self, timer: TimerId) -> Option<ConnectionAction> {
        if self.pending_timer() != Some(timer) {
            return None;
        }
        self.pending = None;
        self.connect()
    }

    pub fn classify_frame(&self, session: SessionId) -> Result<FrameRole, SyncError> {
        if !self.is_current(session) || self.state != ConnectionState::Open {
            return Err(SyncError::StaleSession(session));
        }
        Ok(if self.awaiting_snapshot {
            FrameRole::Snapshot
        } else {
            FrameRole::Delta
        })
    }

    pub fn snapshot_applied(&mut self) {
        self.awaiting_snapshot = false;
    }

    pub fn shutdown(&mut self) -> Option<SessionId> {
        self.state = ConnectionState::Idle;
        self.awaiting_snapshot = false;
        self.pending = None;
        self.session.take()
    }

    fn schedule_reconnect(&mut self) -> ConnectionAction {
        let delay_ms = self.backoff.delay_ms(self.attempts);
        self.attempts = self.attempts.saturating_add(1);

        let timer = TimerId(self.next_timer);
        self.next_timer += 1;
        self.pending = Some(PendingReconnect { timer, delay_ms });
        self.state = ConnectionState::Reconnecting;

        ConnectionAction::ScheduleReconnect { timer, delay_ms }
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.session == Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(BackoffPolicy::default())
    }

    fn opened(manager: &mut ConnectionManager) -> SessionId {
        let Some(ConnectionAction::Open(session)) = manager.connect() else {
            panic!("expected a new session");
        };
        manager.on_open(session).unwrap();
        session
    }

    fn reconnect_delay(action: ConnectionAction) -> (TimerId, u64) {
        match action {
            ConnectionAction::ScheduleReconnect { timer, delay_ms } => (timer, delay_ms),
            other => panic!("expected reconnect, got {other:?}"),
        }
    }

    #[test]
    fn connect_is_idempotent_while_connecting_or_open() {
        let mut manager = manager();
        assert_eq!(manager.connect(), Some(ConnectionAction::Open(SessionId(1))));
        assert_eq!(manager.connect(), None);

        manager.on_open(SessionId(1)).unwrap();
        assert_eq!(manager.connect(), None);
        assert_eq!(manager.state(), ConnectionState::Open);
        assert!(manager.awaiting_snapshot());
    }

    #[test]
    fn failed_connects_back_off_exponentially() {
        let mut manager = manager();
        let mut delays = Vec::new();

        for _ in 0..5 {
            let Some(ConnectionAction::Open(session)) = manager.connect() else {
                panic!("expected a new session");
            };
            let (timer, delay) = reconnect_delay(manager.on_close(session).unwrap());
            delays.push(delay);
            assert_eq!(manager.state(), ConnectionState::Reconnecting);
            assert_eq!(manager.pending_timer(), Some(timer));
        }

        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000]);
        assert_eq!(manager.attempts(), 5);
    }

    #[test]
    fn open_resets_attempts() {
        let mut manager = manager();
        let session = opened(&mut manager);
        manager.on_close(session).unwrap();
        let timer = manager.pending_timer().unwrap();
        let Some(ConnectionAction::Open(next)) = manager.on_reconnect_timer(timer) else {
            panic!("timer should reconnect");
        };
        manager.on_close(next).unwrap();
        assert_eq!(manager.attempts(), 2);

        let timer = manager.pending_timer().unwrap();
        let Some(ConnectionAction::Open(next)) = manager.on_reconnect_timer(timer) else {
            panic!("timer should reconnect");
        };
        manager.on_open(next).unwrap();

        assert_eq!(manager.attempts(), 0);
        let (_, delay) = reconnect_delay(manager.on_close(next).unwrap());
        assert_eq!(delay, 1_000);
    }

    #[test]
    fn error_does_not_schedule_reconnect() {
        let mut manager = manager();
        let session = opened(&mut manager);

        let err = manager.on_error(session, "reset by peer".to_string());

        assert!(matches!(err, SyncError::Transport { .. }));
        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(manager.pending_timer(), None);

        manager.on_close(session).unwrap();
        assert!(manager.pending_timer().is_some());
    }

    #[test]
    fn duplicate_close_is_stale() {
        let mut manager = manager();
        let session = opened(&mut manager);
        manager.on_close(session).unwrap();
        let timer = manager.pending_timer();

        assert_eq!(
            manager.on_close(session),
            Err(SyncError::StaleSession(session))
        );
        assert_eq!(manager.pending_timer(), timer);
        assert_eq!(manager.attempts(), 1);
    }

    #[test]
    fn only_latest_reconnect_timer_fires() {
        let mut manager = manager();
        let first = opened(&mut manager);
        let (first_timer, _) = reconnect_delay(manager.on_close(first).unwrap());

        // A manual connect before the timer fires, which then fails.
        let Some(ConnectionAction::Open(second)) = manager.connect() else {
            panic!("expected a new session");
        };
        let (second_timer, _) = reconnect_delay(manager.on_close(second).unwrap());
        assert_ne!(first_timer, second_timer);

        assert_eq!(manager.on_reconnect_timer(first_timer), None);
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(
            manager.on_reconnect_timer(second_timer),
            Some(ConnectionAction::Open(SessionId(3)))
        );
        assert_eq!(manager.on_reconnect_timer(second_timer), None);
    }

    #[test]
    fn frames_are_classified_per_session() {
        let mut manager = manager();
        let Some(ConnectionAction::Open(session)) = manager.connect() else {
            panic!("expected a new session");
        };
        assert_eq!(
            manager.classify_frame(session),
            Err(SyncError::StaleSession(session))
        );

        manager.on_open(session).unwrap();
        assert_eq!(manager.classify_frame(session), Ok(FrameRole::Snapshot));
        manager.snapshot_applied();
        assert_eq!(manager.classify_frame(session), Ok(FrameRole::Delta));
        assert_eq!(
            manager.classify_frame(SessionId(99)),
            Err(SyncError::StaleSession(SessionId(99)))
        );
    }

    #[test]
    fn late_open_from_old_session_is_rejected() {
        let mut manager = manager();
        let Some(ConnectionAction::Open(first)) = manager.connect() else {
            panic!("expected a new session");
        };
        manager.on_close(first).unwrap();
        let timer = manager.pending_timer().unwrap();
        manager.on_reconnect_timer(timer);

        assert_eq!(manager.on_open(first), Err(SyncError::StaleSession(first)));
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[test]
    fn shutdown_clears_session_and_timer() {
        let mut manager = manager();
        let session = opened(&mut manager);
        assert_eq!(manager.shutdown(), Some(session));
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert_eq!(manager.status().retry_in_ms, None);
        assert!(matches!(manager.connect(), Some(ConnectionAction::Open(_))));
    }
}
