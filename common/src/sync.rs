use crate::{
    alerts::{AlertEvaluator, AlertReport},
    config::MonitorConfig,
    connection::{
        ConnectionAction, ConnectionManager, ConnectionStatus, FrameRole, SessionId, TimerId,
    },
    display::DisplayAdapter,
    error::SyncError,
    protocol::{parse_state_frame, Command},
    state::StateStore,
    types::{RemoteState, ThresholdEdit},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened(SessionId),
    Message(SessionId, String),
    Error(SessionId, String),
    Closed(SessionId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    OpenSession(SessionId),
    ScheduleReconnect { timer: TimerId, delay_ms: u64 },
    Send { session: SessionId, frame: String },
    Render,
    StatusChanged(ConnectionStatus),
    History(HistoryNote),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryNote {
    SnapshotTruncated { dropped: usize },
    EventRecorded { evicted: bool },
    DeltaHistoryIgnored,
}

impl From<ConnectionAction> for SyncAction {
    fn from(action: ConnectionAction) -> Self {
        match action {
            ConnectionAction::Open(session) => Self::OpenSession(session),
            ConnectionAction::ScheduleReconnect { timer, delay_ms } => {
                Self::ScheduleReconnect { timer, delay_ms }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub sent: bool,
    pub actions: Vec<SyncAction>,
}

#[derive(Debug, Clone)]
pub struct SyncController {
    store: StateStore,
    connection: ConnectionManager,
}

impl SyncController {
    pub fn new(store: StateStore, connection: ConnectionManager) -> Self {
        Self { store, connection }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            StateStore::new(config.history_cap),
            ConnectionManager::new(config.reconnect),
        )
    }

    pub fn state(&self) -> &RemoteState {
        self.store.state()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn alerts(&self) -> AlertReport {
        AlertEvaluator::evaluate(self.store.state())
    }

    pub fn render(&self, display: &mut dyn DisplayAdapter) {
        display.render(self.store.state(), &self.alerts());
    }

    pub fn start(&mut self) -> Vec<SyncAction> {
        match self.connection.connect() {
            Some(action) => vec![self.status_action(), action.into()],
            None => Vec::new(),
        }
    }

    pub fn handle_event(&mut self, event: TransportEvent) -> Result<Vec<SyncAction>, SyncError> {
        match event {
            TransportEvent::Opened(session) => {
                self.connection.on_open(session)?;
                Ok(vec![self.status_action()])
            }
            TransportEvent::Message(session, text) => self.handle_message(session, &text),
            TransportEvent::Error(session, reason) => {
                Err(self.connection.on_error(session, reason))
            }
            TransportEvent::Closed(session) => {
                let action = self.connection.on_close(session)?;
                Ok(vec![self.status_action(), action.into()])
            }
        }
    }

    pub fn reconnect_timer_fired(&mut self, timer: TimerId) -> Vec<SyncAction> {
        match self.connection.on_reconnect_timer(timer) {
            Some(action) => vec![self.status_action(), action.into()],
            None => Vec::new(),
        }
    }

    pub fn update_thresholds(&mut self, edit: &ThresholdEdit) -> Result<DispatchOutcome, SyncError> {
        let changed = self.store.thresholds_mut().apply_edit(edit);
        let command = Command::UpdateThresholds {
            thresholds: self.store.state().thresholds,
        };

        let mut outcome = self.dispatch(&command)?;
        if changed {
            outcome.actions.push(SyncAction::Render);
        }
        Ok(outcome)
    }

    pub fn manual_ventilation(
        &mut self,
        manual_override: bool,
        state: bool,
    ) -> Result<DispatchOutcome, SyncError> {
        self.dispatch(&Command::manual_ventilation(manual_override, state))
    }

    pub fn shutdown(&mut self) -> Option<SessionId> {
        self.connection.shutdown()
    }

    fn handle_message(&mut self, session: SessionId, text: &str) -> Result<Vec<SyncAction>, SyncError> {
        let role = self.connection.classify_frame(session)?;
        let frame = parse_state_frame(text)?;

        match role {
            FrameRole::Snapshot => {
                let dropped = self.store.apply_snapshot(frame);
                self.connection.snapshot_applied();
                let mut actions = vec![self.status_action(), SyncAction::Render];
                if dropped > 0 {
                    actions.push(SyncAction::History(HistoryNote::SnapshotTruncated { dropped }));
                }
                Ok(actions)
            }
            FrameRole::Delta => {
                let outcome = self.store.apply_delta(frame);
                let mut actions = vec![SyncAction::Render];
                if outcome.recorded_event {
                    actions.push(SyncAction::History(HistoryNote::EventRecorded {
                        evicted: outcome.evicted_event,
                    }));
                }
                if outcome.ignored_history {
                    actions.push(SyncAction::History(HistoryNote::DeltaHistoryIgnored));
                }
                Ok(actions)
            }
        }
    }

    fn dispatch(&self, command: &Command) -> Result<DispatchOutcome, SyncError> {
        let session = match self.connection.session() {
            Some(session) if self.connection.is_open() => session,
            _ => {
                return Ok(DispatchOutcome {
                    sent: false,
                    actions: Vec::new(),
                })
            }
        };

        Ok(DispatchOutcome {
            sent: true,
            actions: vec![SyncAction::Send {
                session,
                frame: command.encode()?,
            }],
        })
    }

    fn status_action(&self) -> SyncAction {
        SyncAction::StatusChanged(self.connection.status())
    }
}
