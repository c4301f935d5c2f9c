use std::time::Duration;

use anyhow::Context;
use hazard_common::{
    DisplayAdapter, HistoryNote, SessionId, SyncAction, SyncController, SyncError, ThresholdEdit,
    ThresholdSet, TimerId, TransportEvent,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{display::MonitorView, transport::Connector};

#[derive(Debug)]
pub enum DriverEvent {
    Transport(TransportEvent),
    ReconnectTimer(TimerId),
    Command(CommandRequest),
    Shutdown,
}

#[derive(Debug)]
pub enum CommandRequest {
    UpdateThresholds {
        edit: ThresholdEdit,
        reply: oneshot::Sender<ThresholdReply>,
    },
    ManualVentilation {
        manual_override: bool,
        state: bool,
        reply: oneshot::Sender<bool>,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThresholdReply {
    pub sent: bool,
    pub thresholds: ThresholdSet,
}

#[derive(Clone)]
pub struct DriverHandle {
    events: mpsc::UnboundedSender<DriverEvent>,
    view: watch::Receiver<MonitorView>,
}

impl DriverHandle {
    pub fn view(&self) -> MonitorView {
        self.view.borrow().clone()
    }

    pub async fn update_thresholds(&self, edit: ThresholdEdit) -> anyhow::Result<ThresholdReply> {
        let (reply, response) = oneshot::channel();
        self.send(DriverEvent::Command(CommandRequest::UpdateThresholds { edit, reply }))?;
        response.await.context("driver dropped threshold reply")
    }

    pub async fn manual_ventilation(&self, manual_override: bool, state: bool) -> anyhow::Result<bool> {
        let (reply, response) = oneshot::channel();
        self.send(DriverEvent::Command(CommandRequest::ManualVentilation {
            manual_override,
            state,
            reply,
        }))?;
        response.await.context("driver dropped ventilation reply")
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(DriverEvent::Shutdown);
    }

    fn send(&self, event: DriverEvent) -> anyhow::Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow::anyhow!("driver is not running"))
    }
}

pub struct Driver<C, D> {
    controller: SyncController,
    connector: C,
    display: D,
    events_tx: mpsc::UnboundedSender<DriverEvent>,
    events_rx: mpsc::UnboundedReceiver<DriverEvent>,
    outbound: Option<(SessionId, mpsc::UnboundedSender<String>)>,
}

impl<C, D> Driver<C, D>
where
    C: Connector,
    D: DisplayAdapter + Send + 'static,
{
    pub fn new(controller: SyncController, connector: C, display: D) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            controller,
            connector,
            display,
            events_tx,
            events_rx,
            outbound: None,
        }
    }

    pub fn handle(&self, view: watch::Receiver<MonitorView>) -> DriverHandle {
        DriverHandle {
            events: self.events_tx.clone(),
            view,
        }
    }

    pub async fn run(mut self) {
        let actions = self.controller.start();
        self.execute(actions);

        while let Some(event) = self.events_rx.recv().await {
            match event {
                DriverEvent::Transport(event) => self.on_transport(event),
                DriverEvent::ReconnectTimer(timer) => {
                    let actions = self.controller.reconnect_timer_fired(timer);
                    self.execute(actions);
                }
                DriverEvent::Command(request) => self.on_command(request),
                DriverEvent::Shutdown => break,
            }
        }

        if let Some(session) = self.controller.shutdown() {
            info!(%session, "closing node session");
        }
        self.outbound = None;
    }

    fn on_transport(&mut self, event: TransportEvent) {
        if let TransportEvent::Closed(session) = &event {
            if matches!(&self.outbound, Some((current, _)) if current == session) {
                self.outbound = None;
            }
        }

        match self.controller.handle_event(event) {
            Ok(actions) => self.execute(actions),
            Err(err @ SyncError::StaleSession(_)) => debug!("{err}"),
            Err(err @ SyncError::MalformedMessage(_)) => warn!("dropping frame: {err}"),
            Err(err) => warn!("{err}"),
        }
    }

    fn on_command(&mut self, request: CommandRequest) {
        match request {
            CommandRequest::UpdateThresholds { edit, reply } => {
                let sent = match self.controller.update_thresholds(&edit) {
                    Ok(outcome) => {
                        self.execute(outcome.actions);
                        outcome.sent
                    }
                    Err(err) => {
                        warn!("threshold update failed: {err}");
                        false
                    }
                };
                if !sent {
                    info!("node link not open, threshold update kept locally only");
                }
                let _ = reply.send(ThresholdReply {
                    sent,
                    thresholds: self.controller.state().thresholds,
                });
            }
            CommandRequest::ManualVentilation {
                manual_override,
                state,
                reply,
            } => {
                let sent = match self.controller.manual_ventilation(manual_override, state) {
                    Ok(outcome) => {
                        self.execute(outcome.actions);
                        outcome.sent
                    }
                    Err(err) => {
                        warn!("ventilation command failed: {err}");
                        false
                    }
                };
                if !sent {
                    info!("node link not open, ventilation command dropped");
                }
                let _ = reply.send(sent);
            }
        }
    }

    fn execute(&mut self, actions: Vec<SyncAction>) {
        for action in actions {
            match action {
                SyncAction::OpenSession(session) => {
                    debug!(%session, "opening node session");
                    let outbound = self.connector.open(session, self.events_tx.clone());
                    self.outbound = Some((session, outbound));
                }
                SyncAction::ScheduleReconnect { timer, delay_ms } => {
                    let events = self.events_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        let _ = events.send(DriverEvent::ReconnectTimer(timer));
                    });
                }
                SyncAction::Send { session, frame } => match &self.outbound {
                    Some((current, outbound)) if *current == session => {
                        if outbound.send(frame).is_err() {
                            warn!(%session, "session writer is gone, frame dropped");
                        }
                    }
                    _ => debug!(%session, "no writer for session, frame dropped"),
                },
                SyncAction::Render => self.controller.render(&mut self.display),
                SyncAction::StatusChanged(status) => self.display.connection_changed(&status),
                SyncAction::History(note) => log_history(note),
            }
        }
    }
}

fn log_history(note: HistoryNote) {
    match note {
        HistoryNote::SnapshotTruncated { dropped } => {
            debug!(dropped, "snapshot history longer than cap, oldest entries dropped")
        }
        HistoryNote::EventRecorded { evicted: true } => {
            debug!("alert event recorded, oldest history entry evicted")
        }
        HistoryNote::EventRecorded { evicted: false } => debug!("alert event recorded"),
        HistoryNote::DeltaHistoryIgnored => debug!("ignoring history list on a delta frame"),
    }
}
