pub mod alerts;
pub mod config;
pub mod connection;
pub mod display;
pub mod error;
pub mod history;
pub mod protocol;
pub mod state;
pub mod sync;
pub mod types;

pub use alerts::{ActiveAlert, AlertEvaluator, AlertReport, Comparison};
pub use config::{BackoffPolicy, MonitorConfig};
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus, SessionId, TimerId};
pub use display::DisplayAdapter;
pub use error::SyncError;
pub use history::HistoryStore;
pub use protocol::{Command, StateFrame, WS_PATH};
pub use state::StateStore;
pub use sync::{DispatchOutcome, HistoryNote, SyncAction, SyncController, TransportEvent};
pub use types::{AlertEvent, RemoteState, SensorKind, ThresholdEdit, ThresholdSet};
