use thiserror::Error;

use crate::connection::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("transport error on session {session}: {reason}")]
    Transport { session: SessionId, reason: String },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("discarding event from superseded session {0}")]
    StaleSession(SessionId),
    #[error("failed to encode command: {0}")]
    Encode(String),
}
