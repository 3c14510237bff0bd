use shared::domain::BranchId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BpsError {
    /// Rejected before any request was issued.
    #[error("{0}")]
    Validation(String),
    #[error("failed to load BPS data for branch {branch_id}: {source}")]
    RosterUnavailable {
        branch_id: BranchId,
        source: anyhow::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Why one record-creation call did not store a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RecordFailure {
    pub message: String,
    /// HTTP status when the server answered; `None` for transport errors.
    pub status: Option<u16>,
}

impl RecordFailure {
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}
