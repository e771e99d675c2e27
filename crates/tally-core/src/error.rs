//! Error taxonomy for agent tallies.

use tally_state::StorageError;

/// Errors surfaced by the recorder, reset ledger and aggregator.
///
/// A duplicate lead assignment is deliberately absent: it is reported as
/// [`crate::RecordOutcome::Duplicate`] rather than as a failure.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// A referenced lead does not exist in the lead directory.
    #[error("lead not found: {lead_id}")]
    LeadNotFound { lead_id: String },

    /// Unknown period key, or a custom period with a missing or inverted range.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Empty or malformed identifiers.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A durable read or write failed or timed out. In-memory state was left untouched.
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),
}

impl TallyError {
    /// True for failures where retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TallyError::Persistence(StorageError::Backend(_))
                | TallyError::Persistence(StorageError::Io(_))
                | TallyError::Persistence(StorageError::Timeout { .. })
        )
    }
}

/// Result type for tally operations.
pub type Result<T> = std::result::Result<T, TallyError>;
