//! Error types for the trainer and its progress store.
//!
//! `TrainerError` is what the four core operations report to the serving
//! layer. `StoreError` is what store implementations report to the trainer;
//! it converts into `TrainerError` so callers can classify failures for
//! retry decisions without string matching.

use thiserror::Error;

/// Errors reported by the core operations.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// The referenced card (or unit) does not exist in the catalog.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller supplied a malformed value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The progress store could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A concurrent answer for the same (user, card) won the write.
    #[error("concurrent update of card {card_id} for user {user_id}")]
    Conflict { user_id: String, card_id: String },
}

impl TrainerError {
    /// Returns `true` if this error is a caller error and must not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            TrainerError::NotFound(_) | TrainerError::InvalidInput(_)
        )
    }
}

/// Errors reported by progress store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage failed (I/O, lock poisoning, driver error).
    #[error("backend failure: {0}")]
    Unavailable(String),

    /// The stored CardState version did not match the expected one.
    #[error("version conflict on card {card_id} for user {user_id}")]
    VersionConflict { user_id: String, card_id: String },

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for TrainerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { user_id, card_id } => {
                TrainerError::Conflict { user_id, card_id }
            }
            other => TrainerError::StoreUnavailable(other.to_string()),
        }
    }
}
