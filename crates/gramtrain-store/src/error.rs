//! Store-side error types.

use gramtrain_core::{StoreError, TrainerError};
use thiserror::Error;

/// Errors raised while registering a learner.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("room code must be 4-32 characters")]
    InvalidRoomCode,

    #[error("display name must be 2-32 characters")]
    InvalidDisplayName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RosterError> for TrainerError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::Store(e) => e.into(),
            other => TrainerError::InvalidInput(other.to_string()),
        }
    }
}

/// Classify a SQLite failure.
///
/// Decoding failures mean a row holds something this crate never wrote.
pub(crate) fn sqlite_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::Corrupt(err.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_validation_is_invalid_input() {
        let err: TrainerError = RosterError::InvalidRoomCode.into();
        assert!(matches!(err, TrainerError::InvalidInput(_)));
        assert!(err.is_permanent());
    }

    #[test]
    fn decode_failures_are_corrupt() {
        let err = sqlite_error(rusqlite::Error::IntegralValueOutOfRange(0, -1));
        assert!(matches!(err, StoreError::Corrupt(_)));
        let err = sqlite_error(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
