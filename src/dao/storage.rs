use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

use crate::state::pvp_match::UserId;

/// Result alias for stats store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures reported by a ranking backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached.
    #[error("stats store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The outcome of this match was already applied to the player.
    #[error("outcome of match {match_id} already recorded for {user_id}")]
    AlreadyRecorded { user_id: UserId, match_id: Uuid },
}

impl StorageError {
    /// Wrap a backend failure, e.g. a transport error from a remote ranking service.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
