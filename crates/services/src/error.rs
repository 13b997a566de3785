//! Shared error types for the services crate.

use thiserror::Error;

use lift_core::WorkoutError;
use lift_core::model::{SessionId, SessionStatus};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the live workout runtime and the launcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Rejected user input; nothing was written and the cursor is unchanged.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },
    #[error("session is already {0}")]
    Finished(SessionStatus),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("user already has an active session {0}")]
    AlreadyActive(SessionId),
    #[error("session {0} is already open in another handle")]
    AlreadyObserved(SessionId),
    #[error("workout plan has no sets to perform")]
    EmptyPlan,
    #[error("session worker has stopped")]
    Closed,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Map a store error for a known session, turning `NotFound` into
    /// `SessionError::NotFound(id)`.
    #[must_use]
    pub fn from_storage(id: SessionId, err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }

    /// True for rejections that leave state untouched and can simply be retried
    /// with different input.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::InvalidTransition { .. }
        )
    }
}

impl From<WorkoutError> for SessionError {
    fn from(err: WorkoutError) -> Self {
        match err {
            WorkoutError::InvalidInput(reason) => Self::InvalidInput(reason),
            WorkoutError::InvalidTransition { from, action } => {
                Self::InvalidTransition { from, action }
            }
            WorkoutError::Finished(status) => Self::Finished(status),
            WorkoutError::NoExercises | WorkoutError::EmptyExercise { .. } => Self::EmptyPlan,
            _ => Self::InvalidInput("unsupported workout operation"),
        }
    }
}

/// Errors emitted by personal-record evaluators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    #[error("performance cannot hold a record: {weight} x {reps}")]
    InvalidPerformance { weight: f64, reps: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
