use thiserror::Error;

use crate::model::SessionStatus;

/// Errors produced by the pure session transitions.
///
/// None of these leave partial state behind: a failing transition returns the
/// error and the caller keeps the record and cursor it already had.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkoutError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("cannot {action} while session is {from}")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    #[error("session already finished ({0})")]
    Finished(SessionStatus),

    #[error("plan has no exercises")]
    NoExercises,

    #[error("exercise {index} has no planned sets")]
    EmptyExercise { index: usize },
}
