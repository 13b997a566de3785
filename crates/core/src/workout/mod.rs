//! The live session state machine.

mod cursor;
pub mod machine;
pub mod progress;
mod rest;


pub use crate::error::WorkoutError;
pub use cursor::SessionCursor;
pub use machine::{DEFAULT_MAX_ACTIVE_MS, SessionRules, SetPerformance, Step, StepOutcome, Tick};
pub use rest::RestCountdown;
