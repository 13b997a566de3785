#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod records;
pub mod time;
pub mod workout;

pub use error::WorkoutError;
pub use time::Clock;
