#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod logging;
pub mod records;
pub mod workout;

pub use lift_core::Clock;

pub use app_services::AppServices;
pub use config::WorkoutConfig;
pub use error::{AppServicesError, RecordError, SessionError};
pub use logging::{LogConfig, LogFormat, LogPreset, init_logging};
pub use records::{PerformedSet, PersonalRecordEvaluator, PersonalRecordService};
pub use workout::{
    Confirmation, SessionTicker, SetCompletion, WorkoutNotice, WorkoutService,
    WorkoutSessionHandle, WorkoutView,
};
