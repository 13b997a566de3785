#![forbid(unsafe_code)]

pub mod feed;
pub mod repository;
pub mod sqlite;

pub use feed::{SessionFeed, SessionSubscription};
pub use repository::{
    ExerciseCatalog, InMemoryRepository, PersonalRecordRepository, Storage, StorageError,
    WorkoutSessionRepository,
};
