use std::sync::Arc;

use lift_core::model::ExerciseSummary;
use storage::repository::Storage;

use crate::Clock;
use crate::config::WorkoutConfig;
use crate::error::AppServicesError;
use crate::records::{PersonalRecordEvaluator, PersonalRecordService};
use crate::workout::WorkoutService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    workouts: Arc<WorkoutService>,
    records: Arc<PersonalRecordService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: WorkoutConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, config))
    }

    #[must_use]
    pub fn in_memory(clock: Clock, config: WorkoutConfig) -> Self {
        Self::from_storage(Storage::in_memory(), clock, config)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, config: WorkoutConfig) -> Self {
        let records = Arc::new(PersonalRecordService::new(Arc::clone(&storage.records)));
        let evaluator: Arc<dyn PersonalRecordEvaluator> = records.clone();
        let workouts = Arc::new(
            WorkoutService::new(
                clock,
                Arc::clone(&storage.sessions),
                Arc::clone(&storage.exercises),
                evaluator,
            )
            .with_config(config),
        );
        Self {
            storage,
            workouts,
            records,
        }
    }

    /// Insert catalog entries that are not there yet and refresh the rest.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` on repository failures.
    pub async fn seed_catalog(&self, exercises: &[ExerciseSummary]) -> Result<(), AppServicesError> {
        for exercise in exercises {
            self.storage.exercises.upsert_exercise(exercise).await?;
        }
        tracing::debug!(target: "lift::storage", count = exercises.len(), "catalog seeded");
        Ok(())
    }

    #[must_use]
    pub fn workouts(&self) -> Arc<WorkoutService> {
        Arc::clone(&self.workouts)
    }

    #[must_use]
    pub fn records(&self) -> Arc<PersonalRecordService> {
        Arc::clone(&self.records)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}
