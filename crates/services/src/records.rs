use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lift_core::model::{ExerciseId, NewRecord, PersonalRecord, SessionId, UserId};
use lift_core::records::broken_records;
use storage::repository::PersonalRecordRepository;

use crate::error::RecordError;

/// One completed set, as handed to a record evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformedSet {
    pub user_id: UserId,
    pub exercise_id: ExerciseId,
    pub exercise_name: String,
    pub weight: f64,
    pub reps: u32,
    pub session_id: Option<SessionId>,
    pub achieved_at: DateTime<Utc>,
}

/// Decides which record categories a performed set breaks.
#[async_trait]
pub trait PersonalRecordEvaluator: Send + Sync {
    /// Newly broken records; empty when nothing was beaten.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` when the evaluation cannot be completed. No records
    /// are stored in that case.
    async fn evaluate(&self, performed: &PerformedSet) -> Result<Vec<NewRecord>, RecordError>;
}

/// Store-backed evaluator: compares against the stored bests and updates them.
#[derive(Clone)]
pub struct PersonalRecordService {
    records: Arc<dyn PersonalRecordRepository>,
}

impl PersonalRecordService {
    #[must_use]
    pub fn new(records: Arc<dyn PersonalRecordRepository>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Current bests for one exercise.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Storage` on repository failures.
    pub async fn bests(
        &self,
        user_id: UserId,
        exercise_id: ExerciseId,
    ) -> Result<Vec<PersonalRecord>, RecordError> {
        Ok(self.records.best_records(user_id, exercise_id).await?)
    }
}

#[async_trait]
impl PersonalRecordEvaluator for PersonalRecordService {
    async fn evaluate(&self, performed: &PerformedSet) -> Result<Vec<NewRecord>, RecordError> {
        if !performed.weight.is_finite() || performed.weight <= 0.0 || performed.reps == 0 {
            return Err(RecordError::InvalidPerformance {
                weight: performed.weight,
                reps: performed.reps,
            });
        }

        let bests = self
            .records
            .best_records(performed.user_id, performed.exercise_id)
            .await?;
        let broken = broken_records(&bests, performed.weight, performed.reps);
        if broken.is_empty() {
            return Ok(broken);
        }

        let updated: Vec<PersonalRecord> = broken
            .iter()
            .map(|record| PersonalRecord {
                user_id: performed.user_id,
                exercise_id: performed.exercise_id,
                exercise_name: performed.exercise_name.clone(),
                category: record.category,
                value: record.value,
                achieved_at: performed.achieved_at,
                session_id: performed.session_id,
            })
            .collect();
        self.records.upsert_records(&updated).await?;

        tracing::info!(
            target: "lift::records",
            exercise = %performed.exercise_name,
            count = broken.len(),
            "personal records broken"
        );
        Ok(broken)
    }
}
