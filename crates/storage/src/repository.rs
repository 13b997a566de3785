use async_trait::async_trait;
use lift_core::model::{
    ExerciseId, ExerciseSummary, PersonalRecord, RecordCategory, SessionId, UserId,
    WorkoutSession,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::feed::{SessionFeed, SessionSubscription};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable keyed storage for workout sessions.
///
/// No transactions are exposed; callers serialize their own read-modify-write
/// cycles per session.
#[async_trait]
pub trait WorkoutSessionRepository: Send + Sync {
    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<WorkoutSession, StorageError>;

    /// Persist or replace a session and notify its subscribers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the write would give the user a second
    /// active session, or another `StorageError` if the session cannot be stored.
    async fn put_session(&self, session: &WorkoutSession) -> Result<(), StorageError>;

    /// Subscribe to a session's value: the current one, then every write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn subscribe_session(&self, id: SessionId)
    -> Result<SessionSubscription, StorageError>;

    /// The user's non-terminal session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lookup failures.
    async fn active_session_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<WorkoutSession>, StorageError>;
}

/// Best values per user, exercise and record category.
#[async_trait]
pub trait PersonalRecordRepository: Send + Sync {
    /// Current bests for one exercise; empty if the user never performed it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lookup failures.
    async fn best_records(
        &self,
        user_id: UserId,
        exercise_id: ExerciseId,
    ) -> Result<Vec<PersonalRecord>, StorageError>;

    /// Insert or overwrite bests keyed by (user, exercise, category).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be stored.
    async fn upsert_records(&self, records: &[PersonalRecord]) -> Result<(), StorageError>;
}

/// Exercise catalog lookups.
#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    /// Resolve ids in input order. Unknown ids are omitted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lookup failures.
    async fn resolve(&self, ids: &[ExerciseId]) -> Result<Vec<ExerciseSummary>, StorageError>;

    /// Insert or update a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn upsert_exercise(&self, exercise: &ExerciseSummary) -> Result<(), StorageError>;
}

type RecordKey = (UserId, ExerciseId, RecordCategory);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, WorkoutSession>>>,
    records: Arc<Mutex<HashMap<RecordKey, PersonalRecord>>>,
    exercises: Arc<Mutex<HashMap<ExerciseId, ExerciseSummary>>>,
    feed: SessionFeed,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl WorkoutSessionRepository for InMemoryRepository {
    async fn get_session(&self, id: SessionId) -> Result<WorkoutSession, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn put_session(&self, session: &WorkoutSession) -> Result<(), StorageError> {
        {
            let mut guard = self.sessions.lock().map_err(poisoned)?;
            if session.status().is_active()
                && guard.values().any(|other| {
                    other.id() != session.id()
                        && other.user_id() == session.user_id()
                        && other.status().is_active()
                })
            {
                return Err(StorageError::Conflict);
            }
            guard.insert(session.id(), session.clone());
        }
        self.feed.publish(session);
        Ok(())
    }

    async fn subscribe_session(
        &self,
        id: SessionId,
    ) -> Result<SessionSubscription, StorageError> {
        let stored = self.get_session(id).await?;
        Ok(self.feed.subscribe(stored))
    }

    async fn active_session_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<WorkoutSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|s| s.user_id() == user_id && s.status().is_active())
            .max_by_key(|s| s.created_at())
            .cloned())
    }
}

#[async_trait]
impl PersonalRecordRepository for InMemoryRepository {
    async fn best_records(
        &self,
        user_id: UserId,
        exercise_id: ExerciseId,
    ) -> Result<Vec<PersonalRecord>, StorageError> {
        let guard = self.records.lock().map_err(poisoned)?;
        let mut found: Vec<_> = guard
            .values()
            .filter(|r| r.user_id == user_id && r.exercise_id == exercise_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.category);
        Ok(found)
    }

    async fn upsert_records(&self, records: &[PersonalRecord]) -> Result<(), StorageError> {
        let mut guard = self.records.lock().map_err(poisoned)?;
        for record in records {
            guard.insert(
                (record.user_id, record.exercise_id, record.category),
                record.clone(),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ExerciseCatalog for InMemoryRepository {
    async fn resolve(&self, ids: &[ExerciseId]) -> Result<Vec<ExerciseSummary>, StorageError> {
        let guard = self.exercises.lock().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn upsert_exercise(&self, exercise: &ExerciseSummary) -> Result<(), StorageError> {
        let mut guard = self.exercises.lock().map_err(poisoned)?;
        guard.insert(exercise.id, exercise.clone());
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn WorkoutSessionRepository>,
    pub records: Arc<dyn PersonalRecordRepository>,
    pub exercises: Arc<dyn ExerciseCatalog>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn WorkoutSessionRepository> = Arc::new(repo.clone());
        let records: Arc<dyn PersonalRecordRepository> = Arc::new(repo.clone());
        let exercises: Arc<dyn ExerciseCatalog> = Arc::new(repo);
        Self {
            sessions,
            records,
            exercises,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lift_core::model::{PlanId, PlannedExercise, PlannedSet, SessionStatus, WorkoutPlan};
    use lift_core::time::fixed_now;
    use lift_core::workout::machine;

    fn build_session(user: u64) -> WorkoutSession {
        let plan = WorkoutPlan::new(
            PlanId::new(1),
            "Legs",
            vec![PlannedExercise::new(
                ExerciseId::new(5),
                "Squat",
                120,
                vec![PlannedSet::new(80.0, 5)],
            )],
        );
        WorkoutSession::from_plan(SessionId::generate(), UserId::new(user), &plan, fixed_now())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.get_session(SessionId::generate()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        let err = repo
            .subscribe_session(SessionId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn subscription_yields_current_then_writes() {
        let repo = InMemoryRepository::new();
        let session = build_session(1);
        repo.put_session(&session).await.unwrap();

        let mut sub = repo.subscribe_session(session.id()).await.unwrap();
        assert_eq!(sub.next().await.unwrap(), session);

        let started = machine::start(&session, fixed_now()).unwrap().session;
        repo.put_session(&started).await.unwrap();
        assert_eq!(sub.next().await.unwrap(), started);
        assert_eq!(sub.latest(), started);
    }

    #[tokio::test]
    async fn active_session_ignores_unstarted_and_other_users() {
        let repo = InMemoryRepository::new();
        let idle = build_session(1);
        repo.put_session(&idle).await.unwrap();
        assert!(repo.active_session_for_user(UserId::new(1)).await.unwrap().is_none());

        let running = machine::start(&idle, fixed_now()).unwrap().session;
        repo.put_session(&running).await.unwrap();
        let active = repo.active_session_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(active.map(|s| s.id()), Some(running.id()));
        assert!(repo.active_session_for_user(UserId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_second_active_session_for_a_user_conflicts() {
        let repo = InMemoryRepository::new();
        let first = machine::start(&build_session(1), fixed_now()).unwrap().session;
        repo.put_session(&first).await.unwrap();

        // Unstarted sessions and other users do not count.
        let second = build_session(1);
        repo.put_session(&second).await.unwrap();
        let other_user = machine::start(&build_session(2), fixed_now()).unwrap().session;
        repo.put_session(&other_user).await.unwrap();

        let second_running = machine::start(&second, fixed_now()).unwrap().session;
        let err = repo.put_session(&second_running).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(
            repo.get_session(second.id()).await.unwrap().status(),
            SessionStatus::NotStarted
        );

        // Rewriting the active session itself is fine.
        repo.put_session(&first).await.unwrap();
    }

    #[tokio::test]
    async fn catalog_resolves_in_input_order_and_skips_unknown() {
        let repo = InMemoryRepository::new();
        repo.upsert_exercise(&ExerciseSummary::new(ExerciseId::new(1), "Squat"))
            .await
            .unwrap();
        repo.upsert_exercise(&ExerciseSummary::new(ExerciseId::new(2), "Bench"))
            .await
            .unwrap();

        let found = repo
            .resolve(&[ExerciseId::new(2), ExerciseId::new(9), ExerciseId::new(1)])
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bench", "Squat"]);
    }

    #[tokio::test]
    async fn records_upsert_replaces_by_category() {
        let repo = InMemoryRepository::new();
        let mut record = PersonalRecord {
            user_id: UserId::new(1),
            exercise_id: ExerciseId::new(5),
            exercise_name: "Squat".into(),
            category: RecordCategory::MaxWeight,
            value: 100.0,
            achieved_at: fixed_now(),
            session_id: None,
        };
        repo.upsert_records(&[record.clone()]).await.unwrap();
        record.value = 110.0;
        repo.upsert_records(&[record]).await.unwrap();

        let bests = repo
            .best_records(UserId::new(1), ExerciseId::new(5))
            .await
            .unwrap();
        assert_eq!(bests.len(), 1);
        assert_eq!(bests[0].value, 110.0);
    }
}
