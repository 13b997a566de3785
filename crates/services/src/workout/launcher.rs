use std::sync::Arc;

use lift_core::Clock;
use lift_core::model::{SessionId, UserId, WorkoutPlan, WorkoutSession};
use storage::repository::{ExerciseCatalog, StorageError, WorkoutSessionRepository};

use super::handle::WorkoutSessionHandle;
use super::registry::SessionRegistry;
use super::worker::WorkerDeps;
use crate::config::WorkoutConfig;
use crate::error::SessionError;
use crate::records::PersonalRecordEvaluator;

/// Entry point for live sessions: starts new ones and reopens stored ones.
///
/// Starting enforces the one-active-session-per-user rule that the runtime
/// relies on. Each session is observed by at most one handle at a time, so a
/// session never has two workers writing it. Clones share that bookkeeping.
#[derive(Clone)]
pub struct WorkoutService {
    deps: WorkerDeps,
    registry: SessionRegistry,
}

impl WorkoutService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn WorkoutSessionRepository>,
        catalog: Arc<dyn ExerciseCatalog>,
        evaluator: Arc<dyn PersonalRecordEvaluator>,
    ) -> Self {
        Self {
            deps: WorkerDeps {
                sessions,
                catalog,
                evaluator,
                clock,
                config: WorkoutConfig::default(),
            },
            registry: SessionRegistry::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: WorkoutConfig) -> Self {
        self.deps.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &WorkoutConfig {
        &self.deps.config
    }

    /// True while a live handle observes the session.
    #[must_use]
    pub fn is_observed(&self, id: SessionId) -> bool {
        self.registry.is_observed(id)
    }

    /// Create a session from a plan, start it, and begin observing it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyActive` if the user has an unfinished
    /// session, `SessionError::EmptyPlan` for a plan without sets, or a storage
    /// error. A concurrent start that loses the race in the store also yields
    /// `SessionError::AlreadyActive`.
    pub async fn start_workout(
        &self,
        user_id: UserId,
        plan: &WorkoutPlan,
    ) -> Result<WorkoutSessionHandle, SessionError> {
        if let Some(active) = self.deps.sessions.active_session_for_user(user_id).await? {
            tracing::warn!(
                target: "lift::workout",
                user = %user_id,
                active = %active.id(),
                "refusing to start a second active session"
            );
            return Err(SessionError::AlreadyActive(active.id()));
        }

        let session = WorkoutSession::from_plan(
            SessionId::generate(),
            user_id,
            plan,
            self.deps.clock.now(),
        )?;
        let lease = self.registry.acquire(session.id()).await?;
        self.deps.sessions.put_session(&session).await?;
        tracing::info!(
            target: "lift::workout",
            session = %session.id(),
            user = %user_id,
            plan = %plan.name,
            exercises = plan.exercises.len(),
            "session created"
        );

        let session_id = session.id();
        let handle = WorkoutSessionHandle::spawn(self.deps.clone(), session, lease);
        match handle.start().await {
            Ok(_) => Ok(handle),
            Err(SessionError::Storage(StorageError::Conflict)) => {
                // Another start for this user won; retire the unstarted copy.
                if let Err(err) = handle.abandon().await {
                    tracing::warn!(target: "lift::workout", session = %session_id, error = %err, "could not retire losing session");
                }
                handle.stop().await;
                let active = self
                    .deps
                    .sessions
                    .active_session_for_user(user_id)
                    .await?
                    .map_or(session_id, |active| active.id());
                Err(SessionError::AlreadyActive(active))
            }
            Err(err) => Err(err),
        }
    }

    /// Begin observing a stored session in whatever state it was left.
    ///
    /// A resting session picks its countdown back up from the stored rest
    /// window, measured against the clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if no such session is stored and
    /// `SessionError::AlreadyObserved` while another handle has it open.
    pub async fn open(&self, id: SessionId) -> Result<WorkoutSessionHandle, SessionError> {
        // Read only after any previous worker has drained, so its last write is seen.
        let lease = self.registry.acquire(id).await?;
        let session = self
            .deps
            .sessions
            .get_session(id)
            .await
            .map_err(|err| SessionError::from_storage(id, err))?;
        tracing::info!(
            target: "lift::workout",
            session = %id,
            status = %session.status(),
            "session reopened"
        );
        Ok(WorkoutSessionHandle::spawn(self.deps.clone(), session, lease))
    }

    /// Reopen the user's unfinished session, if there is one.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails and
    /// `SessionError::AlreadyObserved` if the session is open elsewhere.
    pub async fn resume_active(
        &self,
        user_id: UserId,
    ) -> Result<Option<WorkoutSessionHandle>, SessionError> {
        let Some(active) = self.deps.sessions.active_session_for_user(user_id).await? else {
            return Ok(None);
        };
        tracing::info!(target: "lift::workout", session = %active.id(), user = %user_id, "resuming active session");
        self.open(active.id()).await.map(Some)
    }
}
