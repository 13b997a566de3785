use std::sync::Arc;

use lift_core::model::{ExerciseId, SessionId, SessionStatus, WorkoutSession};
use lift_core::workout::SetPerformance;
use storage::feed::SessionSubscription;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::registry::Lease;
use super::ticker::SessionTicker;
use super::view::{SetCompletion, WorkoutNotice, WorkoutView};
use super::worker::{Command, Reply, Worker, WorkerDeps};
use crate::error::SessionError;

const NOTICE_CAPACITY: usize = 64;

/// Live handle on one observed session.
///
/// Every method is queued behind earlier commands and ticks, and resolves once
/// the resulting write is durable. Dropping the handle stops the ticker and the
/// worker but leaves the stored session as last written, ready to be reopened.
pub struct WorkoutSessionHandle {
    session_id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<WorkoutView>,
    notices: broadcast::Sender<WorkoutNotice>,
    ticker: SessionTicker,
    worker: Option<JoinHandle<()>>,
    deps: WorkerDeps,
    _lease: Arc<()>,
}

impl std::fmt::Debug for WorkoutSessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkoutSessionHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl WorkoutSessionHandle {
    /// Spawn the worker for a stored session, and the ticker when configured.
    pub(crate) fn spawn(deps: WorkerDeps, session: WorkoutSession, lease: Lease) -> Self {
        let session_id = session.id();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let (worker, view) = Worker::restore(deps.clone(), session, notices.clone());
        let (commands, rx) = mpsc::unbounded_channel();
        let Lease { token, alive } = lease;
        let worker = tokio::spawn(async move {
            let _alive = alive;
            worker.run(rx).await;
        });

        let mut ticker = SessionTicker::new(session_id, deps.config.tick_interval, commands.clone());
        if deps.config.start_ticker {
            ticker.start();
        }

        Self {
            session_id,
            commands,
            view,
            notices,
            ticker,
            worker: Some(worker),
            deps,
            _lease: token,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Latest published view, without waiting for queued work.
    #[must_use]
    pub fn view(&self) -> WorkoutView {
        self.view.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_view(&self) -> watch::Receiver<WorkoutView> {
        self.view.clone()
    }

    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<WorkoutNotice> {
        self.notices.subscribe()
    }

    /// Raw record feed straight from the store.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session is gone from the store.
    pub async fn subscribe_record(&self) -> Result<SessionSubscription, SessionError> {
        self.deps
            .sessions
            .subscribe_session(self.session_id)
            .await
            .map_err(|err| SessionError::from_storage(self.session_id, err))
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// `NOT_STARTED → IN_PROGRESS`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the session already started.
    pub async fn start(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::Start).await
    }

    /// Complete the cursor's set with the given weight and reps.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidInput` for non-positive values, a status
    /// error outside `IN_PROGRESS`, or `SessionError::Storage` if the write fails.
    pub async fn complete_current_set(
        &self,
        weight: f64,
        reps: u32,
    ) -> Result<SetCompletion, SessionError> {
        self.complete_set(SetPerformance::new(weight, reps)).await
    }

    /// Complete the cursor's set, with optional effort and notes.
    ///
    /// Broken personal records come back in the result and as a notice. A
    /// failing evaluator never fails the completion.
    ///
    /// # Errors
    ///
    /// Same as `complete_current_set`.
    pub async fn complete_set(
        &self,
        performance: SetPerformance,
    ) -> Result<SetCompletion, SessionError> {
        self.call(|reply| Command::CompleteSet { performance, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns a status error outside `IN_PROGRESS`, or a storage error.
    pub async fn skip_current_set(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::SkipSet).await
    }

    /// End the rest early; identical to the countdown running out.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless resting.
    pub async fn skip_rest(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::SkipRest).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless in progress or resting.
    pub async fn pause(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::Pause).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless paused.
    pub async fn resume(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::Resume).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Finished` for terminal sessions.
    pub async fn add_set(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::AddSet).await
    }

    /// Remove the last set of the cursor's exercise.
    ///
    /// On the only set of the only exercise nothing changes and the view asks
    /// for `Confirmation::AbandonWorkout`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` for terminal sessions.
    pub async fn remove_set(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::RemoveSet).await
    }

    /// Append catalog exercises with one placeholder set each. Unknown ids are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidInput` when none of the ids resolve.
    pub async fn add_exercises(&self, ids: Vec<ExerciseId>) -> Result<WorkoutView, SessionError> {
        self.call(|reply| Command::AddExercises { ids, reply }).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidInput` for an unknown exercise id.
    pub async fn replace_current_exercise(
        &self,
        id: ExerciseId,
    ) -> Result<WorkoutView, SessionError> {
        self.call(|reply| Command::ReplaceExercise { id, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidInput` for an index outside the plan.
    pub async fn select_exercise(&self, index: usize) -> Result<WorkoutView, SessionError> {
        self.call(|reply| Command::SelectExercise { index, reply })
            .await
    }

    /// Edit the input fields. Nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidInput` for a negative weight.
    pub async fn update_inputs(&self, weight: f64, reps: u32) -> Result<WorkoutView, SessionError> {
        self.call(|reply| Command::UpdateInputs {
            weight,
            reps,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Finished` for terminal sessions.
    pub async fn set_notes(&self, notes: impl Into<String>) -> Result<WorkoutView, SessionError> {
        let notes = notes.into();
        self.call(|reply| Command::SetNotes { notes, reply }).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Finished` if the session already ended.
    pub async fn complete(&self) -> Result<WorkoutView, SessionError> {
        self.call(|reply| Command::Finish {
            status: SessionStatus::Completed,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Finished` if the session already ended.
    pub async fn abandon(&self) -> Result<WorkoutView, SessionError> {
        self.call(|reply| Command::Finish {
            status: SessionStatus::Abandoned,
            reply,
        })
        .await
    }

    /// Run one tick now and wait for it, independent of the ticker.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if a tick-driven write fails.
    pub async fn tick(&self) -> Result<WorkoutView, SessionError> {
        self.call(|reply| Command::Tick(Some(reply))).await
    }

    /// View after everything queued so far has been handled.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the worker has stopped.
    pub async fn snapshot(&self) -> Result<WorkoutView, SessionError> {
        self.call(Command::Snapshot).await
    }

    pub fn start_ticker(&mut self) {
        self.ticker.start();
    }

    pub fn stop_ticker(&mut self) {
        self.ticker.stop();
    }

    #[must_use]
    pub fn ticker_running(&self) -> bool {
        self.ticker.is_running()
    }

    /// Stop observing: the ticker halts and queued commands drain first.
    /// The session itself is neither paused nor finished.
    pub async fn stop(mut self) {
        self.ticker.stop();
        let worker = self.worker.take();
        drop(self);
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}
