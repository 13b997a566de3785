//! Per-session worker: the single consumer of a session's command queue.
//!
//! Every command reads the latest stored record, applies a pure transition,
//! writes the result, and only then moves the cursor and publishes a view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lift_core::Clock;
use lift_core::model::{ExerciseId, NewRecord, SessionStatus, WorkoutSession};
use lift_core::workout::{
    RestCountdown, SessionCursor, SessionRules, SetPerformance, Step, StepOutcome, WorkoutError,
    machine,
};
use storage::repository::{ExerciseCatalog, WorkoutSessionRepository};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::view::{SetCompletion, WorkoutNotice, WorkoutView};
use crate::config::WorkoutConfig;
use crate::error::SessionError;
use crate::records::{PerformedSet, PersonalRecordEvaluator};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

pub(crate) enum Command {
    Start(Reply<WorkoutView>),
    CompleteSet {
        performance: SetPerformance,
        reply: Reply<SetCompletion>,
    },
    SkipSet(Reply<WorkoutView>),
    SkipRest(Reply<WorkoutView>),
    Pause(Reply<WorkoutView>),
    Resume(Reply<WorkoutView>),
    AddSet(Reply<WorkoutView>),
    RemoveSet(Reply<WorkoutView>),
    AddExercises {
        ids: Vec<ExerciseId>,
        reply: Reply<WorkoutView>,
    },
    ReplaceExercise {
        id: ExerciseId,
        reply: Reply<WorkoutView>,
    },
    SelectExercise {
        index: usize,
        reply: Reply<WorkoutView>,
    },
    UpdateInputs {
        weight: f64,
        reps: u32,
        reply: Reply<WorkoutView>,
    },
    SetNotes {
        notes: String,
        reply: Reply<WorkoutView>,
    },
    Finish {
        status: SessionStatus,
        reply: Reply<WorkoutView>,
    },
    /// `None` for ticker ticks, `Some` when a caller waits for the result.
    Tick(Option<Reply<WorkoutView>>),
    Snapshot(Reply<WorkoutView>),
}

/// Collaborators shared by every session worker.
#[derive(Clone)]
pub(crate) struct WorkerDeps {
    pub sessions: Arc<dyn WorkoutSessionRepository>,
    pub catalog: Arc<dyn ExerciseCatalog>,
    pub evaluator: Arc<dyn PersonalRecordEvaluator>,
    pub clock: Clock,
    pub config: WorkoutConfig,
}

pub(crate) struct Worker {
    deps: WorkerDeps,
    rules: SessionRules,
    session: WorkoutSession,
    cursor: SessionCursor,
    countdown: Option<RestCountdown>,
    elapsed_ms: i64,
    confirm_abandon: bool,
    view: watch::Sender<WorkoutView>,
    notices: broadcast::Sender<WorkoutNotice>,
}

impl Worker {
    /// Rebuild transient state (cursor, countdown) from a stored record.
    pub(crate) fn restore(
        deps: WorkerDeps,
        session: WorkoutSession,
        notices: broadcast::Sender<WorkoutNotice>,
    ) -> (Self, watch::Receiver<WorkoutView>) {
        let now = deps.clock.now();
        let cursor = SessionCursor::restore(&session);
        let countdown = RestCountdown::restore(&session, now);
        let elapsed_ms = session.elapsed_active_ms(now);
        let initial = WorkoutView::build(&session, &cursor, countdown.as_ref(), elapsed_ms, false);
        let (view, view_rx) = watch::channel(initial);
        let rules = deps.config.rules();
        let worker = Self {
            deps,
            rules,
            session,
            cursor,
            countdown,
            elapsed_ms,
            confirm_abandon: false,
            view,
            notices,
        };
        (worker, view_rx)
    }

    /// Drain the queue until every sender is gone.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let session_id = self.session.id();
        tracing::debug!(target: "lift::workout", session = %session_id, "worker started");
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        tracing::debug!(target: "lift::workout", session = %session_id, "worker stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let result = self
                    .apply("start", |session, _, now, _| machine::start(session, now))
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::CompleteSet { performance, reply } => {
                let result = self.complete_set(performance).await;
                respond(reply, result);
            }
            Command::SkipSet(reply) => {
                let result = self
                    .apply("skip_set", |session, cursor, now, rules| {
                        machine::skip_set(session, cursor, now, rules)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::SkipRest(reply) => {
                let result = self
                    .apply("skip_rest", |session, cursor, _, _| {
                        machine::finish_rest(session, cursor)
                    })
                    .await;
                if result.is_ok() {
                    self.notify_rest_finished();
                }
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::Pause(reply) => {
                let result = self
                    .apply("pause", |session, cursor, now, _| {
                        machine::pause(session, cursor, now)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::Resume(reply) => {
                let result = self
                    .apply("resume", |session, cursor, now, _| {
                        machine::resume(session, cursor, now)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::AddSet(reply) => {
                let result = self
                    .apply("add_set", |session, cursor, _, _| {
                        machine::add_set(session, cursor)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::RemoveSet(reply) => {
                let result = self
                    .apply("remove_set", |session, cursor, _, _| {
                        machine::remove_set(session, cursor)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::AddExercises { ids, reply } => {
                let result = self.add_exercises(&ids).await;
                respond(reply, result);
            }
            Command::ReplaceExercise { id, reply } => {
                let result = self.replace_exercise(id).await;
                respond(reply, result);
            }
            Command::SelectExercise { index, reply } => {
                let result = self
                    .apply("select_exercise", |session, _, _, _| {
                        machine::select_exercise(session, index)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::UpdateInputs {
                weight,
                reps,
                reply,
            } => {
                respond(reply, self.update_inputs(weight, reps));
            }
            Command::SetNotes { notes, reply } => {
                let result = self
                    .apply("set_notes", |session, cursor, _, _| {
                        machine::set_notes(session, cursor, &notes)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::Finish { status, reply } => {
                let result = self
                    .apply("finish", |session, cursor, now, _| {
                        machine::finish(session, cursor, status, now)
                    })
                    .await;
                respond(reply, result.map(|_| self.current_view()));
            }
            Command::Tick(reply) => {
                let result = self.tick().await;
                match reply {
                    Some(reply) => respond(reply, result.map(|()| self.current_view())),
                    None => {
                        if let Err(err) = result {
                            tracing::warn!(target: "lift::ticker", session = %self.session.id(), error = %err, "tick failed");
                        }
                    }
                }
            }
            Command::Snapshot(reply) => {
                respond(reply, Ok(self.current_view()));
            }
        }
    }

    async fn load(&self) -> Result<WorkoutSession, SessionError> {
        let id = self.session.id();
        self.deps
            .sessions
            .get_session(id)
            .await
            .map_err(|err| SessionError::from_storage(id, err))
    }

    async fn persist(&self, session: &WorkoutSession, action: &'static str) -> Result<(), SessionError> {
        if let Err(err) = self.deps.sessions.put_session(session).await {
            tracing::error!(
                target: "lift::workout",
                session = %session.id(),
                action,
                error = %err,
                "session write failed; cursor left unchanged"
            );
            return Err(SessionError::from_storage(session.id(), err));
        }
        Ok(())
    }

    /// Read, transition, write, then commit the cursor. Any failure leaves the
    /// worker exactly as it was.
    async fn apply<F>(&mut self, action: &'static str, transition: F) -> Result<Step, SessionError>
    where
        F: FnOnce(
            &WorkoutSession,
            &SessionCursor,
            DateTime<Utc>,
            &SessionRules,
        ) -> Result<Step, WorkoutError>,
    {
        let current = self.load().await?;
        let now = self.deps.clock.now();
        let step = transition(&current, &self.cursor, now, &self.rules).map_err(|err| {
            tracing::debug!(target: "lift::workout", session = %current.id(), action, error = %err, "transition rejected");
            SessionError::from(err)
        })?;

        if step.needs_write() {
            self.persist(&step.session, action).await?;
        }
        self.commit(&step, now, action);
        Ok(step)
    }

    fn commit(&mut self, step: &Step, now: DateTime<Utc>, action: &'static str) {
        self.session = step.session.clone();
        self.cursor = step.cursor;
        self.elapsed_ms = self.session.elapsed_active_ms(now);
        self.confirm_abandon = step.outcome == StepOutcome::ConfirmAbandon;
        self.countdown = match step.outcome {
            StepOutcome::Resting { rest_ms } => Some(RestCountdown::new(rest_ms)),
            _ if self.session.status() == SessionStatus::Resting => self.countdown,
            _ => None,
        };

        let id = self.session.id();
        match step.outcome {
            StepOutcome::Started | StepOutcome::Paused | StepOutcome::Resumed => {
                tracing::info!(target: "lift::workout", session = %id, action, status = %self.session.status(), "session lifecycle");
            }
            StepOutcome::Finished(status) => {
                tracing::info!(
                    target: "lift::workout",
                    session = %id,
                    %status,
                    completion = self.session.completion_percentage(),
                    volume = self.session.total_volume(),
                    "session finished"
                );
                self.notify(WorkoutNotice::Finished { status });
            }
            StepOutcome::AllSetsDone => {
                tracing::info!(target: "lift::workout", session = %id, "all sets done; awaiting confirmation");
                self.notify(WorkoutNotice::AllSetsDone);
            }
            StepOutcome::ConfirmAbandon => {
                self.notify(WorkoutNotice::ConfirmAbandon);
            }
            StepOutcome::AutoPaused => {
                tracing::info!(target: "lift::workout", session = %id, elapsed_ms = self.elapsed_ms, "maximum duration reached; session paused");
                self.notify(WorkoutNotice::AutoPaused {
                    elapsed_ms: self.elapsed_ms,
                });
            }
            StepOutcome::Updated | StepOutcome::Resting { .. } | StepOutcome::Advanced => {}
        }
        tracing::debug!(
            target: "lift::workout",
            session = %id,
            action,
            outcome = ?step.outcome,
            exercise = self.cursor.exercise_index,
            set = self.cursor.set_index,
            "transition applied"
        );
        self.publish();
    }

    async fn complete_set(
        &mut self,
        performance: SetPerformance,
    ) -> Result<SetCompletion, SessionError> {
        let at = self.cursor;
        let step = self
            .apply("complete_set", |session, cursor, now, rules| {
                machine::complete_set(session, cursor, &performance, now, rules)
            })
            .await?;

        let new_records = match step.session.exercise(at.exercise_index) {
            Some(exercise) => {
                let performed = PerformedSet {
                    user_id: step.session.user_id(),
                    exercise_id: exercise.exercise_id(),
                    exercise_name: exercise.name().to_owned(),
                    weight: performance.weight,
                    reps: performance.reps,
                    session_id: Some(step.session.id()),
                    achieved_at: self.deps.clock.now(),
                };
                self.evaluate_records(&performed).await
            }
            None => Vec::new(),
        };

        Ok(SetCompletion {
            view: self.current_view(),
            new_records,
        })
    }

    /// Runs after the write; a failure or timeout only costs the notification.
    async fn evaluate_records(&self, performed: &PerformedSet) -> Vec<NewRecord> {
        let timeout = self.deps.config.record_timeout;
        let records =
            match tokio::time::timeout(timeout, self.deps.evaluator.evaluate(performed)).await {
                Ok(Ok(records)) => records,
                Ok(Err(err)) => {
                    tracing::warn!(
                        target: "lift::records",
                        session = %self.session.id(),
                        exercise = %performed.exercise_name,
                        error = %err,
                        "record evaluation failed"
                    );
                    Vec::new()
                }
                Err(_) => {
                    tracing::warn!(
                        target: "lift::records",
                        session = %self.session.id(),
                        exercise = %performed.exercise_name,
                        ?timeout,
                        "record evaluation timed out"
                    );
                    Vec::new()
                }
            };

        if !records.is_empty() {
            self.notify(WorkoutNotice::NewRecords {
                exercise_id: performed.exercise_id,
                exercise_name: performed.exercise_name.clone(),
                records: records.clone(),
            });
        }
        records
    }

    async fn add_exercises(&mut self, ids: &[ExerciseId]) -> Result<WorkoutView, SessionError> {
        let found = self.deps.catalog.resolve(ids).await?;
        if found.len() < ids.len() {
            let missing: Vec<_> = ids
                .iter()
                .filter(|id| !found.iter().any(|e| e.id == **id))
                .collect();
            tracing::warn!(target: "lift::workout", session = %self.session.id(), ?missing, "unknown exercises ignored");
        }
        if found.is_empty() {
            return Err(SessionError::InvalidInput("no known exercises to add"));
        }

        let placeholder = self.deps.config.placeholder_set;
        self.apply("add_exercises", |session, cursor, _, rules| {
            machine::add_exercises(session, cursor, &found, placeholder, rules)
        })
        .await?;
        Ok(self.current_view())
    }

    async fn replace_exercise(&mut self, id: ExerciseId) -> Result<WorkoutView, SessionError> {
        let Some(replacement) = self.deps.catalog.resolve(&[id]).await?.into_iter().next() else {
            tracing::warn!(target: "lift::workout", session = %self.session.id(), exercise = %id, "unknown replacement exercise");
            return Err(SessionError::InvalidInput("unknown exercise"));
        };
        self.apply("replace_exercise", |session, cursor, _, _| {
            machine::replace_exercise(session, cursor, &replacement)
        })
        .await?;
        Ok(self.current_view())
    }

    fn update_inputs(&mut self, weight: f64, reps: u32) -> Result<WorkoutView, SessionError> {
        if self.session.status().is_terminal() {
            return Err(SessionError::Finished(self.session.status()));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(SessionError::InvalidInput("weight must not be negative"));
        }
        self.cursor = self.cursor.with_inputs(weight, reps);
        self.publish();
        Ok(self.current_view())
    }

    async fn tick(&mut self) -> Result<(), SessionError> {
        let current = self.load().await?;
        let now = self.deps.clock.now();
        let step_ms = self.deps.config.tick_step_ms();
        let tick = machine::tick(
            &current,
            &self.cursor,
            self.countdown,
            step_ms,
            now,
            &self.rules,
        );

        self.session = current;
        self.elapsed_ms = tick.elapsed_ms;
        let Some(step) = tick.step else {
            self.countdown = tick.countdown;
            self.publish();
            return Ok(());
        };

        if let Err(err) = self.persist(&step.session, "tick").await {
            // An expired rest stays expired so the next tick retries it.
            if self.session.status() == SessionStatus::Resting {
                self.countdown = Some(RestCountdown::new(0));
            }
            self.publish();
            return Err(err);
        }
        let rest_ended = self.session.status() == SessionStatus::Resting
            && step.session.status() != SessionStatus::Resting;
        self.commit(&step, now, "tick");
        self.elapsed_ms = tick.elapsed_ms;
        if rest_ended {
            self.notify_rest_finished();
        }
        Ok(())
    }

    fn notify_rest_finished(&self) {
        self.notify(WorkoutNotice::RestFinished {
            exercise_index: self.cursor.exercise_index,
            set_index: self.cursor.set_index,
        });
    }

    fn notify(&self, notice: WorkoutNotice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }

    fn current_view(&self) -> WorkoutView {
        WorkoutView::build(
            &self.session,
            &self.cursor,
            self.countdown.as_ref(),
            self.elapsed_ms,
            self.confirm_abandon,
        )
    }

    fn publish(&self) {
        self.view.send_replace(self.current_view());
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, SessionError>) {
    // The caller may have given up waiting; the transition still stands.
    let _ = reply.send(result);
}
