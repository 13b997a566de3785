//! Pure session transitions.
//!
//! Every transition takes the latest stored session and the current cursor and
//! returns a brand new `(session, cursor)` pair. Nothing is mutated in place, so
//! a failed transition (or a failed write of its result) leaves the caller with
//! exactly what it had before.

use chrono::{DateTime, Utc};

use crate::error::WorkoutError;
use crate::model::{
    ExecutedExercise, ExecutedSet, ExerciseSummary, PlannedExercise, PlannedSet, RestWindow,
    SessionStatus, WorkoutSession, set_number,
};
use crate::time::millis_between;
use crate::workout::cursor::SessionCursor;
use crate::workout::rest::RestCountdown;

/// Three hours of active time.
pub const DEFAULT_MAX_ACTIVE_MS: i64 = 3 * 60 * 60 * 1_000;

//
// ─── RULES & INPUT ─────────────────────────────────────────────────────────────
//

/// Tunables for the transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionRules {
    /// Active time after which an in-progress session is paused automatically.
    pub max_active_ms: i64,
    /// Complete the session as soon as every set is done instead of asking.
    pub auto_complete_when_done: bool,
    /// Rest applied to exercises appended mid-session.
    pub default_rest_seconds: u32,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            max_active_ms: DEFAULT_MAX_ACTIVE_MS,
            auto_complete_when_done: false,
            default_rest_seconds: 60,
        }
    }
}

/// What the user entered for a set.
#[derive(Debug, Clone, PartialEq)]
pub struct SetPerformance {
    pub weight: f64,
    pub reps: u32,
    pub effort: Option<u8>,
    pub notes: Option<String>,
}

impl SetPerformance {
    #[must_use]
    pub fn new(weight: f64, reps: u32) -> Self {
        Self {
            weight,
            reps,
            effort: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_effort(mut self, effort: u8) -> Self {
        self.effort = Some(effort);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn validate(&self) -> Result<(), WorkoutError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(WorkoutError::InvalidInput("weight must be greater than zero"));
        }
        if self.reps == 0 {
            return Err(WorkoutError::InvalidInput("reps must be greater than zero"));
        }
        if self.effort.is_some_and(|e| !(1..=10).contains(&e)) {
            return Err(WorkoutError::InvalidInput("effort must be between 1 and 10"));
        }
        Ok(())
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// What a transition did, for the caller to react to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Started,
    /// Plan or notes changed; no status change.
    Updated,
    /// A set was completed and a rest countdown began.
    Resting { rest_ms: i64 },
    /// The cursor moved on and the session is in progress.
    Advanced,
    /// Every planned set is done; waiting for an explicit completion.
    AllSetsDone,
    /// Removing the set would empty the plan; ask before abandoning.
    ConfirmAbandon,
    Paused,
    Resumed,
    /// The maximum-duration guard paused the session.
    AutoPaused,
    Finished(SessionStatus),
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub session: WorkoutSession,
    pub cursor: SessionCursor,
    pub outcome: StepOutcome,
}

impl Step {
    fn new(session: WorkoutSession, cursor: SessionCursor, outcome: StepOutcome) -> Self {
        Self {
            session,
            cursor,
            outcome,
        }
    }

    /// False when the transition only asks for confirmation and changed nothing.
    #[must_use]
    pub fn needs_write(&self) -> bool {
        self.outcome != StepOutcome::ConfirmAbandon
    }
}

//
// ─── GUARDS ────────────────────────────────────────────────────────────────────
//

fn ensure_open(session: &WorkoutSession) -> Result<(), WorkoutError> {
    if session.status.is_terminal() {
        return Err(WorkoutError::Finished(session.status));
    }
    Ok(())
}

fn require(
    session: &WorkoutSession,
    allowed: &[SessionStatus],
    action: &'static str,
) -> Result<(), WorkoutError> {
    ensure_open(session)?;
    if allowed.contains(&session.status) {
        Ok(())
    } else {
        Err(WorkoutError::InvalidTransition {
            from: session.status,
            action,
        })
    }
}

fn planned_at(
    session: &WorkoutSession,
    cursor: &SessionCursor,
) -> Result<PlannedSet, WorkoutError> {
    session
        .exercise(cursor.exercise_index)
        .and_then(|e| e.planned_sets().get(cursor.set_index))
        .copied()
        .ok_or(WorkoutError::InvalidInput("cursor does not point at a planned set"))
}

fn close_pause(session: &mut WorkoutSession, now: DateTime<Utc>) {
    if let Some(paused_at) = session.pause_started_at.take() {
        session.paused_ms += millis_between(paused_at, now);
    }
}

/// Drop an in-flight rest whose anchor set no longer sits under the cursor.
fn abort_rest(session: &mut WorkoutSession) {
    if session.rest.take().is_some() && session.status == SessionStatus::Resting {
        session.status = SessionStatus::InProgress;
    }
}

fn finish_in_place(session: &mut WorkoutSession, status: SessionStatus, now: DateTime<Utc>) {
    close_pause(session, now);
    session.rest = None;
    session.ended_at = Some(now);
    session.status = status;
    session.refresh_aggregates();
}

/// Shared tail of complete/skip once the set record is written.
fn after_set_recorded(
    mut session: WorkoutSession,
    cursor: SessionCursor,
    rest_ms: Option<i64>,
    now: DateTime<Utc>,
    rules: &SessionRules,
) -> Step {
    if session.all_sets_done() {
        if rules.auto_complete_when_done {
            finish_in_place(&mut session, SessionStatus::Completed, now);
            return Step::new(session, cursor, StepOutcome::Finished(SessionStatus::Completed));
        }
        return Step::new(session, cursor, StepOutcome::AllSetsDone);
    }

    match rest_ms {
        Some(rest_ms) if rest_ms > 0 => {
            session.status = SessionStatus::Resting;
            session.rest = Some(RestWindow {
                started_at: now,
                duration_ms: rest_ms,
            });
            Step::new(session, cursor, StepOutcome::Resting { rest_ms })
        }
        _ => {
            let next = cursor.advanced(&session);
            Step::new(session, next, StepOutcome::Advanced)
        }
    }
}

//
// ─── TRANSITIONS ───────────────────────────────────────────────────────────────
//

/// `NOT_STARTED → IN_PROGRESS`.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidTransition` unless the session is not started.
pub fn start(session: &WorkoutSession, now: DateTime<Utc>) -> Result<Step, WorkoutError> {
    require(session, &[SessionStatus::NotStarted], "start")?;
    let mut next = session.clone();
    next.status = SessionStatus::InProgress;
    next.started_at = Some(now);
    let cursor = SessionCursor::restore(&next);
    Ok(Step::new(next, cursor, StepOutcome::Started))
}

/// Record the cursor's set as completed.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidInput` for non-positive weight or reps and
/// `WorkoutError::InvalidTransition` unless the session is in progress.
pub fn complete_set(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    performance: &SetPerformance,
    now: DateTime<Utc>,
    rules: &SessionRules,
) -> Result<Step, WorkoutError> {
    performance.validate()?;
    require(session, &[SessionStatus::InProgress], "complete a set")?;
    let planned = planned_at(session, cursor)?;

    let mut next = session.clone();
    let exercise = &mut next.exercises[cursor.exercise_index];
    let rest_ms = i64::from(exercise.rest_seconds()) * 1_000;
    exercise.record_set(
        ExecutedSet::completed(
            set_number(cursor.set_index),
            planned,
            performance.weight,
            performance.reps,
            now,
        )
        .with_effort(performance.effort)
        .with_notes(performance.notes.clone()),
    );
    next.refresh_aggregates();

    let cursor = cursor.with_inputs(performance.weight, performance.reps);
    Ok(after_set_recorded(next, cursor, Some(rest_ms), now, rules))
}

/// Record the cursor's set as skipped and move on without resting.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidTransition` unless the session is in progress.
pub fn skip_set(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    now: DateTime<Utc>,
    rules: &SessionRules,
) -> Result<Step, WorkoutError> {
    require(session, &[SessionStatus::InProgress], "skip a set")?;
    let planned = planned_at(session, cursor)?;

    let mut next = session.clone();
    next.exercises[cursor.exercise_index].record_set(ExecutedSet::skipped(
        set_number(cursor.set_index),
        planned,
        now,
    ));
    next.refresh_aggregates();

    Ok(after_set_recorded(next, *cursor, None, now, rules))
}

/// Leave `RESTING`: advance the cursor and resume.
///
/// Countdown expiry and an explicit skip both go through here.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidTransition` unless the session is resting.
pub fn finish_rest(
    session: &WorkoutSession,
    cursor: &SessionCursor,
) -> Result<Step, WorkoutError> {
    require(session, &[SessionStatus::Resting], "end rest")?;
    let mut next = session.clone();
    next.rest = None;
    next.status = SessionStatus::InProgress;
    let cursor = cursor.advanced(&next);
    Ok(Step::new(next, cursor, StepOutcome::Advanced))
}

/// Manual pause. The rest window, if any, is kept so resume can finish it.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidTransition` unless in progress or resting.
pub fn pause(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    now: DateTime<Utc>,
) -> Result<Step, WorkoutError> {
    require(
        session,
        &[SessionStatus::InProgress, SessionStatus::Resting],
        "pause",
    )?;
    let mut next = session.clone();
    next.status = SessionStatus::Paused;
    next.pause_started_at = Some(now);
    Ok(Step::new(next, *cursor, StepOutcome::Paused))
}

/// Resume a paused session, folding the pause into the paused total.
///
/// A pause taken mid-rest ends that rest here, advancing the cursor once.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidTransition` unless the session is paused.
pub fn resume(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    now: DateTime<Utc>,
) -> Result<Step, WorkoutError> {
    require(session, &[SessionStatus::Paused], "resume")?;
    let mut next = session.clone();
    close_pause(&mut next, now);
    next.status = SessionStatus::InProgress;
    let cursor = if next.rest.take().is_some() {
        cursor.advanced(&next)
    } else {
        *cursor
    };
    Ok(Step::new(next, cursor, StepOutcome::Resumed))
}

/// Append a copy of the last planned set to the cursor's exercise.
///
/// # Errors
///
/// Returns `WorkoutError::Finished` for terminal sessions.
pub fn add_set(
    session: &WorkoutSession,
    cursor: &SessionCursor,
) -> Result<Step, WorkoutError> {
    ensure_open(session)?;
    let mut next = session.clone();
    let exercise = next
        .exercises
        .get_mut(cursor.exercise_index)
        .ok_or(WorkoutError::InvalidInput("cursor does not point at an exercise"))?;
    let template = exercise
        .planned_sets()
        .last()
        .copied()
        .ok_or(WorkoutError::EmptyExercise {
            index: cursor.exercise_index,
        })?;
    exercise.push_planned_set(template);
    let new_index = exercise.planned_sets().len() - 1;
    let on_recorded_set = exercise.executed_set(set_number(cursor.set_index)).is_some();
    next.plan_modified = true;
    next.refresh_aggregates();

    // A pending rest advances onto the new set by itself. Otherwise a cursor
    // left on a recorded set must move, or the next completion overwrites it.
    let cursor = if on_recorded_set && next.rest.is_none() {
        SessionCursor::at(&next, cursor.exercise_index, new_index)
    } else {
        *cursor
    };
    Ok(Step::new(next, cursor, StepOutcome::Updated))
}

/// Drop the last planned set of the cursor's exercise.
///
/// Removing the only set of the only exercise changes nothing and returns
/// `StepOutcome::ConfirmAbandon`. An exercise left without sets is removed.
///
/// # Errors
///
/// Returns `WorkoutError::Finished` for terminal sessions.
pub fn remove_set(
    session: &WorkoutSession,
    cursor: &SessionCursor,
) -> Result<Step, WorkoutError> {
    ensure_open(session)?;
    let exercise = session
        .exercise(cursor.exercise_index)
        .ok_or(WorkoutError::InvalidInput("cursor does not point at an exercise"))?;
    let planned = exercise.planned_sets().len();

    if planned <= 1 && session.exercises().len() == 1 {
        return Ok(Step::new(
            session.clone(),
            *cursor,
            StepOutcome::ConfirmAbandon,
        ));
    }

    let mut next = session.clone();
    let next_cursor = if planned <= 1 {
        next.exercises.remove(cursor.exercise_index);
        next.reindex_exercises();
        abort_rest(&mut next);
        let index = cursor.exercise_index.min(next.exercises.len() - 1);
        SessionCursor::for_exercise(&next, index)
    } else {
        next.exercises[cursor.exercise_index].pop_planned_set();
        let remaining = planned - 1;
        if cursor.set_index >= remaining {
            abort_rest(&mut next);
            SessionCursor::for_exercise(&next, cursor.exercise_index)
        } else {
            *cursor
        }
    };
    next.plan_modified = true;
    next.refresh_aggregates();

    let outcome = if next.all_sets_done() {
        StepOutcome::AllSetsDone
    } else {
        StepOutcome::Updated
    };
    Ok(Step::new(next, next_cursor, outcome))
}

/// Append catalog exercises, each with a single placeholder set.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidInput` when `exercises` is empty and
/// `WorkoutError::Finished` for terminal sessions.
pub fn add_exercises(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    exercises: &[ExerciseSummary],
    placeholder: PlannedSet,
    rules: &SessionRules,
) -> Result<Step, WorkoutError> {
    ensure_open(session)?;
    if exercises.is_empty() {
        return Err(WorkoutError::InvalidInput("no exercises to add"));
    }

    let was_done = session.all_sets_done();
    let first_new = session.exercises().len();
    let mut next = session.clone();
    for (summary, order) in exercises.iter().zip(u32::try_from(first_new).unwrap_or(u32::MAX)..) {
        let planned = PlannedExercise::new(
            summary.id,
            summary.name.clone(),
            rules.default_rest_seconds,
            vec![placeholder],
        )
        .with_media(summary.media());
        next.exercises
            .push(ExecutedExercise::from_planned(&planned, order));
    }
    next.plan_modified = true;
    next.refresh_aggregates();

    let cursor = if was_done {
        SessionCursor::at(&next, first_new, 0)
    } else {
        *cursor
    };
    Ok(Step::new(next, cursor, StepOutcome::Updated))
}

/// Swap the cursor's exercise for another catalog exercise.
///
/// # Errors
///
/// Returns `WorkoutError::Finished` for terminal sessions.
pub fn replace_exercise(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    replacement: &ExerciseSummary,
) -> Result<Step, WorkoutError> {
    ensure_open(session)?;
    let mut next = session.clone();
    let exercise = next
        .exercises
        .get_mut(cursor.exercise_index)
        .ok_or(WorkoutError::InvalidInput("cursor does not point at an exercise"))?;
    exercise.replace_with(replacement.id, replacement.name.clone(), replacement.media());
    abort_rest(&mut next);
    next.plan_modified = true;
    next.refresh_aggregates();
    let cursor = SessionCursor::at(&next, cursor.exercise_index, 0);
    Ok(Step::new(next, cursor, StepOutcome::Updated))
}

/// Explicit exercise selection by the user.
///
/// # Errors
///
/// Returns `WorkoutError::InvalidInput` for an index outside the plan.
pub fn select_exercise(
    session: &WorkoutSession,
    exercise_index: usize,
) -> Result<Step, WorkoutError> {
    ensure_open(session)?;
    if exercise_index >= session.exercises().len() {
        return Err(WorkoutError::InvalidInput("exercise index out of range"));
    }
    let mut next = session.clone();
    abort_rest(&mut next);
    let cursor = SessionCursor::for_exercise(&next, exercise_index);
    Ok(Step::new(next, cursor, StepOutcome::Updated))
}

/// Replace the session's free-text notes.
///
/// # Errors
///
/// Returns `WorkoutError::Finished` for terminal sessions.
pub fn set_notes(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    notes: &str,
) -> Result<Step, WorkoutError> {
    ensure_open(session)?;
    let mut next = session.clone();
    notes.clone_into(&mut next.notes);
    Ok(Step::new(next, *cursor, StepOutcome::Updated))
}

/// Terminal transition to `COMPLETED` or `ABANDONED`.
///
/// # Errors
///
/// Returns `WorkoutError::Finished` if the session already ended and
/// `WorkoutError::InvalidInput` for a non-terminal target status.
pub fn finish(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    status: SessionStatus,
    now: DateTime<Utc>,
) -> Result<Step, WorkoutError> {
    ensure_open(session)?;
    if !status.is_terminal() {
        return Err(WorkoutError::InvalidInput("finish requires a terminal status"));
    }
    let mut next = session.clone();
    if next.started_at.is_none() {
        next.started_at = Some(now);
    }
    finish_in_place(&mut next, status, now);
    Ok(Step::new(next, *cursor, StepOutcome::Finished(status)))
}

//
// ─── CLOCK ─────────────────────────────────────────────────────────────────────
//

/// Everything one clock tick derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub elapsed_ms: i64,
    pub countdown: Option<RestCountdown>,
    /// Transition the tick triggered, if any.
    pub step: Option<Step>,
}

/// One clock tick: elapsed time, rest countdown, then the duration guard.
///
/// A missing `countdown` on a resting session is rebuilt from the stored rest
/// window. Rest expiry goes through `finish_rest`, exactly like a manual skip.
#[must_use]
pub fn tick(
    session: &WorkoutSession,
    cursor: &SessionCursor,
    countdown: Option<RestCountdown>,
    step_ms: i64,
    now: DateTime<Utc>,
    rules: &SessionRules,
) -> Tick {
    let elapsed_ms = session.elapsed_active_ms(now);

    let mut countdown = match session.status() {
        SessionStatus::Resting => countdown.or_else(|| RestCountdown::restore(session, now)),
        _ => None,
    };

    let mut step = None;
    if let Some(c) = countdown.as_mut() {
        if c.tick(step_ms) {
            step = finish_rest(session, cursor).ok();
            countdown = None;
        }
    }

    let (current, current_cursor) = step
        .as_ref()
        .map_or((session, cursor), |s| (&s.session, &s.cursor));
    if current.status() == SessionStatus::InProgress && elapsed_ms > rules.max_active_ms {
        let mut paused = current.clone();
        paused.status = SessionStatus::Paused;
        paused.pause_started_at = Some(now);
        step = Some(Step::new(paused, *current_cursor, StepOutcome::AutoPaused));
    }

    Tick {
        elapsed_ms,
        countdown,
        step,
    }
}
