use serde::Serialize;

use lift_core::model::{
    ExerciseId, NewRecord, PlannedSet, SessionId, SessionStatus, WorkoutSession, set_number,
};
use lift_core::workout::{RestCountdown, SessionCursor};

/// Which explicit confirmation the session is waiting for, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// Every planned set is done; `complete()` finishes the workout.
    CompleteWorkout,
    /// The last set of the only exercise was about to be removed.
    AbandonWorkout,
}

/// Presentation-agnostic snapshot of a live session.
///
/// Rebuilt after every transition and every tick. It carries raw numbers only;
/// formatting is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutView {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub plan_name: String,

    pub exercise_index: usize,
    pub set_index: usize,
    pub exercise_id: Option<ExerciseId>,
    pub exercise_name: Option<String>,
    /// 1-based number of the cursor's set.
    pub set_number: u32,
    pub sets_in_exercise: usize,
    pub target: Option<PlannedSet>,
    pub weight_input: f64,
    pub reps_input: u32,

    pub elapsed_ms: i64,
    pub rest_remaining_ms: Option<i64>,
    pub completion_percentage: f64,
    pub total_volume: f64,
    pub plan_modified: bool,
    pub confirmation: Option<Confirmation>,
}

impl WorkoutView {
    #[must_use]
    pub(crate) fn build(
        session: &WorkoutSession,
        cursor: &SessionCursor,
        countdown: Option<&RestCountdown>,
        elapsed_ms: i64,
        confirm_abandon: bool,
    ) -> Self {
        let exercise = session.exercise(cursor.exercise_index);
        let confirmation = if session.status().is_terminal() {
            None
        } else if confirm_abandon {
            Some(Confirmation::AbandonWorkout)
        } else if session.all_sets_done() {
            Some(Confirmation::CompleteWorkout)
        } else {
            None
        };

        Self {
            session_id: session.id(),
            status: session.status(),
            plan_name: session.plan_name().to_owned(),
            exercise_index: cursor.exercise_index,
            set_index: cursor.set_index,
            exercise_id: exercise.map(|e| e.exercise_id()),
            exercise_name: exercise.map(|e| e.name().to_owned()),
            set_number: set_number(cursor.set_index),
            sets_in_exercise: exercise.map_or(0, |e| e.planned_sets().len()),
            target: exercise.and_then(|e| e.planned_sets().get(cursor.set_index).copied()),
            weight_input: cursor.weight_input,
            reps_input: cursor.reps_input,
            elapsed_ms,
            rest_remaining_ms: countdown.map(|c| c.remaining_ms().max(0)),
            completion_percentage: session.completion_percentage(),
            total_volume: session.total_volume(),
            plan_modified: session.plan_modified(),
            confirmation,
        }
    }

    #[must_use]
    pub fn is_resting(&self) -> bool {
        self.status == SessionStatus::Resting
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Side-channel events published by a running session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkoutNotice {
    NewRecords {
        exercise_id: ExerciseId,
        exercise_name: String,
        records: Vec<NewRecord>,
    },
    /// The rest ended, by countdown or by skip, and the cursor moved on.
    RestFinished {
        exercise_index: usize,
        set_index: usize,
    },
    AutoPaused { elapsed_ms: i64 },
    AllSetsDone,
    ConfirmAbandon,
    Finished { status: SessionStatus },
}

/// Result of completing a set.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCompletion {
    pub view: WorkoutView,
    /// Records broken by this set. Empty when the evaluator failed or timed out.
    pub new_records: Vec<NewRecord>,
}
