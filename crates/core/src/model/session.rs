use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkoutError;
use crate::model::exercise::ExecutedExercise;
use crate::model::ids::{PlanId, SessionId, UserId};
use crate::model::plan::{PlannedExercise, WorkoutPlan};
use crate::time::millis_between;
use crate::workout::progress;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle status of a workout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Paused,
    Resting,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// `Completed` and `Abandoned` are final; the record is frozen afterwards.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Statuses that count against the one-active-session-per-user rule.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::Paused | Self::Resting)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Resting => "resting",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid session status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for SessionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "resting" => Ok(Self::Resting),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

//
// ─── REST WINDOW ───────────────────────────────────────────────────────────────
//

/// Persisted rest countdown, kept so a resting session survives a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestWindow {
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RestWindow {
    /// Milliseconds left at `now` according to the wall clock.
    #[must_use]
    pub fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.duration_ms - millis_between(self.started_at, now)).max(0)
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One execution attempt of a workout plan.
///
/// `completion_percentage` and `total_volume` are caches over `exercises`; every
/// mutation of executed sets refreshes them before the record leaves this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    id: SessionId,
    plan_id: PlanId,
    user_id: UserId,
    plan_name: String,
    original_plan: Vec<PlannedExercise>,
    pub(crate) exercises: Vec<ExecutedExercise>,
    pub(crate) status: SessionStatus,
    created_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) ended_at: Option<DateTime<Utc>>,
    pub(crate) pause_started_at: Option<DateTime<Utc>>,
    pub(crate) paused_ms: i64,
    pub(crate) rest: Option<RestWindow>,
    completion_percentage: f64,
    total_volume: f64,
    pub(crate) notes: String,
    pub(crate) plan_modified: bool,
}

impl WorkoutSession {
    /// Snapshot a plan into a fresh, not-yet-started session.
    ///
    /// # Errors
    ///
    /// Returns `WorkoutError::NoExercises` for an empty plan and
    /// `WorkoutError::EmptyExercise` when an exercise has no planned sets.
    pub fn from_plan(
        id: SessionId,
        user_id: UserId,
        plan: &WorkoutPlan,
        created_at: DateTime<Utc>,
    ) -> Result<Self, WorkoutError> {
        if plan.exercises.is_empty() {
            return Err(WorkoutError::NoExercises);
        }
        if let Some(index) = plan.exercises.iter().position(|e| e.sets.is_empty()) {
            return Err(WorkoutError::EmptyExercise { index });
        }

        let exercises = plan
            .exercises
            .iter()
            .zip(0_u32..)
            .map(|(planned, order)| ExecutedExercise::from_planned(planned, order))
            .collect();

        let mut session = Self {
            id,
            plan_id: plan.id,
            user_id,
            plan_name: plan.name.clone(),
            original_plan: plan.exercises.clone(),
            exercises,
            status: SessionStatus::NotStarted,
            created_at,
            started_at: None,
            ended_at: None,
            pause_started_at: None,
            paused_ms: 0,
            rest: None,
            completion_percentage: 0.0,
            total_volume: 0.0,
            notes: String::new(),
            plan_modified: false,
        };
        session.refresh_aggregates();
        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    /// The plan as it was when the session was created.
    #[must_use]
    pub fn original_plan(&self) -> &[PlannedExercise] {
        &self.original_plan
    }

    /// The current plan snapshot, including everything executed so far.
    #[must_use]
    pub fn exercises(&self) -> &[ExecutedExercise] {
        &self.exercises
    }

    #[must_use]
    pub fn exercise(&self, index: usize) -> Option<&ExecutedExercise> {
        self.exercises.get(index)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn pause_started_at(&self) -> Option<DateTime<Utc>> {
        self.pause_started_at
    }

    /// Total time spent paused, excluding an interval that is still open.
    #[must_use]
    pub fn paused_duration(&self) -> Duration {
        Duration::milliseconds(self.paused_ms)
    }

    #[must_use]
    pub fn paused_ms(&self) -> i64 {
        self.paused_ms
    }

    #[must_use]
    pub fn rest(&self) -> Option<RestWindow> {
        self.rest
    }

    #[must_use]
    pub fn completion_percentage(&self) -> f64 {
        self.completion_percentage
    }

    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// True once the plan snapshot diverged from the original plan.
    #[must_use]
    pub fn plan_modified(&self) -> bool {
        self.plan_modified
    }

    /// True when every planned set has a completed or skipped record.
    #[must_use]
    pub fn all_sets_done(&self) -> bool {
        progress::is_all_done(&self.exercises)
    }

    /// Active training time at `now`.
    ///
    /// A paused session is measured up to its pause instant, a finished one up
    /// to its end, so the displayed clock freezes in both cases.
    #[must_use]
    pub fn elapsed_active_ms(&self, now: DateTime<Utc>) -> i64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let until = self
            .ended_at
            .or(self.pause_started_at)
            .unwrap_or(now);
        (millis_between(started_at, until) - self.paused_ms).max(0)
    }

    /// Recompute the cached aggregates from `exercises`.
    pub(crate) fn refresh_aggregates(&mut self) {
        self.completion_percentage = progress::completion_percentage(&self.exercises);
        self.total_volume = progress::total_volume(&self.exercises);
    }

    /// Renumber `order` after exercises were inserted or removed.
    pub(crate) fn reindex_exercises(&mut self) {
        for (exercise, order) in self.exercises.iter_mut().zip(0_u32..) {
            exercise.set_order(order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExerciseId, PlannedSet};
    use crate::time::fixed_now;

    fn plan() -> WorkoutPlan {
        WorkoutPlan::new(
            PlanId::new(3),
            "Push",
            vec![PlannedExercise::new(
                ExerciseId::new(1),
                "Bench Press",
                90,
                vec![PlannedSet::new(20.0, 10)],
            )],
        )
    }

    #[test]
    fn from_plan_starts_not_started_with_zero_aggregates() {
        let session =
            WorkoutSession::from_plan(SessionId::generate(), UserId::new(1), &plan(), fixed_now())
                .unwrap();
        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert_eq!(session.completion_percentage(), 0.0);
        assert_eq!(session.elapsed_active_ms(fixed_now()), 0);
        assert_eq!(session.original_plan().len(), 1);
    }

    #[test]
    fn empty_plan_is_rejected() {
        let empty = WorkoutPlan::new(PlanId::new(1), "Empty", Vec::new());
        let err = WorkoutSession::from_plan(SessionId::generate(), UserId::new(1), &empty, fixed_now())
            .unwrap_err();
        assert_eq!(err, WorkoutError::NoExercises);
    }

    #[test]
    fn exercise_without_sets_is_rejected() {
        let mut p = plan();
        p.exercises[0].sets.clear();
        let err = WorkoutSession::from_plan(SessionId::generate(), UserId::new(1), &p, fixed_now())
            .unwrap_err();
        assert_eq!(err, WorkoutError::EmptyExercise { index: 0 });
    }

    #[test]
    fn status_roundtrips_through_str() {
        for status in [
            SessionStatus::NotStarted,
            SessionStatus::InProgress,
            SessionStatus::Paused,
            SessionStatus::Resting,
            SessionStatus::Completed,
            SessionStatus::Abandoned,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("warming_up".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn rest_window_counts_down_by_wall_clock() {
        let window = RestWindow {
            started_at: fixed_now(),
            duration_ms: 90_000,
        };
        assert_eq!(window.remaining_ms(fixed_now() + Duration::seconds(30)), 60_000);
        assert_eq!(window.remaining_ms(fixed_now() + Duration::seconds(120)), 0);
    }

    #[test]
    fn session_survives_json_roundtrip() {
        let session =
            WorkoutSession::from_plan(SessionId::generate(), UserId::new(1), &plan(), fixed_now())
                .unwrap();
        let json = serde_json::to_string(&session).unwrap();
        let back: WorkoutSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
