use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ExerciseId;
use crate::model::plan::{ExerciseMedia, PlannedExercise, PlannedSet};

//
// ─── EXECUTED SET ──────────────────────────────────────────────────────────────
//

/// How a planned set ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOutcome {
    Completed,
    Skipped,
}

/// Performance record for one planned set.
///
/// Completed sets carry positive actual values; skipped sets carry zeros and
/// never contribute to volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedSet {
    set_number: u32,
    planned_weight: f64,
    planned_reps: u32,
    actual_weight: f64,
    actual_reps: u32,
    outcome: SetOutcome,
    completed_at: DateTime<Utc>,
    effort: Option<u8>,
    notes: Option<String>,
}

impl ExecutedSet {
    pub(crate) fn completed(
        set_number: u32,
        planned: PlannedSet,
        actual_weight: f64,
        actual_reps: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            set_number,
            planned_weight: planned.target_weight,
            planned_reps: planned.target_reps,
            actual_weight,
            actual_reps,
            outcome: SetOutcome::Completed,
            completed_at: at,
            effort: None,
            notes: None,
        }
    }

    pub(crate) fn skipped(set_number: u32, planned: PlannedSet, at: DateTime<Utc>) -> Self {
        Self {
            set_number,
            planned_weight: planned.target_weight,
            planned_reps: planned.target_reps,
            actual_weight: 0.0,
            actual_reps: 0,
            outcome: SetOutcome::Skipped,
            completed_at: at,
            effort: None,
            notes: None,
        }
    }

    pub(crate) fn with_effort(mut self, effort: Option<u8>) -> Self {
        self.effort = effort;
        self
    }

    pub(crate) fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// 1-based position of the set within its exercise.
    #[must_use]
    pub fn set_number(&self) -> u32 {
        self.set_number
    }

    #[must_use]
    pub fn planned_weight(&self) -> f64 {
        self.planned_weight
    }

    #[must_use]
    pub fn planned_reps(&self) -> u32 {
        self.planned_reps
    }

    #[must_use]
    pub fn actual_weight(&self) -> f64 {
        self.actual_weight
    }

    #[must_use]
    pub fn actual_reps(&self) -> u32 {
        self.actual_reps
    }

    #[must_use]
    pub fn outcome(&self) -> SetOutcome {
        self.outcome
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.outcome == SetOutcome::Completed
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.outcome == SetOutcome::Skipped
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Subjective effort (RPE, 1..=10) if the user entered one.
    #[must_use]
    pub fn effort(&self) -> Option<u8> {
        self.effort
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Weight × reps for completed sets, zero otherwise.
    #[must_use]
    pub fn volume(&self) -> f64 {
        match self.outcome {
            SetOutcome::Completed => self.actual_weight * f64::from(self.actual_reps),
            SetOutcome::Skipped => 0.0,
        }
    }
}

//
// ─── EXECUTED EXERCISE ─────────────────────────────────────────────────────────
//

/// One exercise of the current plan snapshot together with what was done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedExercise {
    exercise_id: ExerciseId,
    name: String,
    order: u32,
    planned_sets: Vec<PlannedSet>,
    executed_sets: Vec<ExecutedSet>,
    rest_seconds: u32,
    #[serde(default)]
    media: ExerciseMedia,
    is_completed: bool,
    replaced_from: Option<ExerciseId>,
}

impl ExecutedExercise {
    pub(crate) fn from_planned(planned: &PlannedExercise, order: u32) -> Self {
        Self {
            exercise_id: planned.exercise_id,
            name: planned.name.clone(),
            order,
            planned_sets: planned.sets.clone(),
            executed_sets: Vec::new(),
            rest_seconds: planned.rest_seconds,
            media: planned.media.clone(),
            is_completed: false,
            replaced_from: None,
        }
    }

    #[must_use]
    pub fn exercise_id(&self) -> ExerciseId {
        self.exercise_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn planned_sets(&self) -> &[PlannedSet] {
        &self.planned_sets
    }

    /// Executed sets, ordered by set number.
    #[must_use]
    pub fn executed_sets(&self) -> &[ExecutedSet] {
        &self.executed_sets
    }

    #[must_use]
    pub fn rest_seconds(&self) -> u32 {
        self.rest_seconds
    }

    #[must_use]
    pub fn media(&self) -> &ExerciseMedia {
        &self.media
    }

    /// True once every planned set has an executed record.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Exercise this one replaced, if it was swapped mid-session.
    #[must_use]
    pub fn replaced_from(&self) -> Option<ExerciseId> {
        self.replaced_from
    }

    #[must_use]
    pub fn executed_set(&self, set_number: u32) -> Option<&ExecutedSet> {
        self.executed_sets
            .iter()
            .find(|s| s.set_number == set_number)
    }

    /// Index of the first planned set without an executed record.
    #[must_use]
    pub fn first_open_set(&self) -> Option<usize> {
        (0..self.planned_sets.len()).find(|&idx| self.executed_set(set_number(idx)).is_none())
    }

    /// Inserts or replaces the record for `set.set_number()`.
    pub(crate) fn record_set(&mut self, set: ExecutedSet) {
        match self
            .executed_sets
            .binary_search_by_key(&set.set_number, |s| s.set_number)
        {
            Ok(pos) => self.executed_sets[pos] = set,
            Err(pos) => self.executed_sets.insert(pos, set),
        }
        self.refresh_completion();
    }

    pub(crate) fn push_planned_set(&mut self, set: PlannedSet) {
        self.planned_sets.push(set);
        self.refresh_completion();
    }

    /// Drops the last planned set and any record that pointed at it.
    pub(crate) fn pop_planned_set(&mut self) -> Option<PlannedSet> {
        let removed = self.planned_sets.pop()?;
        let dropped_number = set_number(self.planned_sets.len());
        self.executed_sets
            .retain(|s| s.set_number != dropped_number);
        self.refresh_completion();
        Some(removed)
    }

    pub(crate) fn set_order(&mut self, order: u32) {
        self.order = order;
    }

    /// Swaps the exercise identity, keeping the planned sets and rest.
    pub(crate) fn replace_with(
        &mut self,
        exercise_id: ExerciseId,
        name: String,
        media: ExerciseMedia,
    ) {
        if self.exercise_id == exercise_id {
            return;
        }
        self.replaced_from = Some(self.replaced_from.unwrap_or(self.exercise_id));
        self.exercise_id = exercise_id;
        self.name = name;
        self.media = media;
        self.executed_sets.clear();
        self.refresh_completion();
    }

    fn refresh_completion(&mut self) {
        self.is_completed = !self.planned_sets.is_empty()
            && (0..self.planned_sets.len())
                .all(|idx| self.executed_set(set_number(idx)).is_some());
    }
}

/// Converts a 0-based set index into the 1-based set number used in records.
#[must_use]
pub fn set_number(index: usize) -> u32 {
    u32::try_from(index).map_or(u32::MAX, |n| n.saturating_add(1))
}
