//! Progress aggregation over the executed sets of a session.
//!
//! Every function here is pure: the same exercise list always yields the same
//! result, so callers are free to recompute after each mutation.

use crate::model::{ExecutedExercise, ExecutedSet};

/// Completed sets ÷ planned sets × 100, or 0 when nothing is planned.
///
/// Skipped sets count toward the denominator only.
#[must_use]
pub fn completion_percentage(exercises: &[ExecutedExercise]) -> f64 {
    let planned: usize = exercises.iter().map(|e| e.planned_sets().len()).sum();
    if planned == 0 {
        return 0.0;
    }
    let completed = exercises
        .iter()
        .flat_map(ExecutedExercise::executed_sets)
        .filter(|s| s.is_completed())
        .count();
    #[allow(clippy::cast_precision_loss)]
    let pct = completed as f64 / planned as f64 * 100.0;
    pct
}

/// Sum of weight × reps over completed sets.
#[must_use]
pub fn total_volume(exercises: &[ExecutedExercise]) -> f64 {
    exercises
        .iter()
        .flat_map(ExecutedExercise::executed_sets)
        .map(ExecutedSet::volume)
        .sum()
}

/// True when at least one set is planned and every planned set has a record.
#[must_use]
pub fn is_all_done(exercises: &[ExecutedExercise]) -> bool {
    exercises.iter().any(|e| !e.planned_sets().is_empty())
        && exercises
            .iter()
            .all(|e| e.planned_sets().is_empty() || e.is_completed())
}
