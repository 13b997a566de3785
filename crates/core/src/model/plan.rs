use serde::{Deserialize, Serialize};

use crate::model::ids::{ExerciseId, PlanId};

/// Target load for one planned set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannedSet {
    pub target_weight: f64,
    pub target_reps: u32,
}

impl PlannedSet {
    #[must_use]
    pub fn new(target_weight: f64, target_reps: u32) -> Self {
        Self {
            target_weight,
            target_reps,
        }
    }
}

/// Optional media attached to an exercise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseMedia {
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

/// One exercise as authored in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedExercise {
    pub exercise_id: ExerciseId,
    pub name: String,
    pub rest_seconds: u32,
    pub sets: Vec<PlannedSet>,
    #[serde(default)]
    pub media: ExerciseMedia,
}

impl PlannedExercise {
    #[must_use]
    pub fn new(
        exercise_id: ExerciseId,
        name: impl Into<String>,
        rest_seconds: u32,
        sets: Vec<PlannedSet>,
    ) -> Self {
        Self {
            exercise_id,
            name: name.into(),
            rest_seconds,
            sets,
            media: ExerciseMedia::default(),
        }
    }

    #[must_use]
    pub fn with_media(mut self, media: ExerciseMedia) -> Self {
        self.media = media;
        self
    }
}

/// A workout plan handed to the engine when a session starts.
///
/// Plans are authored elsewhere; the engine only snapshots them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub id: PlanId,
    pub name: String,
    pub exercises: Vec<PlannedExercise>,
}

impl WorkoutPlan {
    #[must_use]
    pub fn new(id: PlanId, name: impl Into<String>, exercises: Vec<PlannedExercise>) -> Self {
        Self {
            id,
            name: name.into(),
            exercises,
        }
    }

    /// Number of planned sets across every exercise.
    #[must_use]
    pub fn planned_set_count(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }
}

/// Catalog entry returned by exercise lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseSummary {
    pub id: ExerciseId,
    pub name: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl ExerciseSummary {
    #[must_use]
    pub fn new(id: ExerciseId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image_url: None,
            video_url: None,
        }
    }

    #[must_use]
    pub fn media(&self) -> ExerciseMedia {
        ExerciseMedia {
            image_url: self.image_url.clone(),
            video_url: self.video_url.clone(),
        }
    }
}
