use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{ExerciseId, SessionId, UserId};

/// Category in which a personal record can be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordCategory {
    /// Heaviest weight lifted for any rep count.
    MaxWeight,
    /// Most reps in a single set.
    MaxReps,
    /// Largest weight × reps in a single set.
    MaxVolume,
    /// Best Epley one-rep-max estimate.
    EstimatedOneRepMax,
}

impl RecordCategory {
    pub const ALL: [RecordCategory; 4] = [
        RecordCategory::MaxWeight,
        RecordCategory::MaxReps,
        RecordCategory::MaxVolume,
        RecordCategory::EstimatedOneRepMax,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxWeight => "max_weight",
            Self::MaxReps => "max_reps",
            Self::MaxVolume => "max_volume",
            Self::EstimatedOneRepMax => "estimated_one_rep_max",
        }
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("invalid record category: {s}"))
    }
}

/// Best value a user holds in one category for one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub user_id: UserId,
    pub exercise_id: ExerciseId,
    pub exercise_name: String,
    pub category: RecordCategory,
    pub value: f64,
    pub achieved_at: DateTime<Utc>,
    pub session_id: Option<SessionId>,
}

/// A record broken by a single set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub category: RecordCategory,
    pub value: f64,
    /// Best value before this set; `None` on the first performance of the exercise.
    pub previous: Option<f64>,
}
