mod exercise;
mod ids;
mod plan;
mod record;
mod session;

pub use ids::{ExerciseId, ParseIdError, PlanId, SessionId, UserId};

pub use exercise::{ExecutedExercise, ExecutedSet, SetOutcome, set_number};
pub use plan::{ExerciseMedia, ExerciseSummary, PlannedExercise, PlannedSet, WorkoutPlan};
pub use record::{NewRecord, PersonalRecord, RecordCategory};
pub use session::{ParseStatusError, RestWindow, SessionStatus, WorkoutSession};
