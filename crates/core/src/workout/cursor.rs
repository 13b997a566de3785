use crate::model::{SessionStatus, WorkoutSession};

/// Pointer to the set the user is currently performing, plus the input fields.
///
/// Never persisted; `restore` rebuilds it from a stored session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionCursor {
    pub exercise_index: usize,
    pub set_index: usize,
    pub weight_input: f64,
    pub reps_input: u32,
}

impl SessionCursor {
    /// Cursor at a given position, inputs pre-filled with that set's targets.
    #[must_use]
    pub fn at(session: &WorkoutSession, exercise_index: usize, set_index: usize) -> Self {
        let target = session
            .exercise(exercise_index)
            .and_then(|e| e.planned_sets().get(set_index))
            .copied();
        Self {
            exercise_index,
            set_index,
            weight_input: target.map_or(0.0, |t| t.target_weight),
            reps_input: target.map_or(0, |t| t.target_reps),
        }
    }

    /// First open set of the given exercise, or its last set when all are done.
    #[must_use]
    pub fn for_exercise(session: &WorkoutSession, exercise_index: usize) -> Self {
        let set_index = session.exercise(exercise_index).map_or(0, |e| {
            e.first_open_set()
                .unwrap_or_else(|| e.planned_sets().len().saturating_sub(1))
        });
        Self::at(session, exercise_index, set_index)
    }

    /// Rebuild the cursor for a session loaded from storage.
    ///
    /// A session that is resting (or paused mid-rest) points at the set that
    /// started the rest, so that the rest exit advances past it exactly once.
    #[must_use]
    pub fn restore(session: &WorkoutSession) -> Self {
        let mid_rest = session.rest().is_some()
            && matches!(
                session.status(),
                SessionStatus::Resting | SessionStatus::Paused
            );
        if mid_rest {
            if let Some(cursor) = Self::latest_executed(session) {
                return cursor;
            }
        }

        let open = session
            .exercises()
            .iter()
            .enumerate()
            .find_map(|(idx, e)| e.first_open_set().map(|set| (idx, set)));
        match open {
            Some((exercise_index, set_index)) => Self::at(session, exercise_index, set_index),
            None => {
                let last = session.exercises().len().saturating_sub(1);
                Self::for_exercise(session, last)
            }
        }
    }

    fn latest_executed(session: &WorkoutSession) -> Option<Self> {
        session
            .exercises()
            .iter()
            .enumerate()
            .flat_map(|(idx, e)| e.executed_sets().iter().map(move |s| (idx, s)))
            .max_by_key(|(_, s)| s.completed_at())
            .map(|(idx, s)| Self::at(session, idx, s.set_number().saturating_sub(1) as usize))
    }

    /// Next position: next set of this exercise, else first set of the next
    /// exercise, else unchanged.
    #[must_use]
    pub fn advanced(&self, session: &WorkoutSession) -> Self {
        let sets_here = session
            .exercise(self.exercise_index)
            .map_or(0, |e| e.planned_sets().len());
        if self.set_index + 1 < sets_here {
            Self::at(session, self.exercise_index, self.set_index + 1)
        } else if self.exercise_index + 1 < session.exercises().len() {
            Self::at(session, self.exercise_index + 1, 0)
        } else {
            *self
        }
    }

    /// Same position with edited input fields.
    #[must_use]
    pub fn with_inputs(mut self, weight: f64, reps: u32) -> Self {
        self.weight_input = weight;
        self.reps_input = reps;
        self
    }
}
