use chrono::{DateTime, Utc};

use crate::model::{SessionStatus, WorkoutSession};

/// Tick-driven rest countdown held by whoever observes a resting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestCountdown {
    remaining_ms: i64,
}

impl RestCountdown {
    #[must_use]
    pub fn new(remaining_ms: i64) -> Self {
        Self { remaining_ms }
    }

    /// Countdown for a resting session loaded from storage, measured by wall clock.
    #[must_use]
    pub fn restore(session: &WorkoutSession, now: DateTime<Utc>) -> Option<Self> {
        if session.status() != SessionStatus::Resting {
            return None;
        }
        session.rest().map(|w| Self::new(w.remaining_ms(now)))
    }

    #[must_use]
    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms.max(0)
    }

    /// Subtract one tick. Returns true once the countdown is at or below zero.
    pub fn tick(&mut self, step_ms: i64) -> bool {
        self.remaining_ms -= step_ms;
        self.remaining_ms <= 0
    }
}
