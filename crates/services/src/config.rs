use std::time::Duration;

use lift_core::model::PlannedSet;
use lift_core::workout::SessionRules;

/// Runtime tunables for live workout sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutConfig {
    /// Ticker period. The rest countdown steps down by the same amount per tick.
    pub tick_interval: Duration,
    /// Active time after which an in-progress session is paused automatically.
    pub max_active_duration: Duration,
    /// Target given to the single set of an exercise appended mid-session.
    pub placeholder_set: PlannedSet,
    /// Upper bound on a personal-record evaluation.
    pub record_timeout: Duration,
    /// Complete as soon as every set is done instead of waiting for confirmation.
    pub auto_complete_when_done: bool,
    /// Spawn the ticker when a session handle is opened.
    pub start_ticker: bool,
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_active_duration: Duration::from_secs(3 * 60 * 60),
            placeholder_set: PlannedSet::new(0.0, 10),
            record_timeout: Duration::from_secs(2),
            auto_complete_when_done: false,
            start_ticker: true,
        }
    }
}

impl WorkoutConfig {
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    #[must_use]
    pub fn with_max_active_duration(mut self, max_active_duration: Duration) -> Self {
        self.max_active_duration = max_active_duration;
        self
    }

    #[must_use]
    pub fn with_placeholder_set(mut self, placeholder_set: PlannedSet) -> Self {
        self.placeholder_set = placeholder_set;
        self
    }

    #[must_use]
    pub fn with_record_timeout(mut self, record_timeout: Duration) -> Self {
        self.record_timeout = record_timeout;
        self
    }

    #[must_use]
    pub fn with_auto_complete_when_done(mut self, auto_complete_when_done: bool) -> Self {
        self.auto_complete_when_done = auto_complete_when_done;
        self
    }

    #[must_use]
    pub fn with_start_ticker(mut self, start_ticker: bool) -> Self {
        self.start_ticker = start_ticker;
        self
    }

    /// Countdown decrement applied per tick, in milliseconds.
    #[must_use]
    pub fn tick_step_ms(&self) -> i64 {
        duration_ms(self.tick_interval)
    }

    /// Rules handed to the pure transitions.
    #[must_use]
    pub fn rules(&self) -> SessionRules {
        SessionRules {
            max_active_ms: duration_ms(self.max_active_duration),
            auto_complete_when_done: self.auto_complete_when_done,
            ..SessionRules::default()
        }
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
