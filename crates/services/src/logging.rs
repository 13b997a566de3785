//! Structured logging setup.
//!
//! Events are emitted under `lift::*` targets (`lift::workout`, `lift::ticker`,
//! `lift::records`, `lift::storage`, `lift::app`). `RUST_LOG` always wins over
//! the preset.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("invalid log format: '{s}' (use 'text' or 'json')")),
        }
    }
}

/// Logging preset levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Lifecycle events only; the per-second ticker stays silent.
    #[default]
    Production,
    Verbose,
    /// Every transition and tick.
    Debug,
    /// Warnings and errors only.
    Quiet,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    pub format: LogFormat,
}

impl LogConfig {
    /// Pick a preset from flags. Quiet beats debug, debug beats verbose.
    #[must_use]
    pub fn from_flags(verbose: bool, debug: bool, quiet: bool, format: LogFormat) -> Self {
        let preset = if quiet {
            LogPreset::Quiet
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };
        Self { preset, format }
    }

    #[must_use]
    pub fn directives(&self) -> &'static str {
        match self.preset {
            LogPreset::Production => {
                "warn,lift::app=info,lift::workout=info,lift::records=info,lift::storage=warn,lift::ticker=off"
            }
            LogPreset::Verbose => "warn,lift=info,lift::ticker=info,sqlx=warn",
            LogPreset::Debug => "info,lift=debug,sqlx=info",
            LogPreset::Quiet => "warn",
        }
    }

    /// Build the filter, preferring `RUST_LOG` when it is set and valid.
    #[must_use]
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }
        EnvFilter::try_new(self.directives()).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed (e.g. by a test).
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = config.build_filter();
    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true))
            .try_init(),
    };
    result.is_ok()
}
