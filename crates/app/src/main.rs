use std::fmt;

use lift_core::model::{
    ExerciseId, ExerciseSummary, PlanId, PlannedExercise, PlannedSet, UserId, WorkoutPlan,
};
use services::{
    AppServices, Clock, LogConfig, LogFormat, LogPreset, SessionError, WorkoutConfig,
    WorkoutSessionHandle, WorkoutView, init_logging,
};
use tracing::{info, warn};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidLogFormat(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLogFormat(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug)]
struct Args {
    db_url: String,
    user_id: UserId,
    log: LogConfig,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p app -- [--db <sqlite_url>] [--user-id <id>] [--log-format text|json]"
    );
    eprintln!("                      [--verbose | --debug | --quiet]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:lift.sqlite3");
    eprintln!("  --user-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LIFT_DB_URL, LIFT_USER_ID, LIFT_LOG (production|verbose|debug|quiet), RUST_LOG");
}

fn preset_from_env(raw: &str) -> Option<LogPreset> {
    match raw.trim().to_lowercase().as_str() {
        "production" | "info" => Some(LogPreset::Production),
        "verbose" => Some(LogPreset::Verbose),
        "debug" => Some(LogPreset::Debug),
        "quiet" | "warn" => Some(LogPreset::Quiet),
        _ => None,
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LIFT_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:lift.sqlite3".into()), normalize_sqlite_url);
        let mut user_id = std::env::var("LIFT_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);
        let env_preset = std::env::var("LIFT_LOG")
            .ok()
            .and_then(|value| preset_from_env(&value));

        let (mut verbose, mut debug, mut quiet) = (false, false, false);
        let mut format = LogFormat::Text;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user-id" => {
                    let value = require_value(args, "--user-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = UserId::new(parsed);
                }
                "--log-format" => {
                    let value = require_value(args, "--log-format")?;
                    format = value.parse().map_err(ArgsError::InvalidLogFormat)?;
                }
                "--verbose" | "-v" => verbose = true,
                "--debug" => debug = true,
                "--quiet" | "-q" => quiet = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let mut log = LogConfig::from_flags(verbose, debug, quiet, format);
        if !(verbose || debug || quiet) {
            if let Some(preset) = env_preset {
                log.preset = preset;
            }
        }

        Ok(Self {
            db_url,
            user_id,
            log,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn catalog() -> Vec<ExerciseSummary> {
    vec![
        ExerciseSummary::new(ExerciseId::new(1), "Back Squat"),
        ExerciseSummary::new(ExerciseId::new(2), "Bench Press"),
        ExerciseSummary::new(ExerciseId::new(3), "Deadlift"),
        ExerciseSummary::new(ExerciseId::new(4), "Overhead Press"),
        ExerciseSummary::new(ExerciseId::new(5), "Barbell Row"),
        ExerciseSummary::new(ExerciseId::new(6), "Pull-up"),
    ]
}

fn demo_plan() -> WorkoutPlan {
    WorkoutPlan::new(
        PlanId::new(1),
        "Full Body A",
        vec![
            PlannedExercise::new(
                ExerciseId::new(1),
                "Back Squat",
                120,
                vec![PlannedSet::new(100.0, 5), PlannedSet::new(100.0, 5)],
            ),
            PlannedExercise::new(
                ExerciseId::new(2),
                "Bench Press",
                90,
                vec![PlannedSet::new(70.0, 8)],
            ),
        ],
    )
}

fn log_view(step: &str, view: &WorkoutView) {
    info!(
        target: "lift::app",
        step,
        status = %view.status,
        exercise = view.exercise_name.as_deref().unwrap_or("-"),
        set = view.set_number,
        completion = view.completion_percentage,
        volume = view.total_volume,
        "workout step"
    );
}

async fn perform(
    handle: &WorkoutSessionHandle,
    weight: f64,
    reps: u32,
) -> Result<WorkoutView, SessionError> {
    let done = handle.complete_current_set(weight, reps).await?;
    for record in &done.new_records {
        info!(
            target: "lift::app",
            category = record.category.as_str(),
            value = record.value,
            previous = ?record.previous,
            "new personal record"
        );
    }
    log_view("complete_set", &done.view);
    if done.view.is_resting() {
        let view = handle.skip_rest().await?;
        log_view("skip_rest", &view);
        return Ok(view);
    }
    Ok(done.view)
}

/// Drives one workout from start to finish the way a client would.
async fn run_scripted_workout(
    services: &AppServices,
    user_id: UserId,
) -> Result<WorkoutView, Box<dyn std::error::Error>> {
    let workouts = services.workouts();
    let handle = match workouts.resume_active(user_id).await? {
        Some(handle) => {
            warn!(
                target: "lift::app",
                session_id = %handle.session_id(),
                "abandoning leftover active session"
            );
            handle.abandon().await?;
            workouts.start_workout(user_id, &demo_plan()).await?
        }
        None => workouts.start_workout(user_id, &demo_plan()).await?,
    };
    info!(target: "lift::app", session_id = %handle.session_id(), "workout started");
    log_view("start", &handle.view());

    handle.update_inputs(102.5, 5).await?;
    perform(&handle, 102.5, 5).await?;
    perform(&handle, 100.0, 4).await?;

    let view = handle.add_exercises(vec![ExerciseId::new(5)]).await?;
    log_view("add_exercises", &view);

    perform(&handle, 72.5, 8).await?;

    // The appended row is swapped for weighted pull-ups and given a second set.
    let view = handle.replace_current_exercise(ExerciseId::new(6)).await?;
    log_view("replace_exercise", &view);
    let view = handle.add_set().await?;
    log_view("add_set", &view);
    perform(&handle, 10.0, 8).await?;

    handle.set_notes("Felt strong on squats.").await?;
    let view = perform(&handle, 10.0, 6).await?;

    let view = if view.confirmation.is_some() {
        handle.complete().await?
    } else {
        view
    };
    log_view("finish", &view);
    handle.stop().await;
    Ok(view)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_logging(&args.log);
    info!(target: "lift::app", db = %args.db_url, user_id = %args.user_id, "starting");

    prepare_sqlite_file(&args.db_url)?;
    let config = WorkoutConfig::default().with_start_ticker(false);
    let services = AppServices::new_sqlite(&args.db_url, Clock::default_clock(), config).await?;
    services.seed_catalog(&catalog()).await?;

    let view = run_scripted_workout(&services, args.user_id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
