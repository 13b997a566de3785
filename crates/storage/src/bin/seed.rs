use std::fmt;

use chrono::{DateTime, Utc};
use lift_core::model::{
    ExerciseId, ExerciseSummary, PersonalRecord, RecordCategory, UserId,
};
use lift_core::records::category_value;
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    with_records: bool,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LIFT_DB_URL").unwrap_or_else(|_| "sqlite:lift.sqlite3".into());
        let mut user_id = std::env::var("LIFT_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);
        let mut with_records = false;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user-id" => {
                    let value = require_value(&mut args, "--user-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = UserId::new(parsed);
                }
                "--with-records" => with_records = true,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            with_records,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:lift.sqlite3)");
    eprintln!("  --user-id <id>            Owner of seeded personal records (default: 1)");
    eprintln!("  --with-records            Also seed a baseline personal record per exercise");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LIFT_DB_URL, LIFT_USER_ID");
}

/// Catalog rows plus a modest baseline (weight, reps) for each.
const CATALOG: [(u64, &str, f64, u32); 6] = [
    (1, "Back Squat", 80.0, 5),
    (2, "Bench Press", 60.0, 5),
    (3, "Deadlift", 100.0, 5),
    (4, "Overhead Press", 40.0, 8),
    (5, "Barbell Row", 50.0, 8),
    (6, "Pull Up", 0.0, 0),
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut seeded_records = 0usize;
    for (id, name, weight, reps) in CATALOG {
        let exercise = ExerciseSummary::new(ExerciseId::new(id), name);
        storage.exercises.upsert_exercise(&exercise).await?;

        if args.with_records && weight > 0.0 && reps > 0 {
            let records: Vec<PersonalRecord> = RecordCategory::ALL
                .into_iter()
                .map(|category| PersonalRecord {
                    user_id: args.user_id,
                    exercise_id: exercise.id,
                    exercise_name: exercise.name.clone(),
                    category,
                    value: category_value(category, weight, reps),
                    achieved_at: now,
                    session_id: None,
                })
                .collect();
            seeded_records += records.len();
            storage.records.upsert_records(&records).await?;
        }
    }

    println!(
        "Seeded {} exercises and {} personal records into {}",
        CATALOG.len(),
        seeded_records,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
