use lift_core::model::{
    ExerciseId, ExerciseSummary, PersonalRecord, RecordCategory, SessionId, UserId,
    WorkoutSession,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Like `conn`, but a unique-constraint violation becomes `StorageError::Conflict`.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn exercise_id_from_i64(v: i64) -> Result<ExerciseId, StorageError> {
    Ok(ExerciseId::new(i64_to_u64("exercise_id", v)?))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

/// The session lives in a JSON payload; the scalar columns only serve lookups.
pub(crate) fn encode_session(session: &WorkoutSession) -> Result<String, StorageError> {
    serde_json::to_string(session).map_err(ser)
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<WorkoutSession, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    serde_json::from_str(&payload).map_err(ser)
}

pub(crate) fn map_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<PersonalRecord, StorageError> {
    let category: String = row.try_get("category").map_err(ser)?;
    let category: RecordCategory = category.parse().map_err(ser)?;
    let session_id = row
        .try_get::<Option<String>, _>("session_id")
        .map_err(ser)?
        .map(|raw| raw.parse::<SessionId>().map_err(ser))
        .transpose()?;

    Ok(PersonalRecord {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        exercise_id: exercise_id_from_i64(row.try_get::<i64, _>("exercise_id").map_err(ser)?)?,
        exercise_name: row.try_get("exercise_name").map_err(ser)?,
        category,
        value: row.try_get("value").map_err(ser)?,
        achieved_at: row.try_get("achieved_at").map_err(ser)?,
        session_id,
    })
}

pub(crate) fn map_exercise_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ExerciseSummary, StorageError> {
    Ok(ExerciseSummary {
        id: exercise_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        image_url: row.try_get("image_url").map_err(ser)?,
        video_url: row.try_get("video_url").map_err(ser)?,
    })
}
