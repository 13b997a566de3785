use lift_core::model::{ExerciseId, PersonalRecord, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_record_row};
use crate::repository::{PersonalRecordRepository, StorageError};

#[async_trait::async_trait]
impl PersonalRecordRepository for SqliteRepository {
    async fn best_records(
        &self,
        user_id: UserId,
        exercise_id: ExerciseId,
    ) -> Result<Vec<PersonalRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    user_id, exercise_id, category, exercise_name,
                    value, achieved_at, session_id
                FROM personal_records
                WHERE user_id = ?1 AND exercise_id = ?2
                ORDER BY category ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(id_i64("exercise_id", exercise_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_record_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_records(&self, records: &[PersonalRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;
        for record in records {
            sqlx::query(
                r"
                    INSERT INTO personal_records (
                        user_id, exercise_id, category, exercise_name,
                        value, achieved_at, session_id
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(user_id, exercise_id, category) DO UPDATE SET
                        exercise_name = excluded.exercise_name,
                        value = excluded.value,
                        achieved_at = excluded.achieved_at,
                        session_id = excluded.session_id
                ",
            )
            .bind(id_i64("user_id", record.user_id.value())?)
            .bind(id_i64("exercise_id", record.exercise_id.value())?)
            .bind(record.category.as_str())
            .bind(&record.exercise_name)
            .bind(record.value)
            .bind(record.achieved_at)
            .bind(record.session_id.map(|id| id.to_string()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }
        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
