use std::collections::HashMap;

use lift_core::model::{ExerciseId, ExerciseSummary};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_exercise_row};
use crate::repository::{ExerciseCatalog, StorageError};

#[async_trait::async_trait]
impl ExerciseCatalog for SqliteRepository {
    async fn resolve(&self, ids: &[ExerciseId]) -> Result<Vec<ExerciseSummary>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT id, name, image_url, video_url
                FROM exercises
                WHERE id IN (
            ",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id_i64("exercise_id", id.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let exercise = map_exercise_row(&row)?;
            by_id.insert(exercise.id, exercise);
        }

        // Preserve caller order, including repeated ids.
        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    async fn upsert_exercise(&self, exercise: &ExerciseSummary) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO exercises (id, name, image_url, video_url)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    image_url = excluded.image_url,
                    video_url = excluded.video_url
            ",
        )
        .bind(id_i64("exercise_id", exercise.id.value())?)
        .bind(&exercise.name)
        .bind(&exercise.image_url)
        .bind(&exercise.video_url)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
