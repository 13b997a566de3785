use lift_core::model::{SessionId, SessionStatus, UserId, WorkoutSession};

use super::SqliteRepository;
use super::mapping::{conn, encode_session, id_i64, map_session_row, write_err};
use crate::feed::SessionSubscription;
use crate::repository::{StorageError, WorkoutSessionRepository};

#[async_trait::async_trait]
impl WorkoutSessionRepository for SqliteRepository {
    async fn get_session(&self, id: SessionId) -> Result<WorkoutSession, StorageError> {
        let row = sqlx::query("SELECT payload FROM workout_sessions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn put_session(&self, session: &WorkoutSession) -> Result<(), StorageError> {
        let payload = encode_session(session)?;

        sqlx::query(
            r"
                INSERT INTO workout_sessions (
                    id, user_id, plan_id, status, created_at, started_at, ended_at,
                    completion_percentage, total_volume, payload
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    started_at = excluded.started_at,
                    ended_at = excluded.ended_at,
                    completion_percentage = excluded.completion_percentage,
                    total_volume = excluded.total_volume,
                    payload = excluded.payload
            ",
        )
        .bind(session.id().to_string())
        .bind(id_i64("user_id", session.user_id().value())?)
        .bind(id_i64("plan_id", session.plan_id().value())?)
        .bind(session.status().as_str())
        .bind(session.created_at())
        .bind(session.started_at())
        .bind(session.ended_at())
        .bind(session.completion_percentage())
        .bind(session.total_volume())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        tracing::trace!(
            target: "lift::storage",
            session = %session.id(),
            status = %session.status(),
            "session written"
        );
        self.feed.publish(session);
        Ok(())
    }

    async fn subscribe_session(
        &self,
        id: SessionId,
    ) -> Result<SessionSubscription, StorageError> {
        let stored = self.get_session(id).await?;
        Ok(self.feed.subscribe(stored))
    }

    async fn active_session_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<WorkoutSession>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT payload
                FROM workout_sessions
                WHERE user_id = ?1 AND status IN (?2, ?3, ?4)
                ORDER BY created_at DESC
                LIMIT 1
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(SessionStatus::InProgress.as_str())
        .bind(SessionStatus::Paused.as_str())
        .bind(SessionStatus::Resting.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }
}
