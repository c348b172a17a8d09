use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drill_core::model::{Session, SessionId};
use sqlx::Row;
use tracing::warn;

use super::SqliteRepository;
use super::mapping::{conn, count_from_i64, map_session_row, ser, session_payload};
use crate::record::decode_sessions;
use crate::repository::{SessionRepository, StorageError};

const UPSERT_SESSION: &str = r"
    INSERT INTO sessions (id, mode, started_at, duration_seconds, payload)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(id) DO UPDATE SET
        mode = excluded.mode,
        started_at = excluded.started_at,
        duration_seconds = excluded.duration_seconds,
        payload = excluded.payload
";

/// Rows whose payload cannot be decoded are logged and skipped.
fn decode_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Session>, StorageError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match map_session_row(row) {
            Ok(record) => records.push(record),
            Err(StorageError::Serialization(err)) => {
                let id: Option<String> = row.try_get("id").ok();
                warn!(
                    id = id.as_deref().unwrap_or("?"),
                    error = %err,
                    "skipping unreadable session row"
                );
            }
            Err(other) => return Err(other),
        }
    }
    Ok(decode_sessions(records))
}

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, payload
                FROM sessions
                ORDER BY started_at ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        decode_rows(&rows)
    }

    async fn sessions_for_mode(
        &self,
        mode: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, payload
                FROM sessions
                WHERE mode = ?1
                  AND (?2 IS NULL OR started_at >= ?2)
                ORDER BY started_at ASC, id ASC
            ",
        )
        .bind(mode)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        decode_rows(&rows)
    }

    async fn count_sessions(&self) -> Result<usize, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        count_from_i64(row.try_get::<i64, _>("n").map_err(ser)?)
    }

    async fn upsert_session(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(UPSERT_SESSION)
            .bind(session.id().as_str())
            .bind(session.mode())
            .bind(session.started_at())
            .bind(i64::from(session.duration_seconds()))
            .bind(session_payload(session)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn replace_sessions(&self, sessions: &[Session]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM sessions")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for session in sessions {
            sqlx::query(UPSERT_SESSION)
                .bind(session.id().as_str())
                .bind(session.mode())
                .bind(session.started_at())
                .bind(i64::from(session.duration_seconds()))
                .bind(session_payload(session)?)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn clear_sessions(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
