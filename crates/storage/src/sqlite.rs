//! SQLite session store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::models::{SessionOrder, SessionRecord};
use crate::{SessionStore, StorageError};

const CREATE_SESSIONS: &str = "CREATE TABLE IF NOT EXISTS sessions (
    username TEXT NOT NULL,
    session_id TEXT NOT NULL,
    start_timestamp TEXT NOT NULL,
    metrics TEXT NOT NULL,
    PRIMARY KEY (username, session_id)
)";

/// Sessions in a single SQLite table, rows as a JSON column
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Connect to `url` (e.g. `sqlite://sessions.db`), creating the file and
    /// schema when missing
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // One long-lived connection keeps `sqlite::memory:` databases alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_SESSIONS).execute(&pool).await?;
        info!("Session store ready at {}", url);

        Ok(Self { pool })
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect("sqlite::memory:").await
    }

    fn decode(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
        let start: String = row.try_get("start_timestamp")?;
        let metrics: String = row.try_get("metrics")?;

        let start_timestamp = DateTime::parse_from_rfc3339(&start)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?
            .with_timezone(&Utc);

        Ok(SessionRecord {
            session_id: row.try_get("session_id")?,
            username: row.try_get("username")?,
            start_timestamp,
            metrics: serde_json::from_str(&metrics)?,
        })
    }
}

/// Fixed-width UTC form so text ordering matches time ordering
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let metrics = serde_json::to_string(&record.metrics)?;

        let result = sqlx::query(
            "INSERT INTO sessions (username, session_id, start_timestamp, metrics) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.username)
        .bind(&record.session_id)
        .bind(encode_timestamp(&record.start_timestamp))
        .bind(metrics)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Stored {} ({} rows)", record.session_id, record.metrics.len());
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StorageError::Duplicate {
                username: record.username.clone(),
                session_id: record.session_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn sessions_for(&self, username: &str, order: SessionOrder) -> Result<Vec<SessionRecord>, StorageError> {
        let sql = match order {
            SessionOrder::Latest => {
                "SELECT * FROM sessions WHERE username = ? ORDER BY start_timestamp DESC, session_id DESC"
            }
            SessionOrder::Oldest => {
                "SELECT * FROM sessions WHERE username = ? ORDER BY start_timestamp ASC, session_id ASC"
            }
        };

        let rows = sqlx::query(sql).bind(username).fetch_all(&self.pool).await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn session(&self, username: &str, session_id: &str) -> Result<SessionRecord, StorageError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE username = ? AND session_id = ?")
            .bind(username)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound)?;
        Self::decode(&row)
    }

    async fn delete_user_sessions(&self, username: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM sessions WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        info!("Deleted {} sessions for {}", result.rows_affected(), username);
        Ok(result.rows_affected())
    }

    async fn session_count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;
    use crate::RerouteFlag;
    use drowsiness::DrowsinessState;

    #[tokio::test]
    async fn test_round_trip_preserves_rows() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        let session = record(
            "asha",
            9,
            &[
                (DrowsinessState::Normal, RerouteFlag::None),
                (DrowsinessState::Strong, RerouteFlag::Yes),
            ],
        );

        store.insert_session(&session).await.unwrap();
        let loaded = store.session("asha", &session.session_id).await.unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_duplicate_key_maps_to_duplicate() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        let session = record("asha", 9, &[]);

        store.insert_session(&session).await.unwrap();
        let err = store.insert_session(&session).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { ref username, .. } if username == "asha"));
    }

    #[tokio::test]
    async fn test_ordering_and_deletion() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        for (user, hour) in [("asha", 10), ("asha", 8), ("ben", 9), ("asha", 12)] {
            store.insert_session(&record(user, hour, &[])).await.unwrap();
        }

        let latest = store.sessions_for("asha", SessionOrder::Latest).await.unwrap();
        let ids: Vec<_> = latest.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "session_2024-03-01_12-00-00",
                "session_2024-03-01_10-00-00",
                "session_2024-03-01_08-00-00"
            ]
        );

        let oldest = store.sessions_for("asha", SessionOrder::Oldest).await.unwrap();
        assert_eq!(oldest[0].session_id, "session_2024-03-01_08-00-00");

        assert_eq!(store.delete_user_sessions("asha").await.unwrap(), 3);
        assert_eq!(store.session_count().await.unwrap(), 1);
        assert!(matches!(
            store.session("asha", "session_2024-03-01_08-00-00").await,
            Err(StorageError::NotFound)
        ));
    }
}
