//! Storage Layer
//!
//! Persists monitoring sessions keyed by `(username, session_id)`:
//! - `Repository`: in-memory store
//! - `SqliteSessionStore`: SQLite via sqlx, metric rows as a JSON column

mod models;
mod repository;
mod sqlite;

pub use models::{MetricRow, RerouteFlag, SessionOrder, SessionRecord, SessionSummary};
pub use repository::Repository;
pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Session {session_id} already exists for {username}")]
    Duplicate { username: String, session_id: String },
    #[error("Record not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Session persistence boundary
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a finished session; `(username, session_id)` must be new
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// All sessions of a user, ordered by start time
    async fn sessions_for(&self, username: &str, order: SessionOrder) -> Result<Vec<SessionRecord>, StorageError>;

    /// One session, or `NotFound`
    async fn session(&self, username: &str, session_id: &str) -> Result<SessionRecord, StorageError>;

    /// Remove every session of a user; returns how many were removed
    async fn delete_user_sessions(&self, username: &str) -> Result<u64, StorageError>;

    /// Total number of stored sessions
    async fn session_count(&self) -> Result<u64, StorageError>;
}

/// Which store backs the sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// sqlx connection URL for the SQLite backend
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_url: "sqlite://sessions.db".to_string(),
        }
    }
}

/// Open the configured store
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn SessionStore>, StorageError> {
    match config.backend {
        StorageBackend::Sqlite => Ok(Arc::new(SqliteSessionStore::connect(&config.database_url).await?)),
        StorageBackend::Memory => {
            info!("Using in-memory session store; sessions are lost on exit");
            Ok(Arc::new(Repository::new()))
        }
    }
}
