//! In-memory session store

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::models::{sort_sessions, SessionOrder, SessionRecord};
use crate::{SessionStore, StorageError};

/// Session store kept in process memory
pub struct Repository {
    sessions: Mutex<Vec<SessionRecord>>,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory session repository");
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<SessionRecord>>, StorageError> {
        self.sessions
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for Repository {
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut sessions = self.lock()?;

        if sessions
            .iter()
            .any(|s| s.username == record.username && s.session_id == record.session_id)
        {
            return Err(StorageError::Duplicate {
                username: record.username.clone(),
                session_id: record.session_id.clone(),
            });
        }

        sessions.push(record.clone());
        debug!("Stored {} ({} rows)", record.session_id, record.metrics.len());
        Ok(())
    }

    async fn sessions_for(&self, username: &str, order: SessionOrder) -> Result<Vec<SessionRecord>, StorageError> {
        let mut found: Vec<_> = self
            .lock()?
            .iter()
            .filter(|s| s.username == username)
            .cloned()
            .collect();
        sort_sessions(&mut found, order);
        Ok(found)
    }

    async fn session(&self, username: &str, session_id: &str) -> Result<SessionRecord, StorageError> {
        self.lock()?
            .iter()
            .find(|s| s.username == username && s.session_id == session_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn delete_user_sessions(&self, username: &str) -> Result<u64, StorageError> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|s| s.username != username);
        let removed = (before - sessions.len()) as u64;
        info!("Deleted {} sessions for {}", removed, username);
        Ok(removed)
    }

    async fn session_count(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;
    use crate::RerouteFlag;
    use drowsiness::DrowsinessState;

    #[tokio::test]
    async fn test_insert_and_retrieve() {
        let repo = Repository::new();
        let session = record("asha", 9, &[(DrowsinessState::Normal, RerouteFlag::None)]);

        repo.insert_session(&session).await.unwrap();

        let found = repo.session("asha", &session.session_id).await.unwrap();
        assert_eq!(found, session);
        assert_eq!(repo.session_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let repo = Repository::new();
        let session = record("asha", 9, &[]);

        repo.insert_session(&session).await.unwrap();
        let err = repo.insert_session(&session).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { .. }));

        // Same id under another user is a different key
        let mut other = session.clone();
        other.username = "ben".into();
        repo.insert_session(&other).await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_for_filters_and_orders() {
        let repo = Repository::new();
        for (user, hour) in [("asha", 8), ("ben", 9), ("asha", 11), ("asha", 10)] {
            repo.insert_session(&record(user, hour, &[])).await.unwrap();
        }

        let latest = repo.sessions_for("asha", SessionOrder::Latest).await.unwrap();
        assert_eq!(latest.len(), 3);
        assert!(latest[0].start_timestamp > latest[1].start_timestamp);

        let oldest = repo.sessions_for("asha", SessionOrder::Oldest).await.unwrap();
        assert_eq!(oldest[0].session_id, "session_2024-03-01_08-00-00");
    }

    #[tokio::test]
    async fn test_delete_user_sessions() {
        let repo = Repository::new();
        repo.insert_session(&record("asha", 8, &[])).await.unwrap();
        repo.insert_session(&record("asha", 9, &[])).await.unwrap();
        repo.insert_session(&record("ben", 9, &[])).await.unwrap();

        assert_eq!(repo.delete_user_sessions("asha").await.unwrap(), 2);
        assert!(repo.sessions_for("asha", SessionOrder::Latest).await.unwrap().is_empty());
        assert_eq!(repo.session_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let repo = Repository::new();
        let err = repo.session("asha", "session_x").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
