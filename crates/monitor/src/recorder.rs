//! Session identity and metric-row accumulation

use chrono::{DateTime, Utc};
use metrics::counter;
use storage::{MetricRow, SessionRecord, SessionStore};
use tracing::{error, info};

use crate::MonitorError;

/// Authenticated driver a session belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    username: String,
}

impl SessionIdentity {
    /// Trimmed, non-empty username
    pub fn new(username: &str) -> Result<Self, MonitorError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(MonitorError::Config("a signed-in username is required to start monitoring".into()));
        }
        Ok(Self {
            username: username.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// `session_<YYYY-mm-dd_HH-MM-SS>` for a loop started at `started_at`
pub fn session_id_for(started_at: DateTime<Utc>) -> String {
    format!("session_{}", started_at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Rows of one session, held by the worker until the loop ends
#[derive(Debug)]
pub struct SessionRecorder {
    identity: SessionIdentity,
    session_id: String,
    started_at: DateTime<Utc>,
    rows: Vec<MetricRow>,
}

impl SessionRecorder {
    pub fn start(identity: SessionIdentity, started_at: DateTime<Utc>) -> Self {
        let session_id = session_id_for(started_at);
        info!("Session {} started for {}", session_id, identity.username());
        Self {
            identity,
            session_id,
            started_at,
            rows: Vec::new(),
        }
    }

    pub fn record(&mut self, row: MetricRow) {
        self.rows.push(row);
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    /// Bundle the rows without persisting them
    pub fn into_record(self) -> SessionRecord {
        SessionRecord {
            session_id: self.session_id,
            username: self.identity.username,
            start_timestamp: self.started_at,
            metrics: self.rows,
        }
    }

    /// Persist the session once. A store failure is logged and reported
    /// through the returned flag; the record is returned either way.
    pub async fn finish(self, store: &dyn SessionStore) -> (SessionRecord, bool) {
        let record = self.into_record();

        match store.insert_session(&record).await {
            Ok(()) => {
                counter!("sessions_persisted").increment(1);
                info!("Session {} saved ({} rows)", record.session_id, record.metrics.len());
                (record, true)
            }
            Err(e) => {
                error!("Failed to save session {}: {}", record.session_id, e);
                (record, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use drowsiness::{DriverStats, DrowsinessState};
    use storage::{RerouteFlag, Repository, SessionOrder};

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 5, 9).unwrap()
    }

    #[test]
    fn test_identity_requires_username() {
        assert!(SessionIdentity::new("   ").is_err());
        assert_eq!(SessionIdentity::new("  asha ").unwrap().username(), "asha");
    }

    #[test]
    fn test_session_id_format() {
        assert_eq!(session_id_for(started()), "session_2024-03-01_08-05-09");
    }

    #[tokio::test]
    async fn test_finish_persists_once() {
        let store = Repository::new();
        let mut recorder = SessionRecorder::start(SessionIdentity::new("asha").unwrap(), started());
        recorder.record(MetricRow::new(
            started(),
            &DriverStats::default(),
            DrowsinessState::Normal,
            RerouteFlag::None,
        ));

        let (record, persisted) = recorder.finish(&store).await;
        assert!(persisted);
        assert_eq!(record.metrics.len(), 1);

        let stored = store.sessions_for("asha", SessionOrder::Latest).await.unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[tokio::test]
    async fn test_identical_rows_flush_identical_records() {
        let rows = [
            (DrowsinessState::Normal, RerouteFlag::None),
            (DrowsinessState::Moderate, RerouteFlag::No),
            (DrowsinessState::Strong, RerouteFlag::Yes),
        ];
        let recorded = || {
            let mut recorder = SessionRecorder::start(SessionIdentity::new("asha").unwrap(), started());
            for (second, (state, flag)) in rows.iter().enumerate() {
                let stats = DriverStats {
                    blink_count: second,
                    ..DriverStats::default()
                };
                let at = started() + chrono::Duration::seconds(second as i64);
                recorder.record(MetricRow::new(at, &stats, *state, *flag));
            }
            recorder
        };

        let (first, _) = recorded().finish(&Repository::new()).await;
        let (second, _) = recorded().finish(&Repository::new()).await;
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_not_raised() {
        let store = Repository::new();
        let identity = SessionIdentity::new("asha").unwrap();

        let (first, _) = SessionRecorder::start(identity.clone(), started()).finish(&store).await;
        let (second, persisted) = SessionRecorder::start(identity, started()).finish(&store).await;

        assert!(!persisted);
        assert_eq!(first.session_id, second.session_id);
    }
}
