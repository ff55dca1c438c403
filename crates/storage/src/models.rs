//! Session records

use chrono::{DateTime, Utc};
use drowsiness::{DriverStats, DrowsinessState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a row marks a reroute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RerouteFlag {
    /// Periodic sample, no reroute decision
    #[default]
    None,
    Yes,
    No,
}

impl RerouteFlag {
    pub fn from_answer(accepted: bool) -> Self {
        if accepted {
            RerouteFlag::Yes
        } else {
            RerouteFlag::No
        }
    }
}

/// One sampled row of driver statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    #[serde(with = "row_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub blink_count: usize,
    pub avg_blink_duration: f64,
    pub total_eye_closure_duration: f64,
    pub yawn_count: usize,
    pub drowsiness_state: DrowsinessState,
    pub reroute_triggered: RerouteFlag,
}

impl MetricRow {
    pub fn new(
        timestamp: DateTime<Utc>,
        stats: &DriverStats,
        state: DrowsinessState,
        reroute_triggered: RerouteFlag,
    ) -> Self {
        Self {
            timestamp,
            blink_count: stats.blink_count,
            avg_blink_duration: stats.avg_blink_duration,
            total_eye_closure_duration: stats.total_eye_closure_duration,
            yawn_count: stats.yawn_count,
            drowsiness_state: state,
            reroute_triggered,
        }
    }
}

/// Row timestamps are second resolution, `%Y-%m-%d %H:%M:%S` UTC
mod row_timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(serde::de::Error::custom)
    }
}

/// Sort order for a user's sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrder {
    #[default]
    Latest,
    Oldest,
}

/// One monitoring session as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub username: String,
    pub start_timestamp: DateTime<Utc>,
    pub metrics: Vec<MetricRow>,
}

impl SessionRecord {
    /// Rows flagged as rerouted
    pub fn reroutes(&self) -> impl Iterator<Item = &MetricRow> {
        self.metrics
            .iter()
            .filter(|row| row.reroute_triggered == RerouteFlag::Yes)
    }

    pub fn summary(&self) -> SessionSummary {
        let mut state_counts = BTreeMap::new();
        for row in &self.metrics {
            *state_counts.entry(row.drowsiness_state).or_insert(0) += 1;
        }

        SessionSummary {
            session_id: self.session_id.clone(),
            start_timestamp: self.start_timestamp,
            total_rows: self.metrics.len(),
            reroutes: self.reroutes().count(),
            peak_state: self.metrics.iter().map(|row| row.drowsiness_state).max(),
            state_counts,
        }
    }
}

/// Dashboard overview of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub start_timestamp: DateTime<Utc>,
    pub total_rows: usize,
    pub reroutes: usize,
    pub peak_state: Option<DrowsinessState>,
    pub state_counts: BTreeMap<DrowsinessState, usize>,
}

/// Sort sessions in place by start time, then id
pub(crate) fn sort_sessions(sessions: &mut [SessionRecord], order: SessionOrder) {
    sessions.sort_by(|a, b| {
        a.start_timestamp
            .cmp(&b.start_timestamp)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    if order == SessionOrder::Latest {
        sessions.reverse();
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn record(username: &str, hour: u32, states: &[(DrowsinessState, RerouteFlag)]) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap();
        let metrics = states
            .iter()
            .enumerate()
            .map(|(i, (state, flag))| {
                let stats = DriverStats {
                    blink_count: i,
                    ..Default::default()
                };
                MetricRow::new(start + chrono::Duration::seconds(i as i64), &stats, *state, *flag)
            })
            .collect();

        SessionRecord {
            session_id: format!("session_{}", start.format("%Y-%m-%d_%H-%M-%S")),
            username: username.to_string(),
            start_timestamp: start,
            metrics,
        }
    }
}
