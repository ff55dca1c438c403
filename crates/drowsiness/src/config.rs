//! Drowsiness thresholds

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Thresholds for event tracking and state evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrowsinessConfig {
    /// Rolling window for blink/yawn history (seconds)
    pub window_secs: u64,

    /// Continuous eye closure that forces STRONG (seconds)
    pub strong_closure_secs: f64,

    /// Yawns within the window that raise MODERATE
    pub moderate_yawn_count: usize,

    /// Shortest yawn counted as real (seconds)
    pub min_yawn_secs: f64,

    /// Longest yawn counted as real (seconds)
    pub max_yawn_secs: f64,
}

impl Default for DrowsinessConfig {
    fn default() -> Self {
        Self {
            window_secs: 120,
            strong_closure_secs: 5.0,
            moderate_yawn_count: 3,
            min_yawn_secs: 2.0,
            max_yawn_secs: 10.0,
        }
    }
}

impl DrowsinessConfig {
    /// Create strict config (earlier escalation)
    pub fn strict() -> Self {
        Self {
            strong_closure_secs: 3.0,
            moderate_yawn_count: 2,
            ..Default::default()
        }
    }

    /// Create lenient config (later escalation)
    pub fn lenient() -> Self {
        Self {
            strong_closure_secs: 7.0,
            moderate_yawn_count: 4,
            ..Default::default()
        }
    }

    /// Retention window as a duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Accepted yawn durations, inclusive on both ends
    pub fn yawn_range(&self) -> RangeInclusive<f64> {
        self.min_yawn_secs..=self.max_yawn_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_order_by_closure_threshold() {
        let strict = DrowsinessConfig::strict();
        let default = DrowsinessConfig::default();
        let lenient = DrowsinessConfig::lenient();

        assert!(strict.strong_closure_secs < default.strong_closure_secs);
        assert!(lenient.strong_closure_secs > default.strong_closure_secs);
        assert_eq!(strict.window(), Duration::from_secs(120));
    }

    #[test]
    fn test_yawn_range_is_inclusive() {
        let range = DrowsinessConfig::default().yawn_range();
        assert!(range.contains(&2.0));
        assert!(range.contains(&10.0));
        assert!(!range.contains(&10.01));
    }
}
