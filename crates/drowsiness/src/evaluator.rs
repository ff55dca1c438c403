//! Drowsiness state evaluation

use serde::{Deserialize, Serialize};

use crate::config::DrowsinessConfig;
use crate::labels::FrameLabels;
use crate::state::{Action, DrowsinessState};
use crate::tracker::DriverStats;

/// Verdict for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub state: DrowsinessState,
    pub message: String,
    pub action: Action,
}

/// Classify the driver from tracker statistics and the current frame.
///
/// First match wins: prolonged closure is STRONG, frequent yawning is
/// MODERATE, anything else is NORMAL. A dropped head is reported but does not
/// lower the closure threshold.
pub fn evaluate(stats: &DriverStats, labels: &FrameLabels, config: &DrowsinessConfig) -> Assessment {
    let closure = stats.total_eye_closure_duration;

    let (state, message) = if closure >= config.strong_closure_secs {
        let cause = if labels.head_dropped() {
            "Head dropped with prolonged eye closure"
        } else {
            "Prolonged eye closure"
        };
        (
            DrowsinessState::Strong,
            format!("Critical drowsiness: {cause} ({closure:.1}s). Rerouting to rest stop."),
        )
    } else if stats.yawn_count >= config.moderate_yawn_count {
        (
            DrowsinessState::Moderate,
            format!(
                "Warning: {} yawns in the last {}s. Suggest a break?",
                stats.yawn_count, config.window_secs
            ),
        )
    } else {
        (
            DrowsinessState::Normal,
            "Driver appears alert. Monitoring...".to_string(),
        )
    };

    Assessment {
        state,
        message,
        action: Action::for_state(state),
    }
}
