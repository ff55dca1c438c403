//! Drowsiness severity and response actions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Drowsiness severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DrowsinessState {
    #[default]
    Normal,
    Moderate,
    Strong,
}

impl DrowsinessState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DrowsinessState::Normal => "NORMAL",
            DrowsinessState::Moderate => "MODERATE",
            DrowsinessState::Strong => "STRONG",
        }
    }
}

impl fmt::Display for DrowsinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named alert sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSound {
    Alarm,
    StrongAlarm,
}

impl AlertSound {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSound::Alarm => "alarm",
            AlertSound::StrongAlarm => "strong_alarm",
        }
    }
}

/// What the monitor must do for a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Keep monitoring silently
    Continue,
    /// Sound an alarm and ask the driver whether to reroute
    SuggestReroute,
    /// Sound the strong alarm and reroute unconditionally
    ForceReroute,
}

impl Action {
    pub fn for_state(state: DrowsinessState) -> Self {
        match state {
            DrowsinessState::Normal => Action::Continue,
            DrowsinessState::Moderate => Action::SuggestReroute,
            DrowsinessState::Strong => Action::ForceReroute,
        }
    }

    /// Alarm to play, if any
    pub fn sound(&self) -> Option<AlertSound> {
        match self {
            Action::Continue => None,
            Action::SuggestReroute => Some(AlertSound::Alarm),
            Action::ForceReroute => Some(AlertSound::StrongAlarm),
        }
    }
}
