//! Alerting System
//!
//! Turns a drowsiness verdict into collaborator calls:
//! - Alarm playback through an external player
//! - Reroute requests to the routing collaborator
//! - Yes/no reroute confirmation through the UI boundary

mod dispatcher;
mod notifier;

pub use dispatcher::{Confirmation, Confirmer, ResponseDispatcher};
pub use notifier::{CommandNotifier, LogNotifier, Notifier, Playback};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Sound file not found: {0}")]
    MissingSound(PathBuf),
    #[error("Failed to start player: {0}")]
    Spawn(String),
    #[error("Player exited with {0}")]
    PlayerFailed(String),
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Play sounds; when false alarms are only logged
    pub enabled: bool,
    /// External audio player executable
    pub player: String,
    /// Arguments placed before the sound file
    pub player_args: Vec<String>,
    /// Sound for MODERATE alerts
    pub alarm_sound: PathBuf,
    /// Sound for STRONG alerts
    pub strong_alarm_sound: PathBuf,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player: default_player().to_string(),
            player_args: Vec::new(),
            alarm_sound: PathBuf::from("sounds/beep-beep-beep-beep-80262.mp3"),
            strong_alarm_sound: PathBuf::from("sounds/emergency-alarm-with-reverb-29431.mp3"),
        }
    }
}

fn default_player() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "paplay"
    }
}
