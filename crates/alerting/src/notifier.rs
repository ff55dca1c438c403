//! Alarm playback

use async_trait::async_trait;
use drowsiness::AlertSound;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{AlertsConfig, NotifyError};

/// How long the caller waits on playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Return once the sound has finished
    Blocking,
    /// Start the sound and return immediately
    FireAndForget,
}

/// Audio notification backend
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn play(&self, sound: AlertSound, playback: Playback) -> Result<(), NotifyError>;
}

/// Plays sound files with an external player process
pub struct CommandNotifier {
    player: String,
    player_args: Vec<String>,
    alarm_sound: PathBuf,
    strong_alarm_sound: PathBuf,
}

impl CommandNotifier {
    pub fn new(config: &AlertsConfig) -> Self {
        info!("Alarm player: {} {:?}", config.player, config.player_args);
        Self {
            player: config.player.clone(),
            player_args: config.player_args.clone(),
            alarm_sound: config.alarm_sound.clone(),
            strong_alarm_sound: config.strong_alarm_sound.clone(),
        }
    }

    fn sound_path(&self, sound: AlertSound) -> &Path {
        match sound {
            AlertSound::Alarm => &self.alarm_sound,
            AlertSound::StrongAlarm => &self.strong_alarm_sound,
        }
    }

    fn command(&self, sound: AlertSound) -> Result<Command, NotifyError> {
        let path = self.sound_path(sound);
        if !path.is_file() {
            return Err(NotifyError::MissingSound(path.to_path_buf()));
        }

        let mut command = Command::new(&self.player);
        command
            .args(&self.player_args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Ok(command)
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn play(&self, sound: AlertSound, playback: Playback) -> Result<(), NotifyError> {
        let mut command = self.command(sound)?;
        debug!("Playing {} ({:?})", sound.as_str(), playback);

        match playback {
            Playback::Blocking => {
                let status = command
                    .status()
                    .await
                    .map_err(|e| NotifyError::Spawn(e.to_string()))?;
                if !status.success() {
                    return Err(NotifyError::PlayerFailed(status.to_string()));
                }
            }
            Playback::FireAndForget => {
                let mut child = command
                    .spawn()
                    .map_err(|e| NotifyError::Spawn(e.to_string()))?;
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => warn!("Alarm player exited with {}", status),
                        Err(e) => warn!("Alarm player wait failed: {}", e),
                        Ok(_) => {}
                    }
                });
            }
        }
        Ok(())
    }
}

/// Logs alarms instead of playing them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn play(&self, sound: AlertSound, playback: Playback) -> Result<(), NotifyError> {
        warn!("ALERT {} ({:?})", sound.as_str(), playback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sound_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("alerting-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("alarm.mp3");
        fs::write(&path, b"ID3").unwrap();
        path
    }

    fn notifier(player: &str, sound: PathBuf) -> CommandNotifier {
        CommandNotifier::new(&AlertsConfig {
            player: player.to_string(),
            alarm_sound: sound.clone(),
            strong_alarm_sound: sound,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_blocking_playback_waits_for_player() {
        let notifier = notifier("true", sound_file("ok"));
        notifier.play(AlertSound::StrongAlarm, Playback::Blocking).await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_player_is_reported() {
        let notifier = notifier("false", sound_file("fail"));
        let err = notifier.play(AlertSound::Alarm, Playback::Blocking).await.unwrap_err();
        assert!(matches!(err, NotifyError::PlayerFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_sound_file() {
        let notifier = notifier("true", PathBuf::from("/nonexistent/alarm.mp3"));
        let err = notifier.play(AlertSound::Alarm, Playback::FireAndForget).await.unwrap_err();
        assert!(matches!(err, NotifyError::MissingSound(_)));
    }

    #[tokio::test]
    async fn test_unknown_player_fails_to_spawn() {
        let notifier = notifier("no-such-player-binary", sound_file("spawn"));
        let err = notifier.play(AlertSound::Alarm, Playback::FireAndForget).await.unwrap_err();
        assert!(matches!(err, NotifyError::Spawn(_)));
    }
}
