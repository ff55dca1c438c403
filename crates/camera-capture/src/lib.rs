//! Camera Capture Library for Driver Drowsiness Monitoring
//!
//! Provides the capture-device seam used by the monitoring loop:
//! - `CaptureDevice` trait (frames on demand, explicit release)
//! - `ImageDirectoryCamera` replaying recorded cabin frames from disk
//! - `live::V4l2Camera` streaming from a cabin webcam (`v4l2` feature)
//! - RGB `VideoFrame` type shared with the classifier

pub mod device;
pub mod frame;
pub mod live;

pub use device::{CaptureDevice, ImageDirectoryCamera};
pub use frame::VideoFrame;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Failed to decode frame {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Frame source exhausted after {0} frames")]
    Exhausted(u32),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Camera not initialized or already released")]
    NotInitialized,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Live V4L2 device, an index (`0`) or a path (`/dev/video0`). When set
    /// it takes precedence over `source_dir`.
    pub device: Option<String>,
    /// Directory holding recorded frames (jpg/png), replayed in file-name order
    pub source_dir: PathBuf,
    /// Nominal capture rate, used by the loop for pacing
    pub fps: u32,
    /// Frames are resized to this width when set
    pub width: Option<u32>,
    /// Frames are resized to this height when set
    pub height: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            source_dir: PathBuf::from("frames"),
            fps: 15,
            width: None,
            height: None,
        }
    }
}

impl CameraConfig {
    /// Cabin camera replay config for a directory of frames
    pub fn cabin(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            ..Default::default()
        }
    }
}

/// Open the live camera if one is configured, else replay `source_dir`
pub fn open_capture(config: &CameraConfig) -> Result<Box<dyn CaptureDevice>, CameraError> {
    match config.device.as_deref() {
        Some(device) => live::open(device, config),
        None => Ok(Box::new(ImageDirectoryCamera::open(config)?)),
    }
}
