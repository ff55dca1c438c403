//! Capture devices

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::imageops::FilterType;
use tracing::{debug, info, warn};

use crate::frame::VideoFrame;
use crate::{CameraConfig, CameraError};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// A source of frames owned by exactly one monitoring worker.
///
/// `release` must be idempotent: the worker may release early (before a
/// forced reroute) and again during shutdown.
pub trait CaptureDevice: Send {
    /// Read the next frame. Any error ends the monitoring session.
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the underlying device handle
    fn release(&mut self);

    /// Whether the device still holds its handle
    fn is_open(&self) -> bool;
}

/// Replays a directory of recorded cabin frames in file-name order
pub struct ImageDirectoryCamera {
    frames: Vec<PathBuf>,
    cursor: usize,
    resize_to: Option<(u32, u32)>,
    opened_at: Instant,
    open: bool,
}

impl ImageDirectoryCamera {
    /// Open the directory named by the config and index its frames
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        info!("Opening image directory camera at {}", config.source_dir.display());

        let frames = Self::index(&config.source_dir)?;
        if frames.is_empty() {
            return Err(CameraError::Open(format!(
                "no frames found in {}",
                config.source_dir.display()
            )));
        }

        info!("Indexed {} frames", frames.len());
        let resize_to = match (config.width, config.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        };

        Ok(Self {
            frames,
            cursor: 0,
            resize_to,
            opened_at: Instant::now(),
            open: true,
        })
    }

    fn index(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();
        Ok(frames)
    }

    /// Number of frames left to replay
    pub fn remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.cursor)
    }
}

impl CaptureDevice for ImageDirectoryCamera {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if !self.open {
            return Err(CameraError::NotInitialized);
        }

        let path = self
            .frames
            .get(self.cursor)
            .ok_or(CameraError::Exhausted(self.cursor as u32))?;

        let decoded = image::open(path).map_err(|e| CameraError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut rgb = decoded.to_rgb8();
        if let Some((w, h)) = self.resize_to {
            if rgb.dimensions() != (w, h) {
                rgb = image::imageops::resize(&rgb, w, h, FilterType::Triangle);
            }
        }

        let sequence = self.cursor as u32;
        self.cursor += 1;
        debug!("Read frame {} from {}", sequence, path.display());

        let timestamp_ns = self.opened_at.elapsed().as_nanos() as u64;
        Ok(VideoFrame::from_rgb_image(rgb, timestamp_ns, sequence))
    }

    fn release(&mut self) {
        if self.open {
            info!("Releasing image directory camera after {} frames", self.cursor);
            self.open = false;
        } else {
            warn!("Camera release requested but device already released");
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
