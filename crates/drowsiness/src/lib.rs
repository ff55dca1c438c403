//! Driver Drowsiness Detection
//!
//! Turns per-frame classifier output into a drowsiness verdict:
//! - Label vocabulary and eye-state conflict resolution
//! - Blink and yawn trackers over a rolling window
//! - Severity evaluation (NORMAL / MODERATE / STRONG)
//! - ONNX object-detector adapter producing frame labels

pub mod classifier;
pub mod config;
pub mod evaluator;
pub mod labels;
pub mod state;
pub mod tracker;

pub use classifier::{Classifier, ClassifierConfig, OnnxClassifier};
pub use config::DrowsinessConfig;
pub use evaluator::{evaluate, Assessment};
pub use labels::{Detection, FrameLabels, Label};
pub use state::{Action, AlertSound, DrowsinessState};
pub use tracker::{BlinkTracker, DriverStats, EventTrackers, TimedEvent, YawnTracker};

use thiserror::Error;

/// Classifier error types
///
/// Any of these on a single frame means the frame is skipped.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Unexpected model output shape {0:?}")]
    OutputShape(Vec<usize>),
}
