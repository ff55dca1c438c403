//! Per-frame label classifier

use std::path::PathBuf;

use camera_capture::VideoFrame;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tract_onnx::prelude::*;
use tracing::{debug, error, info};

use crate::labels::{Detection, Label};
use crate::ClassifierError;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Anything that can label a frame
pub trait Classifier: Send {
    fn classify(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>, ClassifierError>;
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// ONNX export of the detector
    pub model_path: Option<PathBuf>,

    /// Square model input side (pixels)
    pub input_size: u32,

    /// Minimum class score for a detection
    pub confidence_threshold: f32,

    /// Class names in model output order
    pub class_names: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: 640,
            confidence_threshold: 0.25,
            class_names: ["eye_closed", "eye_open", "head_dropped", "no_yawn", "yawn"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// YOLO-style detector exported to ONNX, run with tract
pub struct OnnxClassifier {
    plan: OnnxPlan,
    input_size: u32,
    confidence_threshold: f32,
    class_names: Vec<String>,
}

impl OnnxClassifier {
    /// Load and optimize the model named in the config
    pub fn load(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let path = config
            .model_path
            .as_ref()
            .ok_or_else(|| ClassifierError::ModelLoad("no model path configured".to_string()))?;

        info!("Loading drowsiness detector from {}", path.display());
        let side = config.input_size as usize;

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, side, side]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                error!("Failed to load detector model: {}", e);
                ClassifierError::ModelLoad(e.to_string())
            })?;

        info!(
            "Detector ready ({}x{}, {} classes)",
            side,
            side,
            config.class_names.len()
        );

        Ok(Self {
            plan,
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            class_names: config.class_names.clone(),
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Tensor, ClassifierError> {
        let img = frame.to_rgb_image().ok_or_else(|| {
            ClassifierError::ImageProcessing("frame buffer does not match its dimensions".into())
        })?;

        let side = self.input_size;
        let resized = image::imageops::resize(&img, side, side, FilterType::Triangle);

        let n = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, n, n), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok(input.into())
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>, ClassifierError> {
        let input = self.preprocess(frame)?;

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output = first_output(&outputs[..])?
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let shape = output.shape().to_vec();
        let output = output
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|_| ClassifierError::OutputShape(shape))?;

        let detections = decode_detections(output, &self.class_names, self.confidence_threshold)?;
        debug!("Frame {}: {} detections", frame.sequence, detections.len());
        Ok(detections)
    }
}

/// The detector head; a model without outputs fails the frame
fn first_output<T>(outputs: &[T]) -> Result<&T, ClassifierError> {
    outputs.first().ok_or(ClassifierError::OutputShape(Vec::new()))
}

/// Decode a `[1, 4 + classes, anchors]` detector head.
///
/// Each anchor contributes its best-scoring class when the score reaches the
/// threshold. Box coordinates are ignored; only the labels matter here.
pub fn decode_detections(
    output: tract_ndarray::ArrayView3<f32>,
    class_names: &[String],
    threshold: f32,
) -> Result<Vec<Detection>, ClassifierError> {
    let (batch, rows, anchors) = output.dim();
    if batch != 1 || rows != 4 + class_names.len() {
        return Err(ClassifierError::OutputShape(vec![batch, rows, anchors]));
    }

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let best = (0..class_names.len())
            .map(|class| (class, output[[0, 4 + class, anchor]]))
            .fold(None, |best: Option<(usize, f32)>, (class, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((class, score)),
            });

        if let Some((class, score)) = best {
            if score >= threshold {
                detections.push(Detection::new(Label::from_class_name(&class_names[class]), score));
            }
        }
    }

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::FrameLabels;

    fn names() -> Vec<String> {
        ClassifierConfig::default().class_names
    }

    #[test]
    fn test_decode_picks_best_class_per_anchor() {
        // 3 anchors, classes: eye_closed, eye_open, head_dropped, no_yawn, yawn
        let mut head = tract_ndarray::Array3::<f32>::zeros((1, 9, 3));
        head[[0, 4, 0]] = 0.80; // eye_closed
        head[[0, 5, 0]] = 0.30; // eye_open
        head[[0, 8, 1]] = 0.60; // yawn
        head[[0, 7, 2]] = 0.10; // no_yawn, below threshold

        let detections = decode_detections(head.view(), &names(), 0.25).unwrap();
        assert_eq!(
            detections,
            vec![
                Detection::new(Label::EyeClosed, 0.80),
                Detection::new(Label::Yawn, 0.60),
            ]
        );

        let labels = FrameLabels::from_detections(&detections);
        assert!(labels.eyes_closed());
        assert!(labels.yawning());
    }

    #[test]
    fn test_decode_rejects_class_count_mismatch() {
        let head = tract_ndarray::Array3::<f32>::zeros((1, 6, 4));
        let err = decode_detections(head.view(), &names(), 0.25).unwrap_err();
        assert!(matches!(err, ClassifierError::OutputShape(shape) if shape == vec![1, 6, 4]));
    }

    #[test]
    fn test_model_without_outputs_skips_frame() {
        let err = first_output::<f32>(&[]).unwrap_err();
        assert!(matches!(err, ClassifierError::OutputShape(shape) if shape.is_empty()));
        assert_eq!(first_output(&[7, 8]).unwrap(), &7);
    }

    #[test]
    fn test_load_without_model_path_fails() {
        let err = OnnxClassifier::load(&ClassifierConfig::default()).err().unwrap();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }
}
