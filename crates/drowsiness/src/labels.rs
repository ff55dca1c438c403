//! Per-frame label vocabulary

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Classifier label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    EyeOpen,
    EyeClosed,
    Yawn,
    NoYawn,
    HeadDropped,
    /// Any class the model emits outside the known vocabulary
    Other(String),
}

impl Label {
    /// Map a model class name onto the vocabulary
    pub fn from_class_name(name: &str) -> Self {
        match name {
            "eye_open" => Label::EyeOpen,
            "eye_closed" => Label::EyeClosed,
            "yawn" => Label::Yawn,
            "no_yawn" => Label::NoYawn,
            "head_dropped" => Label::HeadDropped,
            other => Label::Other(other.to_string()),
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        match self {
            Label::EyeOpen => "eye_open",
            Label::EyeClosed => "eye_closed",
            Label::Yawn => "yawn",
            Label::NoYawn => "no_yawn",
            Label::HeadDropped => "head_dropped",
            Label::Other(name) => name,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detection from the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: Label,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: Label, confidence: f32) -> Self {
        Self { label, confidence }
    }
}

/// Set of labels observed in one frame.
///
/// Never holds both `EyeOpen` and `EyeClosed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameLabels {
    labels: HashSet<Label>,
}

impl FrameLabels {
    /// Collapse raw detections into a label set.
    ///
    /// The eye label with the higher peak confidence wins; a tie goes to
    /// `EyeOpen`. Detections with zero confidence are ignored for the eyes.
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut open = 0.0f32;
        let mut closed = 0.0f32;
        let mut labels = HashSet::new();

        for detection in detections {
            match detection.label {
                Label::EyeOpen => open = open.max(detection.confidence),
                Label::EyeClosed => closed = closed.max(detection.confidence),
                _ => {
                    labels.insert(detection.label.clone());
                }
            }
        }

        if open > 0.0 || closed > 0.0 {
            labels.insert(if closed > open {
                Label::EyeClosed
            } else {
                Label::EyeOpen
            });
        }

        Self { labels }
    }

    /// Labels at full confidence; conflicting eye labels resolve to `EyeOpen`
    pub fn of(labels: &[Label]) -> Self {
        let detections: Vec<_> = labels
            .iter()
            .cloned()
            .map(|label| Detection::new(label, 1.0))
            .collect();
        Self::from_detections(&detections)
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    pub fn eyes_closed(&self) -> bool {
        self.contains(&Label::EyeClosed)
    }

    pub fn yawning(&self) -> bool {
        self.contains(&Label::Yawn)
    }

    pub fn not_yawning(&self) -> bool {
        self.contains(&Label::NoYawn)
    }

    pub fn head_dropped(&self) -> bool {
        self.contains(&Label::HeadDropped)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}
