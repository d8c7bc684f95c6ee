//! Per-frame feature measurements

use serde::{Deserialize, Serialize};

use crate::detector::FeatureSource;
use crate::thresholds::HeadPosition;
use crate::DmsError;

/// Eye openness indicators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EyeMetric {
    /// Classifier open probabilities (0-1); `None` when the model gave no value
    OpenProbability {
        left: Option<f64>,
        right: Option<f64>,
    },
    /// Eye aspect ratios from mesh landmarks
    AspectRatio { left: f64, right: f64 },
}

/// Mouth opening indicator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MouthMetric {
    /// Corner angles (degrees) of the lip triangle
    LipAngles {
        right_corner_deg: f64,
        left_corner_deg: f64,
    },
    /// Mouth aspect ratio from mesh landmarks
    AspectRatio { ratio: f64 },
    /// Lip contours not available
    Missing,
}

/// One processed frame worth of features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSample {
    pub eye: EyeMetric,
    pub mouth: MouthMetric,
    pub head_position: HeadPosition,
    pub illuminance_lux: i32,
    /// Monotonic frame time (milliseconds)
    pub timestamp_ms: u64,
}

impl FeatureSample {
    /// Extract a sample from a perception backend
    pub fn from_source(
        source: &dyn FeatureSource,
        illuminance_lux: i32,
        timestamp_ms: u64,
    ) -> Result<Self, DmsError> {
        Ok(Self {
            eye: source.eye_metric()?,
            mouth: source.mouth_metric()?,
            head_position: source.head_position()?,
            illuminance_lux,
            timestamp_ms,
        })
    }
}

/// Per-frame face measurements reported alongside risk flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceParameters {
    pub lux: i32,
    pub eyes_delta_x: f64,
    pub eyes_delta_y: f64,
    pub head_position: HeadPosition,
    pub timestamp_ms: u64,
}

impl FaceParameters {
    pub fn from_source(
        source: &dyn FeatureSource,
        illuminance_lux: i32,
        timestamp_ms: u64,
    ) -> Result<Self, DmsError> {
        let (eyes_delta_x, eyes_delta_y) = source.eyes_delta()?;
        Ok(Self {
            lux: illuminance_lux,
            eyes_delta_x,
            eyes_delta_y,
            head_position: source.head_position()?,
            timestamp_ms,
        })
    }
}
