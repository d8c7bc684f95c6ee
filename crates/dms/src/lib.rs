//! Driver Monitoring System (DMS)
//!
//! Drowsiness risk classification from per-frame face features:
//! - Threshold adaptation to head pose and scene illuminance
//! - Time-windowed eyes, mouth and head state classification
//! - Joint state to risk flag normalization with repeated-event memory

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod sample;
pub mod state;
pub mod thresholds;

pub use analysis::{normalize, FlagDecision, RecentEvents, RepeatedEventMemory, Trace, TraceMarkers};
pub use classifier::{
    EyesClassifier, FeatureClassifier, FeatureTracker, HeadClassifier, MouthClassifier,
};
pub use config::{
    DetectionConfig, DriverFaceBounds, ThresholdConfig, ThresholdProfile, TimingConfig,
    WheelPosition,
};
pub use detector::{select_driver_face, BasicFace, FeatureSource, MeshFace, Point2, Point3};
pub use sample::{EyeMetric, FaceParameters, FeatureSample, MouthMetric};
pub use state::{EyesState, FeatureStates, HeadState, MouthState, RiskFlag};
pub use thresholds::{HeadPosition, ThresholdSet};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Keypoints missing for feature calculation")]
    KeypointsMissing,

    #[error("Invalid feature metric: {0}")]
    InvalidMetric(String),
}
