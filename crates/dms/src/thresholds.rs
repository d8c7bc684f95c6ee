//! Per-frame threshold adaptation from head pose and scene illuminance

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{ThresholdConfig, ThresholdProfile};
use crate::sample::{EyeMetric, MouthMetric};

/// Head position label produced by the perception feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadPosition {
    #[default]
    Front,
    SoftUp,
    SoftDown,
    SoftLeft,
    SoftRight,
    ExtremeUp,
    ExtremeDown,
    ExtremeLeft,
    ExtremeRight,
}

impl HeadPosition {
    /// Head dropped forward or thrown back
    pub fn is_fallen(&self) -> bool {
        matches!(self, Self::ExtremeDown | Self::ExtremeUp)
    }
}

/// Validation thresholds in effect for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSet {
    pub left_eye: Option<f64>,
    pub right_eye: Option<f64>,
    pub left_mouth: Option<f64>,
    pub right_mouth: Option<f64>,
    /// Extra margin for mesh eye aspect ratios
    pub mesh_eye_margin: f64,
    /// Yawn bound for mesh mouth aspect ratios
    pub mouth_aspect_ratio: f64,
}

fn enabled(threshold: Option<f64>) -> Option<f64> {
    threshold.filter(|t| *t > 0.0)
}

impl ThresholdSet {
    /// Recompute thresholds for a head position and illuminance.
    ///
    /// Stateless: nothing from previous frames is taken into account.
    pub fn adapt(position: HeadPosition, lux: i32, config: &ThresholdConfig) -> Self {
        let profile: &ThresholdProfile = match position {
            HeadPosition::ExtremeUp => &config.head_up_profile,
            HeadPosition::ExtremeRight => &config.turned_right_profile,
            HeadPosition::ExtremeLeft => &config.turned_left_profile,
            _ => &config.default_profile,
        };

        let mut set = Self {
            left_eye: enabled(profile.left_eye),
            right_eye: enabled(profile.right_eye),
            left_mouth: enabled(profile.left_mouth),
            right_mouth: enabled(profile.right_mouth),
            mesh_eye_margin: config.mesh_eye_margin,
            mouth_aspect_ratio: config.mouth_aspect_ratio_threshold,
        };

        if lux < config.darkness_lux_threshold {
            let eye = config.eye_dark_compensation;
            let mouth = config.mouth_dark_compensation;
            set.left_eye = set.left_eye.map(|t| t + eye);
            set.right_eye = set.right_eye.map(|t| t + eye);
            set.left_mouth = set.left_mouth.map(|t| t - mouth);
            set.right_mouth = set.right_mouth.map(|t| t - mouth);
        }

        trace!(?position, lux, ?set, "Thresholds adapted");
        set
    }

    /// Open/closed decision for the eye metric.
    ///
    /// A missing openness value counts as closed.
    pub fn eyes_closed(&self, metric: &EyeMetric) -> bool {
        let (left, right, margin) = match *metric {
            EyeMetric::OpenProbability { left, right } => (left, right, 0.0),
            EyeMetric::AspectRatio { left, right } => (Some(left), Some(right), self.mesh_eye_margin),
        };
        let (Some(left), Some(right)) = (left, right) else {
            return true;
        };

        match (self.left_eye, self.right_eye) {
            (Some(tl), Some(tr)) => (left + right) / 2.0 < ((tl + margin) + (tr + margin)) / 2.0,
            (Some(tl), None) => left < tl + margin,
            (None, Some(tr)) => right < tr + margin,
            (None, None) => false,
        }
    }

    /// Yawning decision for the mouth metric
    pub fn mouth_yawning(&self, metric: &MouthMetric) -> bool {
        match *metric {
            MouthMetric::LipAngles { right_corner_deg, left_corner_deg } => {
                if let Some(right) = self.right_mouth {
                    right_corner_deg > right
                } else if let Some(left) = self.left_mouth {
                    left_corner_deg > left
                } else {
                    false
                }
            }
            MouthMetric::AspectRatio { ratio } => ratio > self.mouth_aspect_ratio,
            MouthMetric::Missing => false,
        }
    }
}
