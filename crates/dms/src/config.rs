//! DMS detection configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Eye and mouth validation thresholds for one head pose.
///
/// `None` disables validation of that side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub left_eye: Option<f64>,
    pub right_eye: Option<f64>,
    pub left_mouth: Option<f64>,
    pub right_mouth: Option<f64>,
}

/// Threshold adaptation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Front face and soft movements
    pub default_profile: ThresholdProfile,

    /// Head tilted up beyond the extreme angle (mouth thresholds keep the default profile)
    pub head_up_profile: ThresholdProfile,

    /// Head turned right beyond the extreme angle
    pub turned_right_profile: ThresholdProfile,

    /// Head turned left beyond the extreme angle
    pub turned_left_profile: ThresholdProfile,

    /// Scenes below this illuminance get dark compensation (lux)
    pub darkness_lux_threshold: i32,

    /// Added to every enabled eye threshold in dark scenes
    pub eye_dark_compensation: f64,

    /// Subtracted from every enabled mouth threshold in dark scenes
    pub mouth_dark_compensation: f64,

    /// Added to enabled eye thresholds when eyes are measured as mesh aspect ratios
    pub mesh_eye_margin: f64,

    /// Mouth aspect ratio above which the mouth counts as yawning
    pub mouth_aspect_ratio_threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            default_profile: ThresholdProfile {
                left_eye: Some(0.05),
                right_eye: Some(0.05),
                left_mouth: Some(42.0),
                right_mouth: Some(42.0),
            },
            head_up_profile: ThresholdProfile {
                left_eye: Some(0.025),
                right_eye: Some(0.025),
                left_mouth: Some(42.0),
                right_mouth: Some(42.0),
            },
            turned_right_profile: ThresholdProfile {
                left_eye: Some(0.144),
                right_eye: None,
                left_mouth: None,
                right_mouth: Some(47.0),
            },
            turned_left_profile: ThresholdProfile {
                left_eye: None,
                right_eye: Some(0.144),
                left_mouth: Some(47.0),
                right_mouth: None,
            },
            darkness_lux_threshold: 36,
            eye_dark_compensation: 4.0,
            mouth_dark_compensation: 4.0,
            mesh_eye_margin: 0.02,
            mouth_aspect_ratio_threshold: 0.61,
        }
    }
}

/// Duration buckets for the feature state machines (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Closures shorter than this are ordinary blinks
    pub blink_max_ms: u64,
    /// Last closure duration still reported as drowsiness
    pub drowsiness_max_ms: u64,
    /// Last closure duration still reported as micro sleep; longer is sleep
    pub micro_sleep_max_ms: u64,
    /// Drowsiness events closer than this to the previous one are not repeats
    pub repeated_drowsiness_min_gap_ms: u64,
    /// Open eyes without any blink for this long are treated as signal loss
    pub blink_timeout_ms: u64,

    /// Minimum continuous mouth opening counted as a yawn
    pub yawn_min_ms: u64,
    /// Yawn events within this gap of the previous one are not repeats
    pub yawn_refractory_ms: u64,

    /// Minimum continuous fallen duration counted as a quick fall
    pub quick_fall_min_ms: u64,
    /// Fallen duration from which the head counts as fallen
    pub fall_min_ms: u64,
    /// Quick falls within this gap of the previous one are not repeats
    pub quick_fall_refractory_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            blink_max_ms: 500,
            drowsiness_max_ms: 999,
            micro_sleep_max_ms: 2999,
            repeated_drowsiness_min_gap_ms: 1001,
            blink_timeout_ms: 30_000,
            yawn_min_ms: 2500,
            yawn_refractory_ms: 2500,
            quick_fall_min_ms: 1001,
            fall_min_ms: 3000,
            quick_fall_refractory_ms: 2000,
        }
    }
}

/// Steering wheel side, used to pick the driver among detected faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelPosition {
    #[default]
    Left,
    Right,
}

/// Bounding-box centre limits (pixels) for driver face selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverFaceBounds {
    /// Left-hand drive: first face centred right of this x (mirrored image)
    pub left_wheel_min_center_x: f64,
    /// Right-hand drive: first face centred left of this x
    pub right_wheel_max_center_x: f64,
}

impl Default for DriverFaceBounds {
    fn default() -> Self {
        Self {
            left_wheel_min_center_x: 0.0,
            right_wheel_max_center_x: 9999.0,
        }
    }
}

/// DMS detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub thresholds: ThresholdConfig,
    pub timing: TimingConfig,

    /// Window for repeated-event memory (repeat detection and "recently seen")
    pub repeated_event_window_ms: u64,

    pub wheel_position: WheelPosition,
    pub driver_face: DriverFaceBounds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            timing: TimingConfig::default(),
            repeated_event_window_ms: 60_000,
            wheel_position: WheelPosition::default(),
            driver_face: DriverFaceBounds::default(),
        }
    }
}

impl DetectionConfig {
    /// Create strict config (shorter hysteresis)
    pub fn strict() -> Self {
        Self {
            timing: TimingConfig {
                blink_max_ms: 400,
                drowsiness_max_ms: 799,
                micro_sleep_max_ms: 2499,
                yawn_min_ms: 2000,
                quick_fall_min_ms: 801,
                fall_min_ms: 2500,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create lenient config (longer hysteresis)
    pub fn lenient() -> Self {
        Self {
            timing: TimingConfig {
                blink_max_ms: 700,
                drowsiness_max_ms: 1499,
                micro_sleep_max_ms: 3999,
                repeated_drowsiness_min_gap_ms: 1501,
                yawn_min_ms: 3500,
                quick_fall_min_ms: 1501,
                fall_min_ms: 4000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Check that bucket boundaries are ordered and windows are usable
    pub fn validate(&self) -> Result<(), DmsError> {
        let t = &self.timing;
        if !(t.blink_max_ms <= t.drowsiness_max_ms && t.drowsiness_max_ms < t.micro_sleep_max_ms) {
            return Err(DmsError::Config(format!(
                "eye buckets must satisfy blink_max <= drowsiness_max < micro_sleep_max ({} / {} / {})",
                t.blink_max_ms, t.drowsiness_max_ms, t.micro_sleep_max_ms
            )));
        }
        if t.quick_fall_min_ms >= t.fall_min_ms {
            return Err(DmsError::Config(format!(
                "quick_fall_min_ms ({}) must be below fall_min_ms ({})",
                t.quick_fall_min_ms, t.fall_min_ms
            )));
        }
        if self.repeated_event_window_ms <= t.repeated_drowsiness_min_gap_ms
            || self.repeated_event_window_ms <= t.yawn_refractory_ms
            || self.repeated_event_window_ms <= t.quick_fall_refractory_ms
        {
            return Err(DmsError::Config(
                "repeated_event_window_ms must exceed every refractory gap".into(),
            ));
        }
        if self.thresholds.mouth_aspect_ratio_threshold <= 0.0 {
            return Err(DmsError::Config(
                "mouth_aspect_ratio_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}
