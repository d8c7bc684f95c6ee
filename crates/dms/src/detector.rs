//! Perception backends: turn face landmarks into classifier inputs
//!
//! Two backends are supported:
//! - `BasicFace`: per-eye open probabilities, head Euler angles and lip contours
//! - `MeshFace`: dense 468-point face mesh
//!
//! Both expose the same `FeatureSource` capability so the state machines never
//! see which one produced a sample.
//!
//! The front camera image is mirrored: landmarks the model labels as the
//! image-right eye belong to the driver's left eye, and the other way round.

use serde::{Deserialize, Serialize};

use crate::config::{DriverFaceBounds, WheelPosition};
use crate::sample::{EyeMetric, MouthMetric};
use crate::thresholds::HeadPosition;
use crate::DmsError;

/// 2D landmark
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// 3D mesh landmark
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn planar(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Capability shared by all perception backends
pub trait FeatureSource {
    /// Eye openness, sides from the driver's point of view
    fn eye_metric(&self) -> Result<EyeMetric, DmsError>;
    fn mouth_metric(&self) -> Result<MouthMetric, DmsError>;
    fn head_position(&self) -> Result<HeadPosition, DmsError>;
    /// Absolute x/y distance between the two eye landmarks (pixels)
    fn eyes_delta(&self) -> Result<(f64, f64), DmsError>;
    /// Horizontal centre of the face bounding box (pixels)
    fn bounding_box_center_x(&self) -> f64;
}

/// Pick the driver among the faces detected in one frame
pub fn select_driver_face<'a, F: FeatureSource>(
    faces: &'a [F],
    wheel: WheelPosition,
    bounds: &DriverFaceBounds,
) -> Option<&'a F> {
    faces.iter().find(|face| {
        let center_x = face.bounding_box_center_x();
        match wheel {
            WheelPosition::Left => center_x > bounds.left_wheel_min_center_x,
            WheelPosition::Right => center_x < bounds.right_wheel_max_center_x,
        }
    })
}

/// Euler-angle limits (degrees) separating soft and extreme head movements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EulerLimits {
    pub soft_down: f64,
    pub extreme_down: f64,
    pub soft_up: f64,
    pub extreme_up: f64,
    pub soft_left: f64,
    pub extreme_left: f64,
    pub soft_right: f64,
    pub extreme_right: f64,
}

impl Default for EulerLimits {
    fn default() -> Self {
        Self {
            soft_down: -5.0,
            extreme_down: -14.0,
            soft_up: 20.0,
            extreme_up: 30.0,
            soft_left: 18.0,
            extreme_left: 38.0,
            soft_right: -18.0,
            extreme_right: -38.0,
        }
    }
}

impl HeadPosition {
    /// Classify head pose from Euler angles (x = pitch, y = yaw)
    pub fn from_euler(x: f64, y: f64, limits: &EulerLimits) -> Self {
        if x < limits.soft_down {
            if x < limits.extreme_down {
                Self::ExtremeDown
            } else {
                Self::SoftDown
            }
        } else if x > limits.soft_up {
            if x > limits.extreme_up {
                Self::ExtremeUp
            } else {
                Self::SoftUp
            }
        } else if y > limits.soft_left {
            if y > limits.extreme_left {
                Self::ExtremeLeft
            } else {
                Self::SoftLeft
            }
        } else if y < limits.soft_right {
            if y < limits.extreme_right {
                Self::ExtremeRight
            } else {
                Self::SoftRight
            }
        } else {
            Self::Front
        }
    }
}

// Lip contour indices used to build the mouth triangle
const LIP_LEFT_POINT: usize = 0;
const LIP_RIGHT_POINT: usize = 8;
const LIP_BOTTOM_CENTER_POINT: usize = 4;

/// Face from the basic landmark model
///
/// Eye fields keep the model's image-side labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicFace {
    pub left_eye_open_probability: Option<f64>,
    pub right_eye_open_probability: Option<f64>,
    #[serde(default)]
    pub left_eye_position: Option<Point2>,
    #[serde(default)]
    pub right_eye_position: Option<Point2>,
    #[serde(default)]
    pub bounding_box_center_x: f64,
    /// Head pitch (degrees)
    pub head_euler_x: f64,
    /// Head yaw (degrees)
    pub head_euler_y: f64,
    #[serde(default)]
    pub upper_lip_bottom: Option<Vec<Point2>>,
    #[serde(default)]
    pub lower_lip_top: Option<Vec<Point2>>,
    #[serde(skip)]
    pub euler_limits: EulerLimits,
}

/// Corner angles (degrees) of triangle ABC at A (alpha) and at B (beta)
fn lip_triangle_angles(a: &Point2, b: &Point2, c: &Point2) -> Option<(f64, f64)> {
    let a2 = b.distance_squared(c);
    let b2 = a.distance_squared(c);
    let c2 = a.distance_squared(b);
    let (sa, sb, sc) = (a2.sqrt(), b2.sqrt(), c2.sqrt());
    if sa == 0.0 || sb == 0.0 || sc == 0.0 {
        return None;
    }

    let alpha = ((b2 + c2 - a2) / (2.0 * sb * sc)).clamp(-1.0, 1.0).acos().to_degrees();
    let gamma = ((a2 + b2 - c2) / (2.0 * sa * sb)).clamp(-1.0, 1.0).acos().to_degrees();
    Some((alpha, 180.0 - (alpha + gamma)))
}

impl FeatureSource for BasicFace {
    fn eye_metric(&self) -> Result<EyeMetric, DmsError> {
        Ok(EyeMetric::OpenProbability {
            left: self.right_eye_open_probability,
            right: self.left_eye_open_probability,
        })
    }

    fn mouth_metric(&self) -> Result<MouthMetric, DmsError> {
        let (Some(top), Some(bottom)) = (&self.upper_lip_bottom, &self.lower_lip_top) else {
            return Ok(MouthMetric::Missing);
        };
        let (Some(a), Some(b), Some(c)) = (
            top.get(LIP_LEFT_POINT),
            top.get(LIP_RIGHT_POINT),
            bottom.get(LIP_BOTTOM_CENTER_POINT),
        ) else {
            return Ok(MouthMetric::Missing);
        };

        Ok(match lip_triangle_angles(a, b, c) {
            Some((alpha, beta)) => MouthMetric::LipAngles {
                right_corner_deg: alpha,
                left_corner_deg: beta,
            },
            None => MouthMetric::Missing,
        })
    }

    fn head_position(&self) -> Result<HeadPosition, DmsError> {
        Ok(HeadPosition::from_euler(
            self.head_euler_x,
            self.head_euler_y,
            &self.euler_limits,
        ))
    }

    fn eyes_delta(&self) -> Result<(f64, f64), DmsError> {
        Ok(match (&self.left_eye_position, &self.right_eye_position) {
            (Some(left), Some(right)) => ((left.x - right.x).abs(), (left.y - right.y).abs()),
            _ => (0.0, 0.0),
        })
    }

    fn bounding_box_center_x(&self) -> f64 {
        self.bounding_box_center_x
    }
}

/// Number of points in a complete face mesh
pub const MESH_POINT_COUNT: usize = 468;

// Eye contours by image side
const IMAGE_LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
const IMAGE_RIGHT_EYE: [usize; 6] = [263, 387, 385, 362, 380, 373];
const MOUTH: [usize; 6] = [78, 81, 311, 308, 402, 178];
const NOSE_TIP_CENTER: usize = 4;
const NOSE_TIP: usize = 1;
const NOSE_TOP: usize = 6;
const CHIN: usize = 199;

/// Mesh geometry limits for head pose classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshHeadLimits {
    /// Pitch ratio above which the head is dropped
    pub max_pitch_ratio_down: f64,
    /// Chin depth below which the head is thrown back
    pub max_chin_depth_up: f64,
    /// Horizontal nose offset (pixels) beyond which the head is turned left
    pub max_offset_left: f64,
    /// Horizontal nose offset (pixels) beyond which the head is turned right
    pub max_offset_right: f64,
}

impl Default for MeshHeadLimits {
    fn default() -> Self {
        Self {
            max_pitch_ratio_down: 1.0,
            max_chin_depth_up: -35.0,
            max_offset_left: -42.0,
            max_offset_right: 42.0,
        }
    }
}

/// Face from the dense mesh model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshFace {
    pub points: Vec<Point3>,
    pub bounding_box_center_x: f64,
    #[serde(skip)]
    pub head_limits: MeshHeadLimits,
}

impl MeshFace {
    fn point(&self, index: usize) -> Result<&Point3, DmsError> {
        self.points.get(index).ok_or(DmsError::KeypointsMissing)
    }

    /// `(|p2-p6| + |p3-p5|) / (2 |p1-p4|)` over six landmark indices
    fn aspect_ratio(&self, indices: &[usize; 6]) -> Result<f64, DmsError> {
        let p = |i: usize| self.point(indices[i]).map(Point3::planar);
        let vertical = p(1)?.distance(&p(5)?) + p(2)?.distance(&p(4)?);
        let horizontal = p(0)?.distance(&p(3)?);
        if horizontal == 0.0 {
            return Err(DmsError::InvalidMetric("degenerate landmark span".into()));
        }
        Ok(vertical / (2.0 * horizontal))
    }

    /// Nose length relative to nose-to-chin distance
    pub fn pitch_ratio(&self) -> Result<f64, DmsError> {
        let tip = self.point(NOSE_TIP)?.y;
        let top = self.point(NOSE_TOP)?.y;
        let chin = self.point(CHIN)?.y;
        let span = chin - tip;
        if span == 0.0 {
            return Err(DmsError::InvalidMetric("nose tip level with chin".into()));
        }
        Ok((tip - top) / span)
    }
}

impl FeatureSource for MeshFace {
    fn eye_metric(&self) -> Result<EyeMetric, DmsError> {
        Ok(EyeMetric::AspectRatio {
            left: self.aspect_ratio(&IMAGE_RIGHT_EYE)?,
            right: self.aspect_ratio(&IMAGE_LEFT_EYE)?,
        })
    }

    fn mouth_metric(&self) -> Result<MouthMetric, DmsError> {
        Ok(MouthMetric::AspectRatio {
            ratio: self.aspect_ratio(&MOUTH)?,
        })
    }

    fn head_position(&self) -> Result<HeadPosition, DmsError> {
        let limits = &self.head_limits;
        let offset_x = self.bounding_box_center_x - self.point(NOSE_TIP_CENTER)?.x;

        Ok(if self.pitch_ratio()? > limits.max_pitch_ratio_down {
            HeadPosition::ExtremeDown
        } else if self.point(CHIN)?.z < limits.max_chin_depth_up {
            HeadPosition::ExtremeUp
        } else if offset_x < limits.max_offset_left {
            HeadPosition::ExtremeLeft
        } else if offset_x > limits.max_offset_right {
            HeadPosition::ExtremeRight
        } else {
            HeadPosition::Front
        })
    }

    fn eyes_delta(&self) -> Result<(f64, f64), DmsError> {
        let left = self.point(IMAGE_LEFT_EYE[0])?;
        let right = self.point(IMAGE_RIGHT_EYE[0])?;
        Ok(((left.x - right.x).abs(), (left.y - right.y).abs()))
    }

    fn bounding_box_center_x(&self) -> f64 {
        self.bounding_box_center_x
    }
}
