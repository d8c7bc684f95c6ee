//! Per-feature driver states and the risk flag

use serde::{Deserialize, Serialize};
use std::fmt;

/// Eyes state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyesState {
    #[default]
    Normal,
    Drowsiness,
    RepeatedDrowsiness,
    MicroSleep,
    Sleep,
    Undetectable,
}

impl EyesState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Drowsiness => "drowsiness",
            Self::RepeatedDrowsiness => "repeated_drowsiness",
            Self::MicroSleep => "micro_sleep",
            Self::Sleep => "sleep",
            Self::Undetectable => "undetectable",
        }
    }
}

/// Mouth state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouthState {
    #[default]
    NoYawn,
    Yawn,
    RepeatedYawn,
    Undetectable,
}

impl MouthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoYawn => "no_yawn",
            Self::Yawn => "yawn",
            Self::RepeatedYawn => "repeated_yawn",
            Self::Undetectable => "undetectable",
        }
    }
}

/// Head state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadState {
    #[default]
    Normal,
    Fall,
    QuickFall,
    RepeatedQuickFall,
    Undetectable,
}

impl HeadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fall => "fall",
            Self::QuickFall => "quick_fall",
            Self::RepeatedQuickFall => "repeated_quick_fall",
            Self::Undetectable => "undetectable",
        }
    }

    /// Head is upright or only briefly dropped
    pub fn is_upright_or_quick(&self) -> bool {
        matches!(self, Self::Normal | Self::QuickFall)
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(EyesState, MouthState, HeadState, RiskFlag);

/// Drowsiness risk flag.
///
/// Declaration order is severity order, so `Undetectable < Green < Yellow < Red`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    Undetectable,
    Green,
    Yellow,
    Red,
}

impl RiskFlag {
    /// Numeric code reported to host applications
    pub fn code(&self) -> i8 {
        match self {
            Self::Undetectable => -1,
            Self::Green => 0,
            Self::Yellow => 1,
            Self::Red => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undetectable => "undetectable",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }

    /// Yellow or red
    pub fn is_risk(&self) -> bool {
        matches!(self, Self::Yellow | Self::Red)
    }
}

/// The three feature states computed for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureStates {
    pub eyes: EyesState,
    pub mouth: MouthState,
    pub head: HeadState,
}

impl FeatureStates {
    pub fn new(eyes: EyesState, mouth: MouthState, head: HeadState) -> Self {
        Self { eyes, mouth, head }
    }

    /// States substituted when perception produced no face for the frame
    pub fn undetectable() -> Self {
        Self::new(
            EyesState::Undetectable,
            MouthState::Undetectable,
            HeadState::Undetectable,
        )
    }
}
