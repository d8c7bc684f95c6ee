//! Flag normalization: joint feature states to a risk flag and trace

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{EyesState, FeatureStates, HeadState, MouthState, RiskFlag};

/// Rolling memory of when repeated yawns and repeated quick falls last occurred
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatedEventMemory {
    last_repeated_yawn_at: Option<u64>,
    last_repeated_quick_fall_at: Option<u64>,
    window_ms: u64,
}

/// Whether each repeated event was seen inside the memory window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecentEvents {
    pub repeated_yawn: bool,
    pub repeated_quick_fall: bool,
}

impl RepeatedEventMemory {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            ..Default::default()
        }
    }

    /// Refresh with the current states and report what is still recent
    pub fn observe(&mut self, states: &FeatureStates, now: u64) -> RecentEvents {
        if states.mouth == MouthState::RepeatedYawn {
            self.last_repeated_yawn_at = Some(now);
        }
        if states.head == HeadState::RepeatedQuickFall {
            self.last_repeated_quick_fall_at = Some(now);
        }

        let recent = |at: Option<u64>| at.is_some_and(|t| now.saturating_sub(t) <= self.window_ms);
        RecentEvents {
            repeated_yawn: recent(self.last_repeated_yawn_at),
            repeated_quick_fall: recent(self.last_repeated_quick_fall_at),
        }
    }

    pub fn reset(&mut self) {
        self.last_repeated_yawn_at = None;
        self.last_repeated_quick_fall_at = None;
    }
}

/// Human-readable `eyes | mouth | head` trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace(pub FeatureStates);

/// Single-frame events that allow a repeated flag to be re-announced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceMarkers {
    pub yawn: bool,
    pub quick_fall: bool,
    pub undetectable_eyes: bool,
}

impl TraceMarkers {
    pub fn any(&self) -> bool {
        self.yawn || self.quick_fall || self.undetectable_eyes
    }
}

impl Trace {
    pub fn markers(&self) -> TraceMarkers {
        let FeatureStates { eyes, mouth, head } = self.0;
        TraceMarkers {
            yawn: mouth == MouthState::Yawn,
            quick_fall: head == HeadState::QuickFall,
            undetectable_eyes: eyes == EyesState::Undetectable,
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.0.eyes, self.0.mouth, self.0.head)
    }
}

/// Flag and trace produced for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagDecision {
    pub flag: RiskFlag,
    pub trace: Trace,
}

/// Rewrite the trace so compound conditions driving the flag are visible
fn display_states(states: &FeatureStates, recent: RecentEvents) -> FeatureStates {
    let FeatureStates { eyes, mouth, head } = *states;

    if (recent.repeated_yawn && head == HeadState::RepeatedQuickFall)
        || (recent.repeated_quick_fall && mouth == MouthState::RepeatedYawn)
    {
        FeatureStates::new(eyes, MouthState::RepeatedYawn, HeadState::RepeatedQuickFall)
    } else if recent.repeated_yawn && eyes == EyesState::Drowsiness && head.is_upright_or_quick() {
        FeatureStates::new(EyesState::Drowsiness, MouthState::RepeatedYawn, head)
    } else if recent.repeated_quick_fall
        && eyes == EyesState::Drowsiness
        && head.is_upright_or_quick()
    {
        FeatureStates::new(EyesState::Drowsiness, mouth, HeadState::RepeatedQuickFall)
    } else {
        *states
    }
}

fn is_undetectable(states: &FeatureStates) -> bool {
    let FeatureStates { eyes, mouth, head } = *states;
    head == HeadState::Undetectable
        || (eyes == EyesState::Undetectable && mouth == MouthState::Undetectable)
}

fn is_red(states: &FeatureStates, recent: RecentEvents) -> bool {
    use EyesState as E;
    use HeadState as H;
    use MouthState as M;
    let FeatureStates { eyes, mouth, head } = *states;
    let eyes_quiet = matches!(eyes, E::Normal | E::Undetectable);

    head == H::Fall
        || matches!(eyes, E::MicroSleep | E::Sleep | E::RepeatedDrowsiness)
        || (eyes == E::Drowsiness && head == H::RepeatedQuickFall)
        || (eyes_quiet && head == H::RepeatedQuickFall && mouth == M::RepeatedYawn)
        || (recent.repeated_yawn && head == H::RepeatedQuickFall)
        || (recent.repeated_quick_fall && mouth == M::RepeatedYawn)
        || ((recent.repeated_yawn || recent.repeated_quick_fall)
            && eyes == E::Drowsiness
            && head.is_upright_or_quick())
}

fn is_yellow(states: &FeatureStates) -> bool {
    use EyesState as E;
    use HeadState as H;
    use MouthState as M;
    let FeatureStates { eyes, mouth, head } = *states;
    let eyes_quiet = matches!(eyes, E::Normal | E::Undetectable);

    (eyes == E::Drowsiness
        && head.is_upright_or_quick()
        && matches!(mouth, M::Yawn | M::NoYawn | M::Undetectable))
        || (eyes_quiet && head == H::RepeatedQuickFall && matches!(mouth, M::Yawn | M::NoYawn))
        || (eyes == E::Normal
            && head == H::RepeatedQuickFall
            && matches!(mouth, M::Yawn | M::NoYawn | M::Undetectable))
        || (eyes_quiet && head.is_upright_or_quick() && mouth == M::RepeatedYawn)
}

/// Map joint feature states to a risk flag; first matching rule wins
pub fn normalize(states: &FeatureStates, recent: RecentEvents) -> FlagDecision {
    let flag = if is_undetectable(states) {
        RiskFlag::Undetectable
    } else if is_red(states, recent) {
        RiskFlag::Red
    } else if is_yellow(states) {
        RiskFlag::Yellow
    } else {
        RiskFlag::Green
    };

    FlagDecision {
        flag,
        trace: Trace(display_states(states, recent)),
    }
}
