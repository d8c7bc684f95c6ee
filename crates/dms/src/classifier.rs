//! Duration-windowed feature state machines
//!
//! Every classifier follows the same pattern:
//! binary position -> continuous time in the risk position -> duration bucket
//! -> repeated-event check. Timing memory lives in a per-feature memory
//! struct owned by the caller; the classifiers themselves hold only config.

use tracing::debug;

use crate::config::{DetectionConfig, TimingConfig};
use crate::sample::FeatureSample;
use crate::state::{EyesState, FeatureStates, HeadState, MouthState};
use crate::thresholds::ThresholdSet;

/// Milliseconds since `since`, or `u64::MAX` when the event never happened
fn elapsed_since(now: u64, since: Option<u64>) -> u64 {
    since.map_or(u64::MAX, |t| now.saturating_sub(t))
}

/// A time-windowed classifier for one facial feature
pub trait FeatureClassifier {
    type State;
    type Memory;

    /// Classify one frame, updating `memory` in place
    fn classify(
        &self,
        sample: &FeatureSample,
        thresholds: &ThresholdSet,
        memory: &mut Self::Memory,
        now: u64,
    ) -> Self::State;
}

/// Eyes open or closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EyesPosition {
    #[default]
    Open,
    Closed,
}

/// Eyes timing memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EyesMemory {
    pub last_position: EyesPosition,
    /// When the current closure started
    pub closed_since: u64,
    /// Last time a short (blink) closure was seen
    pub last_blink_at: u64,
    pub last_drowsiness_at: Option<u64>,
}

impl EyesMemory {
    pub fn new(now: u64) -> Self {
        Self {
            last_position: EyesPosition::Open,
            closed_since: 0,
            last_blink_at: now,
            last_drowsiness_at: None,
        }
    }
}

/// Eyes classifier
#[derive(Debug, Clone)]
pub struct EyesClassifier {
    timing: TimingConfig,
    repeat_window_ms: u64,
}

impl EyesClassifier {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            timing: config.timing.clone(),
            repeat_window_ms: config.repeated_event_window_ms,
        }
    }
}

impl FeatureClassifier for EyesClassifier {
    type State = EyesState;
    type Memory = EyesMemory;

    fn classify(
        &self,
        sample: &FeatureSample,
        thresholds: &ThresholdSet,
        memory: &mut EyesMemory,
        now: u64,
    ) -> EyesState {
        let t = &self.timing;

        if !thresholds.eyes_closed(&sample.eye) {
            memory.last_position = EyesPosition::Open;
            if now.saturating_sub(memory.last_blink_at) >= t.blink_timeout_ms {
                return EyesState::Undetectable;
            }
            return EyesState::Normal;
        }

        if memory.last_position == EyesPosition::Open {
            memory.closed_since = now;
            memory.last_position = EyesPosition::Closed;
        }

        let closed_ms = now.saturating_sub(memory.closed_since);
        if closed_ms < t.blink_max_ms {
            memory.last_blink_at = now;
            EyesState::Normal
        } else if closed_ms <= t.drowsiness_max_ms {
            let since_last = elapsed_since(now, memory.last_drowsiness_at);
            if since_last < t.repeated_drowsiness_min_gap_ms {
                EyesState::Drowsiness
            } else if since_last <= self.repeat_window_ms {
                memory.last_drowsiness_at = Some(now);
                EyesState::RepeatedDrowsiness
            } else {
                memory.last_drowsiness_at = Some(now);
                EyesState::Drowsiness
            }
        } else if closed_ms <= t.micro_sleep_max_ms {
            EyesState::MicroSleep
        } else {
            EyesState::Sleep
        }
    }
}

/// Mouth yawning or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouthPosition {
    #[default]
    NotYawning,
    Yawning,
}

/// Mouth timing memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MouthMemory {
    pub last_position: MouthPosition,
    /// When the current opening started
    pub open_since: u64,
    pub last_yawn_at: Option<u64>,
}

/// Mouth classifier
#[derive(Debug, Clone)]
pub struct MouthClassifier {
    timing: TimingConfig,
    repeat_window_ms: u64,
}

impl MouthClassifier {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            timing: config.timing.clone(),
            repeat_window_ms: config.repeated_event_window_ms,
        }
    }
}

impl FeatureClassifier for MouthClassifier {
    type State = MouthState;
    type Memory = MouthMemory;

    fn classify(
        &self,
        sample: &FeatureSample,
        thresholds: &ThresholdSet,
        memory: &mut MouthMemory,
        now: u64,
    ) -> MouthState {
        let t = &self.timing;

        if !thresholds.mouth_yawning(&sample.mouth) {
            memory.last_position = MouthPosition::NotYawning;
            return MouthState::NoYawn;
        }

        if memory.last_position == MouthPosition::NotYawning {
            memory.open_since = now;
            memory.last_position = MouthPosition::Yawning;
        }

        if now.saturating_sub(memory.open_since) < t.yawn_min_ms {
            return MouthState::NoYawn;
        }

        let since_last = elapsed_since(now, memory.last_yawn_at);
        if since_last <= t.yawn_refractory_ms {
            MouthState::Yawn
        } else if since_last < self.repeat_window_ms {
            memory.last_yawn_at = Some(now);
            MouthState::RepeatedYawn
        } else {
            memory.last_yawn_at = Some(now);
            MouthState::Yawn
        }
    }
}

/// Head upright or fallen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadPose {
    #[default]
    Front,
    Fallen,
}

/// Head timing memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadMemory {
    pub last_position: HeadPose,
    /// When the current fall started
    pub fallen_since: u64,
    pub last_quick_fall_at: Option<u64>,
}

/// Head classifier
#[derive(Debug, Clone)]
pub struct HeadClassifier {
    timing: TimingConfig,
    repeat_window_ms: u64,
}

impl HeadClassifier {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            timing: config.timing.clone(),
            repeat_window_ms: config.repeated_event_window_ms,
        }
    }
}

impl FeatureClassifier for HeadClassifier {
    type State = HeadState;
    type Memory = HeadMemory;

    fn classify(
        &self,
        sample: &FeatureSample,
        _thresholds: &ThresholdSet,
        memory: &mut HeadMemory,
        now: u64,
    ) -> HeadState {
        let t = &self.timing;

        if !sample.head_position.is_fallen() {
            memory.last_position = HeadPose::Front;
            return HeadState::Normal;
        }

        if memory.last_position == HeadPose::Front {
            memory.fallen_since = now;
            memory.last_position = HeadPose::Fallen;
        }

        let fallen_ms = now.saturating_sub(memory.fallen_since);
        if fallen_ms < t.quick_fall_min_ms {
            HeadState::Normal
        } else if fallen_ms < t.fall_min_ms {
            let since_last = elapsed_since(now, memory.last_quick_fall_at);
            if since_last < t.quick_fall_refractory_ms {
                HeadState::QuickFall
            } else if since_last < self.repeat_window_ms {
                memory.last_quick_fall_at = Some(now);
                HeadState::RepeatedQuickFall
            } else {
                memory.last_quick_fall_at = Some(now);
                HeadState::QuickFall
            }
        } else {
            HeadState::Fall
        }
    }
}

/// The three classifiers together with their session memory
#[derive(Debug, Clone)]
pub struct FeatureTracker {
    eyes: EyesClassifier,
    mouth: MouthClassifier,
    head: HeadClassifier,
    eyes_memory: EyesMemory,
    mouth_memory: MouthMemory,
    head_memory: HeadMemory,
}

impl FeatureTracker {
    pub fn new(config: &DetectionConfig, now: u64) -> Self {
        Self {
            eyes: EyesClassifier::new(config),
            mouth: MouthClassifier::new(config),
            head: HeadClassifier::new(config),
            eyes_memory: EyesMemory::new(now),
            mouth_memory: MouthMemory::default(),
            head_memory: HeadMemory::default(),
        }
    }

    /// Classify all three features for one frame
    pub fn track(&mut self, sample: &FeatureSample, thresholds: &ThresholdSet, now: u64) -> FeatureStates {
        let states = FeatureStates {
            eyes: self.eyes.classify(sample, thresholds, &mut self.eyes_memory, now),
            mouth: self.mouth.classify(sample, thresholds, &mut self.mouth_memory, now),
            head: self.head.classify(sample, thresholds, &mut self.head_memory, now),
        };
        debug!(
            eyes = %states.eyes,
            mouth = %states.mouth,
            head = %states.head,
            now,
            "Feature states"
        );
        states
    }

    /// Reset every memory to its defaults (on start/stop)
    pub fn reset(&mut self, now: u64) {
        self.eyes_memory = EyesMemory::new(now);
        self.mouth_memory = MouthMemory::default();
        self.head_memory = HeadMemory::default();
    }

    pub fn eyes_memory(&self) -> &EyesMemory {
        &self.eyes_memory
    }

    pub fn mouth_memory(&self) -> &MouthMemory {
        &self.mouth_memory
    }

    pub fn head_memory(&self) -> &HeadMemory {
        &self.head_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;
    use crate::sample::{EyeMetric, MouthMetric};
    use crate::thresholds::HeadPosition;

    const FRAME_MS: u64 = 50;

    fn sample(eyes_closed: bool, yawning: bool, head: HeadPosition) -> FeatureSample {
        let openness = if eyes_closed { 0.0 } else { 0.9 };
        FeatureSample {
            eye: EyeMetric::OpenProbability {
                left: Some(openness),
                right: Some(openness),
            },
            mouth: MouthMetric::AspectRatio {
                ratio: if yawning { 0.9 } else { 0.2 },
            },
            head_position: head,
            illuminance_lux: 200,
            timestamp_ms: 0,
        }
    }

    fn thresholds() -> ThresholdSet {
        ThresholdSet::adapt(HeadPosition::Front, 200, &ThresholdConfig::default())
    }

    /// Feed frames from `start` to `end` inclusive and return the last state
    fn run<C: FeatureClassifier>(
        classifier: &C,
        memory: &mut C::Memory,
        frame: &FeatureSample,
        start: u64,
        end: u64,
    ) -> C::State {
        let thresholds = thresholds();
        let mut now = start;
        loop {
            let state = classifier.classify(frame, &thresholds, memory, now);
            if now >= end {
                return state;
            }
            now = (now + FRAME_MS).min(end);
        }
    }

    #[test]
    fn test_eyes_duration_buckets() {
        let config = DetectionConfig::default();
        let eyes = EyesClassifier::new(&config);
        let closed = sample(true, false, HeadPosition::Front);

        let mut memory = EyesMemory::new(0);
        assert_eq!(run(&eyes, &mut memory, &closed, 1000, 1499), EyesState::Normal);
        let mut memory = EyesMemory::new(0);
        assert_eq!(run(&eyes, &mut memory, &closed, 1000, 1600), EyesState::Drowsiness);
        let mut memory = EyesMemory::new(0);
        assert_eq!(run(&eyes, &mut memory, &closed, 1000, 2000), EyesState::MicroSleep);
        let mut memory = EyesMemory::new(0);
        assert_eq!(run(&eyes, &mut memory, &closed, 1000, 3999), EyesState::MicroSleep);
        let mut memory = EyesMemory::new(0);
        assert_eq!(run(&eyes, &mut memory, &closed, 1000, 4000), EyesState::Sleep);
    }

    #[test]
    fn test_eyes_repeated_drowsiness() {
        let config = DetectionConfig::default();
        let eyes = EyesClassifier::new(&config);
        let closed = sample(true, false, HeadPosition::Front);
        let open = sample(false, false, HeadPosition::Front);
        let th = thresholds();
        let mut memory = EyesMemory::new(0);

        // First closure: drowsiness stamped at 500 ms into it
        assert_eq!(run(&eyes, &mut memory, &closed, 0, 600), EyesState::Drowsiness);
        assert_eq!(memory.last_drowsiness_at, Some(500));
        assert_eq!(eyes.classify(&open, &th, &mut memory, 700), EyesState::Normal);

        // Second closure starts within 1000 ms of the first drowsiness stamp
        assert_eq!(run(&eyes, &mut memory, &closed, 950, 1550), EyesState::RepeatedDrowsiness);
        assert_eq!(memory.last_drowsiness_at, Some(1550));
    }

    #[test]
    fn test_eyes_drowsiness_close_to_previous_is_not_repeat() {
        let config = DetectionConfig::default();
        let eyes = EyesClassifier::new(&config);
        let th = thresholds();
        let closed = sample(true, false, HeadPosition::Front);
        let mut memory = EyesMemory::new(0);
        memory.last_drowsiness_at = Some(10_000);
        memory.last_position = EyesPosition::Closed;
        memory.closed_since = 10_000;

        // 600 ms closed, previous drowsiness 600 ms ago: no reset
        assert_eq!(eyes.classify(&closed, &th, &mut memory, 10_600), EyesState::Drowsiness);
        assert_eq!(memory.last_drowsiness_at, Some(10_000));
    }

    #[test]
    fn test_eyes_blink_timeout_is_undetectable() {
        let config = DetectionConfig::default();
        let eyes = EyesClassifier::new(&config);
        let th = thresholds();
        let open = sample(false, false, HeadPosition::Front);
        let closed = sample(true, false, HeadPosition::Front);
        let mut memory = EyesMemory::new(0);

        assert_eq!(eyes.classify(&open, &th, &mut memory, 29_999), EyesState::Normal);
        assert_eq!(eyes.classify(&open, &th, &mut memory, 30_000), EyesState::Undetectable);

        // A blink refreshes the signal
        assert_eq!(eyes.classify(&closed, &th, &mut memory, 30_100), EyesState::Normal);
        assert_eq!(eyes.classify(&open, &th, &mut memory, 30_200), EyesState::Normal);
    }

    #[test]
    fn test_mouth_yawn_and_repeat() {
        let config = DetectionConfig::default();
        let mouth = MouthClassifier::new(&config);
        let th = thresholds();
        let yawning = sample(false, true, HeadPosition::Front);
        let closed = sample(false, false, HeadPosition::Front);
        let mut memory = MouthMemory::default();

        assert_eq!(run(&mouth, &mut memory, &yawning, 0, 2400), MouthState::NoYawn);
        assert_eq!(run(&mouth, &mut memory, &yawning, 2450, 2600), MouthState::Yawn);
        assert_eq!(memory.last_yawn_at, Some(2500));
        assert_eq!(mouth.classify(&closed, &th, &mut memory, 2650), MouthState::NoYawn);

        // Second yawn ten seconds later is a repeat
        assert_eq!(run(&mouth, &mut memory, &yawning, 12_600, 15_100), MouthState::RepeatedYawn);
        assert_eq!(memory.last_yawn_at, Some(15_100));
    }

    #[test]
    fn test_mouth_yawn_inside_refractory_is_not_repeat() {
        let config = DetectionConfig::default();
        let mouth = MouthClassifier::new(&config);
        let th = thresholds();
        let yawning = sample(false, true, HeadPosition::Front);
        let mut memory = MouthMemory {
            last_position: MouthPosition::Yawning,
            open_since: 0,
            last_yawn_at: Some(1000),
        };
        assert_eq!(mouth.classify(&yawning, &th, &mut memory, 3000), MouthState::Yawn);
        assert_eq!(memory.last_yawn_at, Some(1000));
        assert_eq!(mouth.classify(&yawning, &th, &mut memory, 3500), MouthState::Yawn);
        assert_eq!(mouth.classify(&yawning, &th, &mut memory, 3501), MouthState::RepeatedYawn);
        assert_eq!(memory.last_yawn_at, Some(3501));
    }

    #[test]
    fn test_head_buckets() {
        let config = DetectionConfig::default();
        let head = HeadClassifier::new(&config);
        let th = thresholds();
        let down = sample(false, false, HeadPosition::ExtremeDown);

        let mut memory = HeadMemory::default();
        assert_eq!(head.classify(&down, &th, &mut memory, 5000), HeadState::Normal);
        assert_eq!(head.classify(&down, &th, &mut memory, 5999), HeadState::Normal);
        assert_eq!(head.classify(&down, &th, &mut memory, 6001), HeadState::QuickFall);
        assert_eq!(head.classify(&down, &th, &mut memory, 8000), HeadState::Fall);
    }

    #[test]
    fn test_head_repeated_quick_fall() {
        let config = DetectionConfig::default();
        let head = HeadClassifier::new(&config);
        let th = thresholds();
        let up = sample(false, false, HeadPosition::ExtremeUp);
        let front = sample(false, false, HeadPosition::Front);
        let mut memory = HeadMemory::default();

        assert_eq!(head.classify(&up, &th, &mut memory, 0), HeadState::Normal);
        assert_eq!(head.classify(&up, &th, &mut memory, 1100), HeadState::QuickFall);
        assert_eq!(head.classify(&up, &th, &mut memory, 1500), HeadState::QuickFall);
        assert_eq!(head.classify(&front, &th, &mut memory, 1600), HeadState::Normal);

        assert_eq!(head.classify(&up, &th, &mut memory, 10_000), HeadState::Normal);
        assert_eq!(head.classify(&up, &th, &mut memory, 11_100), HeadState::RepeatedQuickFall);
        assert_eq!(memory.last_quick_fall_at, Some(11_100));
    }

    #[test]
    fn test_soft_positions_are_not_fallen() {
        let config = DetectionConfig::default();
        let head = HeadClassifier::new(&config);
        let th = thresholds();
        let mut memory = HeadMemory::default();
        for now in (0..5000).step_by(100) {
            let frame = sample(false, false, HeadPosition::SoftDown);
            assert_eq!(head.classify(&frame, &th, &mut memory, now), HeadState::Normal);
        }
    }

    #[test]
    fn test_tracker_reset() {
        let config = DetectionConfig::default();
        let mut tracker = FeatureTracker::new(&config, 0);
        let th = thresholds();
        let frame = sample(true, true, HeadPosition::ExtremeDown);
        for now in (0..4000).step_by(100) {
            tracker.track(&frame, &th, now);
        }
        assert_eq!(tracker.eyes_memory().last_position, EyesPosition::Closed);
        assert!(tracker.mouth_memory().last_yawn_at.is_some());

        tracker.reset(9000);
        assert_eq!(tracker.eyes_memory(), &EyesMemory::new(9000));
        assert_eq!(tracker.mouth_memory(), &MouthMemory::default());
        assert_eq!(tracker.head_memory(), &HeadMemory::default());
    }
}
