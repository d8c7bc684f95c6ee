use proptest::prelude::*;

use dms::{
    normalize, DetectionConfig, EyeMetric, EyesState, FeatureSample, FeatureStates, FeatureTracker,
    HeadPosition, HeadState, MouthMetric, MouthState, RecentEvents, RiskFlag, ThresholdSet,
};

fn eyes_state() -> impl Strategy<Value = EyesState> {
    prop::sample::select(vec![
        EyesState::Normal,
        EyesState::Drowsiness,
        EyesState::RepeatedDrowsiness,
        EyesState::MicroSleep,
        EyesState::Sleep,
        EyesState::Undetectable,
    ])
}

fn mouth_state() -> impl Strategy<Value = MouthState> {
    prop::sample::select(vec![
        MouthState::NoYawn,
        MouthState::Yawn,
        MouthState::RepeatedYawn,
        MouthState::Undetectable,
    ])
}

fn head_position() -> impl Strategy<Value = HeadPosition> {
    prop::sample::select(vec![
        HeadPosition::Front,
        HeadPosition::SoftDown,
        HeadPosition::ExtremeDown,
        HeadPosition::ExtremeUp,
        HeadPosition::ExtremeLeft,
    ])
}

fn recent_events() -> impl Strategy<Value = RecentEvents> {
    (any::<bool>(), any::<bool>()).prop_map(|(repeated_yawn, repeated_quick_fall)| RecentEvents {
        repeated_yawn,
        repeated_quick_fall,
    })
}

/// One frame: (eyes closed, yawning, head position, frame gap ms)
fn frames() -> impl Strategy<Value = Vec<(bool, bool, HeadPosition, u64)>> {
    prop::collection::vec((any::<bool>(), any::<bool>(), head_position(), 1_u64..400), 1..120)
}

fn sample(eyes_closed: bool, yawning: bool, head_position: HeadPosition, timestamp_ms: u64) -> FeatureSample {
    let openness = if eyes_closed { 0.01 } else { 0.8 };
    FeatureSample {
        eye: EyeMetric::OpenProbability {
            left: Some(openness),
            right: Some(openness),
        },
        mouth: MouthMetric::AspectRatio {
            ratio: if yawning { 0.8 } else { 0.3 },
        },
        head_position,
        illuminance_lux: 120,
        timestamp_ms,
    }
}

fn replay(tracker: &mut FeatureTracker, config: &DetectionConfig, frames: &[(bool, bool, HeadPosition, u64)]) -> Vec<FeatureStates> {
    let mut now = 0;
    frames
        .iter()
        .map(|&(closed, yawning, head, gap)| {
            now += gap;
            let frame = sample(closed, yawning, head, now);
            let thresholds = ThresholdSet::adapt(head, frame.illuminance_lux, &config.thresholds);
            tracker.track(&frame, &thresholds, now)
        })
        .collect()
}

proptest! {
    #[test]
    fn pt_tracker_is_deterministic_after_reset(frames in frames()) {
        let config = DetectionConfig::default();
        let mut tracker = FeatureTracker::new(&config, 0);

        let first = replay(&mut tracker, &config, &frames);
        tracker.reset(0);
        let second = replay(&mut tracker, &config, &frames);

        prop_assert_eq!(first, second);
    }

    #[test]
    fn pt_head_undetectable_always_wins(
        eyes in eyes_state(),
        mouth in mouth_state(),
        recent in recent_events(),
    ) {
        let states = FeatureStates::new(eyes, mouth, HeadState::Undetectable);
        prop_assert_eq!(normalize(&states, recent).flag, RiskFlag::Undetectable);
    }

    #[test]
    fn pt_head_fall_is_red_while_face_visible(
        eyes in eyes_state(),
        mouth in mouth_state(),
        recent in recent_events(),
    ) {
        prop_assume!(!(eyes == EyesState::Undetectable && mouth == MouthState::Undetectable));
        let states = FeatureStates::new(eyes, mouth, HeadState::Fall);
        prop_assert_eq!(normalize(&states, recent).flag, RiskFlag::Red);
    }

    #[test]
    fn pt_recent_events_never_lower_the_flag(
        eyes in eyes_state(),
        mouth in mouth_state(),
        head in prop::sample::select(vec![
            HeadState::Normal,
            HeadState::Fall,
            HeadState::QuickFall,
            HeadState::RepeatedQuickFall,
        ]),
        recent in recent_events(),
    ) {
        let states = FeatureStates::new(eyes, mouth, head);
        let without = normalize(&states, RecentEvents::default()).flag;
        let with = normalize(&states, recent).flag;
        prop_assert!(with >= without);
    }

    #[test]
    fn pt_trace_has_three_snake_case_fields(
        eyes in eyes_state(),
        mouth in mouth_state(),
        recent in recent_events(),
    ) {
        let trace = normalize(&FeatureStates::new(eyes, mouth, HeadState::Normal), recent)
            .trace
            .to_string();
        let fields: Vec<&str> = trace.split(" | ").collect();
        prop_assert_eq!(fields.len(), 3);
        for field in fields {
            prop_assert!(field.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
