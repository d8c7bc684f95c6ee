use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dms::{
    normalize, DetectionConfig, EyeMetric, FeatureSample, FeatureTracker, HeadPosition,
    MouthMetric, RepeatedEventMemory, ThresholdSet,
};

fn frame(timestamp_ms: u64) -> FeatureSample {
    // Slow blink cycle with an occasional head drop
    let closed = (timestamp_ms / 700) % 3 == 0;
    let openness = if closed { 0.02 } else { 0.85 };
    FeatureSample {
        eye: EyeMetric::OpenProbability {
            left: Some(openness),
            right: Some(openness),
        },
        mouth: MouthMetric::AspectRatio { ratio: 0.35 },
        head_position: if (timestamp_ms / 5000) % 4 == 0 {
            HeadPosition::ExtremeDown
        } else {
            HeadPosition::Front
        },
        illuminance_lux: 40,
        timestamp_ms,
    }
}

fn bench_frame_pipeline(c: &mut Criterion) {
    let config = DetectionConfig::default();
    let frames: Vec<FeatureSample> = (0..1200).map(|i| frame(i * 33)).collect();

    c.bench_function("classify_and_normalize_40s", |b| {
        b.iter(|| {
            let mut tracker = FeatureTracker::new(&config, 0);
            let mut repeats = RepeatedEventMemory::new(config.repeated_event_window_ms);
            for sample in &frames {
                let now = sample.timestamp_ms;
                let thresholds =
                    ThresholdSet::adapt(sample.head_position, sample.illuminance_lux, &config.thresholds);
                let states = tracker.track(sample, &thresholds, now);
                let recent = repeats.observe(&states, now);
                black_box(normalize(&states, recent));
            }
        })
    });
}

criterion_group!(benches, bench_frame_pipeline);
criterion_main!(benches);
