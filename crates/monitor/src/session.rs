//! Detector session: one driver's frame pipeline from features to emissions

use alerting::{Emission, FlagGate, FlagSink, GateConfig};
use dms::{
    normalize, select_driver_face, DetectionConfig, FaceParameters, FeatureSample, FeatureSource,
    FeatureStates, FeatureTracker, RepeatedEventMemory, ThresholdSet,
};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::MonitorError;

/// One frame handed to the session
#[derive(Debug, Clone, PartialEq)]
pub enum FrameInput {
    /// Pre-extracted features
    Sample(FeatureSample),
    /// Features of the driver's face together with its measurements
    Face {
        sample: FeatureSample,
        parameters: FaceParameters,
    },
    /// Perception produced no usable face for this frame
    PerceptionFailed { timestamp_ms: u64 },
}

impl FrameInput {
    /// Extract features from a perception backend, substituting a failure
    /// frame when the backend cannot produce them
    pub fn capture(source: &dyn FeatureSource, illuminance_lux: i32, timestamp_ms: u64) -> Self {
        let captured = FeatureSample::from_source(source, illuminance_lux, timestamp_ms)
            .and_then(|sample| {
                let parameters = FaceParameters::from_source(source, illuminance_lux, timestamp_ms)?;
                Ok(Self::Face { sample, parameters })
            });
        match captured {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, timestamp_ms, "Perception backend failed");
                Self::PerceptionFailed { timestamp_ms }
            }
        }
    }

    /// Select the driver among all faces detected in one frame and capture it
    pub fn capture_driver<F: FeatureSource>(
        faces: &[F],
        detection: &DetectionConfig,
        illuminance_lux: i32,
        timestamp_ms: u64,
    ) -> Self {
        match select_driver_face(faces, detection.wheel_position, &detection.driver_face) {
            Some(face) => Self::capture(face, illuminance_lux, timestamp_ms),
            None => {
                debug!(faces = faces.len(), timestamp_ms, "No driver face in frame");
                Self::PerceptionFailed { timestamp_ms }
            }
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Sample(sample) | Self::Face { sample, .. } => sample.timestamp_ms,
            Self::PerceptionFailed { timestamp_ms } => *timestamp_ms,
        }
    }
}

/// Classifier, normalizer and gate state for one driver session
#[derive(Debug)]
pub struct DetectorSession {
    id: Uuid,
    detection: DetectionConfig,
    tracker: FeatureTracker,
    repeats: RepeatedEventMemory,
    gate: FlagGate,
    running: bool,
    last_timestamp: Option<u64>,
    frames_processed: u64,
}

impl DetectorSession {
    /// Create a stopped session. Configuration is fixed for its lifetime.
    pub fn new(detection: DetectionConfig, gate: GateConfig) -> Result<Self, MonitorError> {
        detection.validate()?;
        gate.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            tracker: FeatureTracker::new(&detection, 0),
            repeats: RepeatedEventMemory::new(detection.repeated_event_window_ms),
            gate: FlagGate::new(gate),
            detection,
            running: false,
            last_timestamp: None,
            frames_processed: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn detection(&self) -> &DetectionConfig {
        &self.detection
    }

    /// Reset all memory and begin accepting frames
    pub fn start(&mut self, now: u64) {
        self.reset(now);
        self.running = true;
        info!(session_id = %self.id, now, "Detection started");
    }

    /// Cancel the hold timer, reset all memory and ignore further frames
    pub fn stop(&mut self) {
        self.reset(self.last_timestamp.unwrap_or(0));
        self.running = false;
        info!(
            session_id = %self.id,
            frames = self.frames_processed,
            "Detection stopped"
        );
    }

    fn reset(&mut self, now: u64) {
        self.tracker.reset(now);
        self.repeats.reset();
        self.gate.reset();
        self.last_timestamp = None;
    }

    /// Logical deadline of the pending hold timer
    pub fn next_deadline(&self) -> Option<u64> {
        self.gate.next_deadline()
    }

    /// Fire the hold timer out of band (scheduler-driven expiry)
    pub fn expire_hold(&mut self) {
        if self.running && self.gate.next_deadline().is_some() {
            self.gate.on_timer_expired();
        }
    }

    /// Run one frame through the pipeline.
    ///
    /// Forwards the driver's face measurements, then at most one emission, to
    /// `sink`. A sink failure is logged and the emission still counts as delivered.
    pub fn process_frame<S: FlagSink + ?Sized>(
        &mut self,
        frame: FrameInput,
        sink: &mut S,
    ) -> Option<Emission> {
        if !self.running {
            debug!(session_id = %self.id, "Frame ignored: detection stopped");
            return None;
        }

        let span = info_span!("frame", session_id = %self.id);
        let _enter = span.enter();

        let mut now = frame.timestamp_ms();
        match self.last_timestamp {
            Some(last) if now < last => {
                warn!(timestamp_ms = now, last, "Out-of-order frame, clamping timestamp");
                now = last;
            }
            _ => {}
        }
        self.last_timestamp = Some(now);

        self.gate.poll_timer(now);

        let sample = match frame {
            FrameInput::Sample(sample) => Some(sample),
            FrameInput::Face { sample, parameters } => {
                if let Err(e) = sink.report_face(&parameters) {
                    warn!(error = %e, "Sink failed to accept face parameters");
                    metrics::counter!("dms_sink_failures_total").increment(1);
                }
                Some(sample)
            }
            FrameInput::PerceptionFailed { .. } => None,
        };

        let states = match sample {
            Some(sample) => {
                let thresholds = ThresholdSet::adapt(
                    sample.head_position,
                    sample.illuminance_lux,
                    &self.detection.thresholds,
                );
                self.tracker.track(&sample, &thresholds, now)
            }
            None => {
                metrics::counter!("dms_perception_failures_total").increment(1);
                FeatureStates::undetectable()
            }
        };

        let recent = self.repeats.observe(&states, now);
        let decision = normalize(&states, recent);
        self.frames_processed += 1;
        metrics::counter!("dms_frames_processed_total").increment(1);

        let emission = self.gate.process(&decision, now)?;
        if let Err(e) = sink.emit(&emission) {
            warn!(error = %e, flag = %emission.flag, "Sink failed to accept emission");
            metrics::counter!("dms_sink_failures_total").increment(1);
        }
        Some(emission)
    }
}
