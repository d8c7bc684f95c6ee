//! JSON-lines frame records and emission output

use std::io::Write;

use alerting::{Emission, FlagSink, SinkError};
use dms::{BasicFace, DetectionConfig, FaceParameters, FeatureSample, MeshFace};
use serde::{Deserialize, Serialize};

use crate::session::FrameInput;
use crate::MonitorError;

/// One line of a recorded or streamed frame feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameRecord {
    /// Pre-extracted feature metrics
    Sample(FeatureSample),
    /// Every face the basic model found in the frame
    BasicFace {
        faces: Vec<BasicFace>,
        illuminance_lux: i32,
        timestamp_ms: u64,
    },
    MeshFace {
        faces: Vec<MeshFace>,
        illuminance_lux: i32,
        timestamp_ms: u64,
    },
    /// No face found in the frame
    NoFace { timestamp_ms: u64 },
}

impl FrameRecord {
    /// Parse one line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str, line_number: usize) -> Result<Option<Self>, MonitorError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        serde_json::from_str(line)
            .map(Some)
            .map_err(|source| MonitorError::Parse {
                line: line_number,
                source,
            })
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::Sample(sample) => sample.timestamp_ms,
            Self::BasicFace { timestamp_ms, .. }
            | Self::MeshFace { timestamp_ms, .. }
            | Self::NoFace { timestamp_ms } => *timestamp_ms,
        }
    }

    /// Convert to a session frame, picking the driver's face per `detection`
    pub fn into_input(self, detection: &DetectionConfig) -> FrameInput {
        match self {
            Self::Sample(sample) => FrameInput::Sample(sample),
            Self::BasicFace {
                faces,
                illuminance_lux,
                timestamp_ms,
            } => FrameInput::capture_driver(&faces, detection, illuminance_lux, timestamp_ms),
            Self::MeshFace {
                faces,
                illuminance_lux,
                timestamp_ms,
            } => FrameInput::capture_driver(&faces, detection, illuminance_lux, timestamp_ms),
            Self::NoFace { timestamp_ms } => FrameInput::PerceptionFailed { timestamp_ms },
        }
    }
}

/// One line of sink output
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OutputLine<'a> {
    Flag(&'a Emission),
    FaceParameters(&'a FaceParameters),
}

/// Writes each emission and face report as one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> JsonLinesSink<W> {
    fn write_line(&mut self, line: &OutputLine<'_>) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, line)
            .map_err(|e| SinkError::Rejected(e.to_string()))?;
        writeln!(self.writer)
            .and_then(|_| self.writer.flush())
            .map_err(|_| SinkError::Closed)
    }
}

impl<W: Write> FlagSink for JsonLinesSink<W> {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError> {
        self.write_line(&OutputLine::Flag(emission))
    }

    fn report_face(&mut self, parameters: &FaceParameters) -> Result<(), SinkError> {
        self.write_line(&OutputLine::FaceParameters(parameters))
    }
}
