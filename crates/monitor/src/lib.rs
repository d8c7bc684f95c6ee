//! Drowsiness Monitor
//!
//! Runs the detection pipeline for one driver session: threshold
//! adaptation, feature classification, flag normalization and gating,
//! fed either from a recorded frame file or a live frame stream.

pub mod jsonl;
pub mod runner;
pub mod session;
pub mod settings;

pub use jsonl::{FrameRecord, JsonLinesSink};
pub use runner::run_session;
pub use session::{DetectorSession, FrameInput};
pub use settings::MonitorSettings;

use alerting::SinkError;
use dms::DmsError;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid detection setup: {0}")]
    Detection(#[from] DmsError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Initialize logging to stderr. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str, json: bool) -> Result<(), MonitorError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| MonitorError::Logging(e.to_string()))
}
