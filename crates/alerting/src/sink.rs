//! Destinations for gate emissions

use dms::FaceParameters;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::gate::Emission;

/// Sink error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sink closed")]
    Closed,

    #[error("Emission rejected: {0}")]
    Rejected(String),
}

/// Receives at most one emission per processed frame
pub trait FlagSink {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError>;

    /// Face measurements of each frame with a detected driver; ignored by default
    fn report_face(&mut self, _parameters: &FaceParameters) -> Result<(), SinkError> {
        Ok(())
    }
}

impl FlagSink for Vec<Emission> {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError> {
        self.push(emission.clone());
        Ok(())
    }
}

impl FlagSink for mpsc::UnboundedSender<Emission> {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError> {
        self.send(emission.clone()).map_err(|_| SinkError::Closed)
    }
}

impl<S: FlagSink + ?Sized> FlagSink for &mut S {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError> {
        (**self).emit(emission)
    }

    fn report_face(&mut self, parameters: &FaceParameters) -> Result<(), SinkError> {
        (**self).report_face(parameters)
    }
}
