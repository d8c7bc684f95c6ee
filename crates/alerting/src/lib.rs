//! Alerting System
//!
//! Decides when a computed risk flag is actually reported: debouncing of
//! repeated flags, red/yellow hold timers, and the sinks that receive
//! emissions.

mod gate;
mod sink;
mod timer;

pub use gate::{Emission, FlagGate, GateConfig};
pub use sink::{FlagSink, SinkError};
pub use timer::HoldTimer;
