//! Flag gate: debounce and hold-timer discipline for risk flags

use dms::{DmsError, FlagDecision, RiskFlag};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::timer::HoldTimer;

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Hold after a red emission before red may be re-announced (ms)
    pub red_hold_ms: u64,
    /// Hold after a yellow emission (ms)
    pub yellow_hold_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            red_hold_ms: 5000,
            yellow_hold_ms: 2000,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), DmsError> {
        if self.red_hold_ms == 0 || self.yellow_hold_ms == 0 {
            return Err(DmsError::Config(format!(
                "hold durations must be non-zero (red {} ms, yellow {} ms)",
                self.red_hold_ms, self.yellow_hold_ms
            )));
        }
        Ok(())
    }
}

/// A reported flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emission {
    pub flag: RiskFlag,
    /// Numeric flag for consumers of the -1..2 scale
    pub code: i8,
    /// `eyes | mouth | head`
    pub trace: String,
    pub timestamp_ms: u64,
}

impl Emission {
    pub fn new(flag: RiskFlag, trace: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            flag,
            code: flag.code(),
            trace: trace.into(),
            timestamp_ms,
        }
    }
}

/// Decides which computed flags reach the sink
#[derive(Debug, Clone)]
pub struct FlagGate {
    config: GateConfig,
    last_processed: RiskFlag,
    tracking: RiskFlag,
    is_tracking: bool,
    /// One more emission allowed after a single-frame event
    pending_reannounce: bool,
    timer: HoldTimer,
}

impl FlagGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            last_processed: RiskFlag::Undetectable,
            tracking: RiskFlag::Undetectable,
            is_tracking: false,
            pending_reannounce: false,
            timer: HoldTimer::new(),
        }
    }

    /// Feed one normalized frame. Returns the emission, if any.
    ///
    /// A due hold timer must be fired with [`FlagGate::poll_timer`] first.
    pub fn process(&mut self, decision: &FlagDecision, now: u64) -> Option<Emission> {
        let flag = decision.flag;
        let markers = decision.trace.markers();
        let changed = flag != self.last_processed || flag.is_risk() || markers.any();

        if !changed && !self.pending_reannounce {
            return None;
        }
        self.pending_reannounce = false;

        // Escalation while a lower flag is held
        if self.is_tracking && self.tracking < flag {
            debug!(from = %self.tracking, to = %flag, "Escalating tracked flag");
            self.tracking = flag;
            self.is_tracking = false;
        }

        if self.is_tracking {
            return None;
        }

        self.is_tracking = true;
        self.tracking = flag;
        let emission = Emission::new(flag, decision.trace.to_string(), now);
        info!(flag = %flag, trace = %emission.trace, now, "Risk flag emitted");
        metrics::counter!("dms_flag_emissions_total", "flag" => flag.as_str()).increment(1);

        self.update_timer(now);
        if markers.any() {
            self.pending_reannounce = true;
        }
        Some(emission)
    }

    fn update_timer(&mut self, now: u64) {
        match self.tracking {
            RiskFlag::Red => self.timer.restart(now, self.config.red_hold_ms),
            RiskFlag::Yellow => {
                self.timer.start_if_idle(now, self.config.yellow_hold_ms);
            }
            RiskFlag::Green | RiskFlag::Undetectable => {
                self.timer.cancel();
                self.is_tracking = false;
                self.last_processed = self.tracking;
            }
        }
    }

    /// Hold timer expiry
    pub fn on_timer_expired(&mut self) {
        debug!(flag = %self.tracking, "Hold expired");
        self.is_tracking = false;
        self.last_processed = self.tracking;
        self.timer.cancel();
    }

    /// Fire the hold timer if due at `now`. Returns whether it fired.
    pub fn poll_timer(&mut self, now: u64) -> bool {
        if self.timer.is_due(now) {
            self.on_timer_expired();
            true
        } else {
            false
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timer.deadline()
    }

    pub fn is_tracking(&self) -> bool {
        self.is_tracking
    }

    pub fn last_processed(&self) -> RiskFlag {
        self.last_processed
    }

    /// Cancel the hold timer and forget all tracking
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
