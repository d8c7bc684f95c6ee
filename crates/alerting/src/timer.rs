//! Single-shot cancellable hold timer on the frame clock

/// At most one outstanding deadline; restarting always replaces it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldTimer {
    deadline: Option<u64>,
}

impl HoldTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending deadline and arm a fresh one
    pub fn restart(&mut self, now: u64, duration_ms: u64) {
        self.deadline = Some(now.saturating_add(duration_ms));
    }

    /// Arm only when idle. Returns whether the timer was started.
    pub fn start_if_idle(&mut self, now: u64, duration_ms: u64) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.restart(now, duration_ms);
        true
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Deadline reached at `now`
    pub fn is_due(&self, now: u64) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }
}
