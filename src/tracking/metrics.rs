#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingMetrics {
    recorded: u64,
    failed: u64,
    suppressed: u64,
}

impl TrackingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.recorded += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// A duplicate caught locally before calling out
    pub fn record_suppressed(&mut self) {
        self.suppressed += 1;
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn success_rate(&self) -> f32 {
        let total = (self.recorded + self.failed) as f32;

        if total == 0.0 {
            0.0
        } else {
            self.recorded as f32 / total
        }
    }
}
