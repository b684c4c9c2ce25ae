//! Bookkeeping counters kept by the state vector

use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateMetrics {
    pub local_applications: usize,
    pub page_crossing_applications: usize,
    /// Pairwise send-receive calls, both directions of a swap counted
    pub exchanges: usize,
    pub amplitudes_exchanged: usize,
    pub fusions_completed: usize,
    pub projections: usize,
    pub permutations: usize,
    pub swap_time: Duration,
}

impl StateMetrics {
    pub fn applications(&self) -> usize {
        self.local_applications + self.page_crossing_applications
    }

    /// Fraction of applications that needed a page swap
    pub fn page_crossing_ratio(&self) -> f64 {
        match self.applications() {
            0 => 0.0,
            n => self.page_crossing_applications as f64 / n as f64,
        }
    }
}
