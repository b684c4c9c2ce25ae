//! Telemetry and metrics collection

use ahash::AHashMap;
use qpage_state::StateMetrics;
use std::time::{Duration, Instant};

/// Per-worker execution record
#[derive(Debug, Default, Clone)]
pub struct ExecutionTelemetry {
    pub total_gate_time: Duration,
    pub gate_type_counts: AHashMap<String, usize>,
    /// Requests absorbed into a fused block
    pub gates_fused: usize,
    /// Fused blocks applied
    pub flushes: usize,
    pub local_applications: usize,
    pub page_crossing_applications: usize,
    /// SET/CLEAR requests answered with a flip
    pub flips: usize,
    pub exchanges: usize,
    pub amplitudes_exchanged: usize,
    pub swap_time: Duration,
    pub error_events: Vec<String>,
    pub custom_events: Vec<(String, Instant)>,
}

impl ExecutionTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_error(&mut self, msg: impl Into<String>) {
        self.error_events.push(msg.into());
    }

    pub fn log_event(&mut self, label: impl Into<String>) {
        self.custom_events.push((label.into(), Instant::now()));
    }

    pub fn inc_gate_type(&mut self, gate_name: &str) {
        *self
            .gate_type_counts
            .entry(gate_name.to_string())
            .or_insert(0) += 1;
    }

    pub fn gate_count(&self, gate_name: &str) -> usize {
        self.gate_type_counts.get(gate_name).copied().unwrap_or(0)
    }

    /// Requests seen, of every kind
    pub fn gates_dispatched(&self) -> usize {
        self.gate_type_counts.values().sum()
    }

    /// Copy the exchange counters kept by the state vector
    pub fn absorb_state_metrics(&mut self, metrics: &StateMetrics) {
        self.exchanges = metrics.exchanges;
        self.amplitudes_exchanged = metrics.amplitudes_exchanged;
        self.swap_time = metrics.swap_time;
    }
}

/// Summary of one worker's run
#[derive(Debug, Clone)]
pub struct ExecutionMetrics {
    pub gates_executed: usize,
    pub gates_failed: usize,
    pub applications: usize,
    pub average_gate_time: Duration,
    pub total_time: Duration,
    /// Applications that needed a page swap
    pub page_crossing_ratio: f64,
    /// Absorbed requests per applied fused block
    pub fusion_factor: f64,
    pub swap_time: Duration,
}

impl ExecutionMetrics {
    pub fn from_telemetry(telemetry: &ExecutionTelemetry) -> Self {
        let gates_executed = telemetry.gates_dispatched();
        let applications = telemetry.local_applications + telemetry.page_crossing_applications;
        let page_crossing_ratio = if applications > 0 {
            telemetry.page_crossing_applications as f64 / applications as f64
        } else {
            0.0
        };
        let fusion_factor = if telemetry.flushes > 0 {
            telemetry.gates_fused as f64 / telemetry.flushes as f64
        } else {
            0.0
        };
        let average_gate_time = if gates_executed > 0 {
            telemetry.total_gate_time / gates_executed as u32
        } else {
            Duration::ZERO
        };

        Self {
            gates_executed,
            gates_failed: telemetry.error_events.len(),
            applications,
            average_gate_time,
            total_time: telemetry.total_gate_time,
            page_crossing_ratio,
            fusion_factor,
            swap_time: telemetry.swap_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_counts() {
        let mut telemetry = ExecutionTelemetry::new();
        telemetry.inc_gate_type("H");
        telemetry.inc_gate_type("H");
        telemetry.inc_gate_type("CNOT");
        assert_eq!(telemetry.gate_count("H"), 2);
        assert_eq!(telemetry.gate_count("SWAP"), 0);
        assert_eq!(telemetry.gates_dispatched(), 3);
    }

    #[test]
    fn test_metrics_from_telemetry() {
        let mut telemetry = ExecutionTelemetry::new();
        for _ in 0..4 {
            telemetry.inc_gate_type("H");
        }
        telemetry.local_applications = 3;
        telemetry.page_crossing_applications = 1;
        telemetry.gates_fused = 4;
        telemetry.flushes = 2;
        telemetry.total_gate_time = Duration::from_millis(8);
        telemetry.log_error("boom");

        let metrics = ExecutionMetrics::from_telemetry(&telemetry);
        assert_eq!(metrics.gates_executed, 4);
        assert_eq!(metrics.gates_failed, 1);
        assert_eq!(metrics.page_crossing_ratio, 0.25);
        assert_eq!(metrics.fusion_factor, 2.0);
        assert_eq!(metrics.average_gate_time, Duration::from_millis(2));
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = ExecutionMetrics::from_telemetry(&ExecutionTelemetry::default());
        assert_eq!(metrics.page_crossing_ratio, 0.0);
        assert_eq!(metrics.average_gate_time, Duration::ZERO);
    }
}
