//! Simulator configuration

use crate::error::{Result, SimulatorError};
use qpage_core::Precision;
use qpage_state::{ConfigurationError, PageLayout, Permutation, StateOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest fused block the accumulator may build
pub const MAX_FUSION_BOUND: usize = 6;

/// Gate fusion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Fuse adjacent small gates even outside an explicit fusion block
    pub auto_fusion: bool,

    /// Maximum number of qubits a fused matrix may span
    pub max_fused_qubits: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            auto_fusion: true,
            max_fused_qubits: 4,
        }
    }
}

/// Configuration for one simulation
///
/// Every process of a run must use the same configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Total number of qubits in the register
    pub num_qubits: usize,

    /// Pages held by each process (1, 2, 4 or 8)
    pub num_pages: usize,

    /// Logical basis state the register starts in
    pub initial_value: u64,

    /// `assignment[logical] = physical position`; identity when absent
    pub initial_permutation: Option<Vec<usize>>,

    /// Requested floating-point precision
    pub precision: Precision,

    pub fusion: FusionConfig,

    /// Threshold for using parallel kernels (local amplitude count)
    pub parallel_threshold: usize,

    /// Record per-gate telemetry
    pub collect_telemetry: bool,

    /// Receive timeout of the in-process substrate, in milliseconds
    pub receive_timeout_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            num_qubits: 10,
            num_pages: 4,
            initial_value: 0,
            initial_permutation: None,
            precision: Precision::Double,
            fusion: FusionConfig::default(),
            parallel_threshold: 1 << 14,
            collect_telemetry: true,
            receive_timeout_ms: 30_000,
        }
    }
}

impl SimulatorConfig {
    pub fn new(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            ..Default::default()
        }
    }

    /// Single precision, wide fusion blocks and no telemetry
    pub fn performance(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            precision: Precision::Single,
            fusion: FusionConfig {
                auto_fusion: true,
                max_fused_qubits: 5,
            },
            parallel_threshold: 1 << 12,
            collect_telemetry: false,
            ..Default::default()
        }
    }

    /// Every gate applied on its own, sequential kernels
    pub fn debug(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            fusion: FusionConfig {
                auto_fusion: false,
                ..Default::default()
            },
            parallel_threshold: usize::MAX,
            collect_telemetry: true,
            receive_timeout_ms: 5_000,
            ..Default::default()
        }
    }

    pub fn with_pages(mut self, num_pages: usize) -> Self {
        self.num_pages = num_pages;
        self
    }

    pub fn with_initial_value(mut self, value: u64) -> Self {
        self.initial_value = value;
        self
    }

    pub fn with_initial_permutation(mut self, assignment: Vec<usize>) -> Self {
        self.initial_permutation = Some(assignment);
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[inline]
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Check the configuration for a world of `num_processes`
    ///
    /// Runs before any page is allocated.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn validate(&self, num_processes: usize) -> std::result::Result<(), ConfigurationError> {
        PageLayout::new(self.num_qubits, self.num_pages, num_processes, 0)?;
        if self.num_qubits < 64 && self.initial_value >> self.num_qubits != 0 {
            return Err(ConfigurationError::InvalidInitialValue {
                value: self.initial_value,
                num_qubits: self.num_qubits,
            });
        }
        if let Some(assignment) = &self.initial_permutation {
            if assignment.len() != self.num_qubits {
                return Err(ConfigurationError::InvalidPermutation(format!(
                    "{} positions given for {} qubits",
                    assignment.len(),
                    self.num_qubits
                )));
            }
            Permutation::from_assignment(assignment.clone())
                .map_err(|e| ConfigurationError::InvalidPermutation(e.to_string()))?;
        }
        if !(1..=MAX_FUSION_BOUND).contains(&self.fusion.max_fused_qubits) {
            return Err(ConfigurationError::InvalidFusionBound(self.fusion.max_fused_qubits));
        }
        Ok(())
    }

    /// Options handed to the paged state on every process
    pub fn state_options(&self) -> StateOptions {
        StateOptions {
            initial_value: self.initial_value,
            initial_permutation: self.initial_permutation.clone(),
            parallel_threshold: self.parallel_threshold,
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SimulatorError::ConfigFile(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SimulatorError::ConfigFile(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulatorConfig::default();
        assert_eq!(config.num_pages, 4);
        assert_eq!(config.precision, Precision::Double);
        assert!(config.fusion.auto_fusion);
        assert_eq!(config.fusion.max_fused_qubits, 4);
        assert!(config.validate(1).is_ok());
    }

    #[test]
    fn test_presets() {
        let perf = SimulatorConfig::performance(12);
        assert_eq!(perf.precision, Precision::Single);
        assert!(!perf.collect_telemetry);

        let debug = SimulatorConfig::debug(12);
        assert!(!debug.fusion.auto_fusion);
        assert_eq!(debug.parallel_threshold, usize::MAX);
    }

    #[test]
    fn test_validate_page_count() {
        let config = SimulatorConfig::new(10).with_pages(3);
        assert_eq!(
            config.validate(1),
            Err(ConfigurationError::UnsupportedPageCount { num_pages: 3 })
        );
    }

    #[test]
    fn test_validate_process_count() {
        let config = SimulatorConfig::new(10);
        assert_eq!(
            config.validate(6),
            Err(ConfigurationError::ProcessCountNotPowerOfTwo { size: 6 })
        );
    }

    #[test]
    fn test_validate_page_too_small() {
        // 2 slot bits + 2 rank bits leave a single in-page qubit
        let config = SimulatorConfig::new(5).with_pages(4);
        assert!(matches!(
            config.validate(4),
            Err(ConfigurationError::PageTooSmall { available: 1, .. })
        ));
    }

    #[test]
    fn test_validate_register_width() {
        let config = SimulatorConfig::new(usize::BITS as usize).with_pages(1);
        assert!(matches!(
            config.validate(1),
            Err(ConfigurationError::TooManyQubits { .. })
        ));
    }

    #[test]
    fn test_validate_initial_state() {
        let config = SimulatorConfig::new(4).with_pages(1).with_initial_value(16);
        assert!(matches!(
            config.validate(1),
            Err(ConfigurationError::InvalidInitialValue { value: 16, .. })
        ));

        let config = SimulatorConfig::new(4)
            .with_pages(1)
            .with_initial_permutation(vec![0, 1, 1, 3]);
        assert!(matches!(config.validate(1), Err(ConfigurationError::InvalidPermutation(_))));
    }

    #[test]
    fn test_validate_fusion_bound() {
        for bound in [0, 7] {
            let config = SimulatorConfig::new(8).with_fusion(FusionConfig {
                auto_fusion: true,
                max_fused_qubits: bound,
            });
            assert_eq!(config.validate(1), Err(ConfigurationError::InvalidFusionBound(bound)));
        }
    }

    #[test]
    fn test_json_with_defaults() {
        let config = SimulatorConfig::from_json_str(
            r#"{ "num_qubits": 12, "num_pages": 2, "precision": "single", "fusion": { "auto_fusion": false } }"#,
        )
        .unwrap();
        assert_eq!(config.num_qubits, 12);
        assert_eq!(config.num_pages, 2);
        assert_eq!(config.precision, Precision::Single);
        assert!(!config.fusion.auto_fusion);
        assert_eq!(config.fusion.max_fused_qubits, 4);
        assert_eq!(config.receive_timeout(), Duration::from_secs(30));

        let back = SimulatorConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_malformed_json() {
        let err = SimulatorConfig::from_json_str("{ num_qubits: }").unwrap_err();
        assert!(matches!(err, SimulatorError::ConfigFile(_)));
    }
}
