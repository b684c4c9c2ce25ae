//! Global subscriber installation

use qpage_core::{GateRequest, Qubit};
use qpage_sim::{init_tracing, LoggingError, Simulator, SimulatorConfig, TracingConfig, TracingOutput};
use serial_test::serial;

#[test]
#[serial]
fn test_invalid_directive_installs_nothing() {
    let config = TracingConfig {
        directives: Some("qpage_sim=loud".to_string()),
        ..TracingConfig::for_ci()
    };
    assert!(matches!(init_tracing(&config), Err(LoggingError::InvalidFilter(_))));
}

#[test]
#[serial]
fn test_init_is_idempotent_and_runs_are_traced() {
    let config = TracingConfig {
        directives: Some("qpage_state=debug,qpage_sim=debug".to_string()),
        output: TracingOutput::Compact,
        ansi: false,
        ..TracingConfig::for_swap_analysis()
    };
    init_tracing(&config).unwrap();
    assert!(!init_tracing(&config).unwrap());

    let circuit = vec![
        GateRequest::Hadamard(Qubit::new(4)),
        GateRequest::Set(Qubit::new(4)),
    ];
    let result = Simulator::new(SimulatorConfig::new(5).with_pages(2))
        .run_local(2, &circuit)
        .unwrap();
    assert!((result.probability(0b10000) - 1.0).abs() < 1e-12);
}
