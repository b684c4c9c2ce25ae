//! # QPage Sim
//!
//! Gate dispatch and execution driver for the page-distributed
//! state-vector simulator.
//!
//! The [`Dispatcher`] consumes gate requests in circuit order. Small
//! gates on in-page qubits are composed by the [`FusionAccumulator`] and
//! applied as one matrix; everything else is applied directly, through the
//! local kernels or the page swap protocol of `qpage-state`.
//!
//! ## Example
//!
//! ```
//! use qpage_core::{GateRequest, Qubit};
//! use qpage_sim::{Simulator, SimulatorConfig};
//!
//! let circuit = vec![
//!     GateRequest::Hadamard(Qubit::new(0)),
//!     GateRequest::ControlledNot {
//!         control: Qubit::new(0),
//!         target: Qubit::new(5),
//!     },
//! ];
//!
//! // 6 qubits over 2 processes with 2 pages each
//! let sim = Simulator::new(SimulatorConfig::new(6).with_pages(2));
//! let result = sim.run_local(2, &circuit).unwrap();
//! assert!((result.probability(0b100001) - 0.5).abs() < 1e-12);
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fusion;
pub mod logging;
pub mod simulator;
pub mod telemetry;

pub use config::{FusionConfig, SimulatorConfig, MAX_FUSION_BOUND};
pub use dispatcher::Dispatcher;
pub use error::{ErrorKind, Result, SimulatorError};
pub use fusion::{FusedBlock, FusionAccumulator};
pub use logging::{init_tracing, LoggingError, TracingConfig, TracingOutput};
pub use simulator::{SimulationResult, Simulator, WorkerOutcome};
pub use telemetry::{ExecutionMetrics, ExecutionTelemetry};
