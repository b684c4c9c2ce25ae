//! Simulation driver
//!
//! [`Simulator::run_worker`] is the per-process entry point: it builds the
//! communicator and the dispatcher on top of any substrate and runs a
//! circuit to completion. [`Simulator::run_local`] launches an in-process
//! world, runs one worker per rank on its own thread and returns the state
//! vector gathered at the root.

use crate::config::SimulatorConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, SimulatorError};
use crate::telemetry::{ExecutionMetrics, ExecutionTelemetry};
use num_complex::{Complex, Complex64};
use qpage_core::{select_native, GateRequest, NativeFloat, Precision, Real};
use qpage_state::StateMetrics;
use qpage_transport::{Communicator, LocalCluster, LocalOptions, Substrate};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What one worker produced
#[derive(Debug, Clone)]
pub struct WorkerOutcome<T: Real> {
    pub rank: usize,
    /// Full state vector in logical order; only set on the root
    pub amplitudes: Option<Vec<Complex<T>>>,
    pub state_metrics: StateMetrics,
    pub telemetry: Option<ExecutionTelemetry>,
}

/// Result of a whole in-process run
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// State vector in logical order, widened to `f64`
    pub amplitudes: Vec<Complex64>,
    pub precision: Precision,
    pub num_processes: usize,
    /// Indexed by rank
    pub state_metrics: Vec<StateMetrics>,
    /// Indexed by rank; empty when telemetry is disabled
    pub telemetry: Vec<ExecutionTelemetry>,
    pub execution_time: Duration,
}

impl SimulationResult {
    pub fn num_qubits(&self) -> usize {
        self.amplitudes.len().trailing_zeros() as usize
    }

    pub fn probability(&self, index: usize) -> f64 {
        self.amplitudes.get(index).map(|a| a.norm_sqr()).unwrap_or(0.0)
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|a| a.norm_sqr()).collect()
    }

    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(|a| a.norm_sqr()).sum()
    }

    /// Page swaps performed, summed over ranks
    pub fn page_crossing_applications(&self) -> usize {
        self.state_metrics.iter().map(|m| m.page_crossing_applications).sum()
    }

    /// Send-receive calls, summed over ranks
    pub fn exchanges(&self) -> usize {
        self.state_metrics.iter().map(|m| m.exchanges).sum()
    }

    /// Per-rank metrics derived from the telemetry
    pub fn metrics(&self) -> Vec<ExecutionMetrics> {
        self.telemetry.iter().map(ExecutionMetrics::from_telemetry).collect()
    }
}

pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Run `circuit` as one process of a world reached through `substrate`
    ///
    /// Collective: every process of the world must call it with the same
    /// configuration and circuit.
    pub fn run_worker<T: Real, S: Substrate>(&self, substrate: S, circuit: &[GateRequest]) -> Result<WorkerOutcome<T>> {
        let comm = Communicator::new(substrate)?;
        let rank = comm.rank().index();
        let mut dispatcher: Dispatcher<T, S> = Dispatcher::new(&self.config, comm)?;
        info!(
            rank,
            precision = %self.config.precision,
            gates = circuit.len(),
            "worker started"
        );

        dispatcher.run(circuit)?;
        let amplitudes = dispatcher.collect_state_vector()?;
        let (state, _comm, telemetry) = dispatcher.into_parts();
        info!(
            rank,
            local = state.metrics().local_applications,
            page_crossing = state.metrics().page_crossing_applications,
            "worker finished"
        );
        Ok(WorkerOutcome {
            rank,
            amplitudes,
            state_metrics: state.metrics().clone(),
            telemetry,
        })
    }

    /// Run `circuit` on an in-process world of `num_processes` ranks
    ///
    /// The configuration is validated before the world is launched.
    ///
    /// # Errors
    ///
    /// Returns the first error in rank order when any worker failed.
    pub fn run_local(&self, num_processes: usize, circuit: &[GateRequest]) -> Result<SimulationResult> {
        self.config.validate(num_processes)?;
        let started = Instant::now();
        let mut result = match select_native(self.config.precision) {
            NativeFloat::F32 => self.run_local_as::<f32>(num_processes, circuit)?,
            NativeFloat::F64 => self.run_local_as::<f64>(num_processes, circuit)?,
        };
        result.execution_time = started.elapsed();
        Ok(result)
    }

    fn run_local_as<T: Real>(&self, num_processes: usize, circuit: &[GateRequest]) -> Result<SimulationResult> {
        let options = LocalOptions {
            receive_timeout: self.config.receive_timeout(),
        };
        let outcomes = LocalCluster::run(num_processes, options, |substrate| {
            self.run_worker::<T, _>(substrate, circuit)
        })?;

        let mut amplitudes = None;
        let mut state_metrics = Vec::with_capacity(num_processes);
        let mut telemetry = Vec::new();
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => {
                    if let Some(full) = outcome.amplitudes {
                        amplitudes = Some(full);
                    }
                    state_metrics.push(outcome.state_metrics);
                    telemetry.extend(outcome.telemetry);
                }
                Err(err) => {
                    warn!(error = %err, "worker failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let amplitudes = amplitudes
            .ok_or_else(|| SimulatorError::invalid_request("COLLECT", "root returned no state vector"))?
            .into_iter()
            .map(|a| Complex64::new(a.re.widen(), a.im.widen()))
            .collect();
        Ok(SimulationResult {
            amplitudes,
            precision: self.config.precision,
            num_processes,
            state_metrics,
            telemetry,
            execution_time: Duration::ZERO,
        })
    }
}
