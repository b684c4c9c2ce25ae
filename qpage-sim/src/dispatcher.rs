//! Gate dispatch
//!
//! Every request goes through the same steps: validate, classify against
//! the current permutation, then either absorb it into the pending fused
//! block or flush that block and apply the request. Applying a matrix
//! runs the local kernels when no target qubit selects a page and the
//! page swap protocol otherwise.
//!
//! All processes must dispatch the same requests in the same order.

use crate::config::SimulatorConfig;
use crate::error::{Result, SimulatorError};
use crate::fusion::{FusedBlock, FusionAccumulator};
use crate::telemetry::ExecutionTelemetry;
use num_complex::Complex;
use qpage_core::{matrices, GateClass, GateRequest, Matrix, Qubit, Real};
use qpage_state::{Locality, PagedState, Projection, StateError};
use qpage_transport::{Communicator, Substrate};
use std::time::Instant;
use tracing::{debug, trace};

pub struct Dispatcher<T: Real, S: Substrate> {
    state: PagedState<T>,
    comm: Communicator<S>,
    fusion: FusionAccumulator<T>,
    auto_fusion: bool,
    telemetry: Option<ExecutionTelemetry>,
}

impl<T: Real, S: Substrate> Dispatcher<T, S> {
    /// Validate `config` against the communicator's world and allocate the pages
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Configuration`] before any allocation when
    /// the configuration does not fit the world.
    pub fn new(config: &SimulatorConfig, comm: Communicator<S>) -> Result<Self> {
        config.validate(comm.size())?;
        let state = PagedState::for_communicator(&comm, config.num_qubits, config.num_pages, &config.state_options())?;
        let max_fused = config.fusion.max_fused_qubits.min(state.layout().in_page_qubits());
        Ok(Self {
            state,
            comm,
            fusion: FusionAccumulator::new(max_fused),
            auto_fusion: config.fusion.auto_fusion,
            telemetry: config.collect_telemetry.then(ExecutionTelemetry::new),
        })
    }

    pub fn state(&self) -> &PagedState<T> {
        &self.state
    }

    pub fn communicator(&self) -> &Communicator<S> {
        &self.comm
    }

    pub fn fusion(&self) -> &FusionAccumulator<T> {
        &self.fusion
    }

    pub fn telemetry(&self) -> Option<&ExecutionTelemetry> {
        self.telemetry.as_ref()
    }

    /// Dispatch one request
    ///
    /// # Errors
    ///
    /// Invalid requests and transport failures are returned unchanged and
    /// never retried. A failed page swap leaves the local pages untouched.
    pub fn apply(&mut self, request: &GateRequest) -> Result<()> {
        debug!(
            rank = self.comm.rank().index(),
            "{:<14}{}",
            request.name(),
            request.render_parameters()
        );
        let started = Instant::now();
        let result = self.dispatch(request);
        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry.inc_gate_type(request.name());
            telemetry.total_gate_time += started.elapsed();
            if let Err(err) = &result {
                telemetry.log_error(err.to_string());
            }
        }
        result
    }

    /// Dispatch a sequence of requests and flush whatever is still pending
    pub fn run<'a>(&mut self, circuit: impl IntoIterator<Item = &'a GateRequest>) -> Result<()> {
        for request in circuit {
            self.apply(request)?;
        }
        self.finish()
    }

    /// Apply the pending fused block, if any
    pub fn finish(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry.absorb_state_metrics(self.state.metrics());
        }
        Ok(())
    }

    /// Flush, then gather the full state vector in logical order at the root
    ///
    /// Collective. Returns `None` on every other process.
    pub fn collect_state_vector(&mut self) -> Result<Option<Vec<Complex<T>>>> {
        self.flush()?;
        Ok(self.state.collect_state_vector(&self.comm)?)
    }

    /// Release the state and the communicator
    pub fn into_parts(self) -> (PagedState<T>, Communicator<S>, Option<ExecutionTelemetry>) {
        (self.state, self.comm, self.telemetry)
    }

    fn dispatch(&mut self, request: &GateRequest) -> Result<()> {
        let name = request.name();
        request
            .validate(self.state.num_qubits())
            .map_err(|e| SimulatorError::invalid_request(name, e))?;

        match request {
            GateRequest::BeginFusion => {
                self.flush()?;
                self.fusion.begin();
                Ok(())
            }
            GateRequest::EndFusion => {
                self.flush()?;
                self.fusion.close();
                self.state.end_fusion();
                Ok(())
            }
            GateRequest::Set(qubit) => {
                self.flush()?;
                self.project(*qubit, true, name)
            }
            GateRequest::Clear(qubit) => {
                self.flush()?;
                self.project(*qubit, false, name)
            }
            GateRequest::Permute(assignment) => {
                self.flush()?;
                self.state
                    .permute(assignment.clone())
                    .map_err(|e| SimulatorError::from_state(name, e))
            }
            _ => {
                debug_assert_eq!(request.class(), GateClass::Unitary);
                let matrix = request
                    .matrix()
                    .ok_or_else(|| SimulatorError::invalid_request(name, "no matrix"))?
                    .cast::<T>();
                self.apply_unitary(name, &matrix, &request.qubits(), request.is_fusable())
            }
        }
    }

    fn apply_unitary(&mut self, name: &'static str, matrix: &Matrix<T>, qubits: &[Qubit], fusable: bool) -> Result<()> {
        let in_page_qubits = self.state.layout().in_page_qubits();
        if qubits.len() > in_page_qubits {
            return Err(SimulatorError::from_state(
                name,
                StateError::GateTooWide {
                    qubits: qubits.len(),
                    in_page_qubits,
                },
            ));
        }

        let fusing = self.fusion.is_open() || self.auto_fusion;
        if fusing && fusable && self.fusion.fits(qubits.len()) && self.state.classify(qubits) == Locality::Local {
            let evicted = self
                .fusion
                .accumulate(name, matrix, qubits)
                .map_err(|e| SimulatorError::invalid_request(name, e))?;
            if let Some(telemetry) = self.telemetry.as_mut() {
                telemetry.gates_fused += 1;
            }
            if let Some(block) = evicted {
                self.apply_block(block)?;
            }
            return Ok(());
        }

        self.flush()?;
        self.apply_matrix(name, matrix, qubits)
    }

    fn flush(&mut self) -> Result<()> {
        match self.fusion.flush() {
            Some(block) => self.apply_block(block),
            None => Ok(()),
        }
    }

    fn apply_block(&mut self, block: FusedBlock<T>) -> Result<()> {
        trace!(gates = ?block.gates, qubits = ?block.qubits, "applying fused block");
        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry.flushes += 1;
        }
        self.apply_matrix("FUSED", &block.matrix, &block.qubits)
    }

    fn apply_matrix(&mut self, name: &'static str, matrix: &Matrix<T>, qubits: &[Qubit]) -> Result<()> {
        match self.state.classify(qubits) {
            Locality::Local => {
                self.state.local_apply(matrix, qubits);
                if let Some(telemetry) = self.telemetry.as_mut() {
                    telemetry.local_applications += 1;
                }
            }
            Locality::PageCrossing => {
                self.state
                    .apply_page_crossing(matrix, qubits, &self.comm)
                    .map_err(|e| SimulatorError::from_state(name, e))?;
                if let Some(telemetry) = self.telemetry.as_mut() {
                    telemetry.page_crossing_applications += 1;
                }
            }
        }
        Ok(())
    }

    fn project(&mut self, qubit: Qubit, value: bool, name: &'static str) -> Result<()> {
        let outcome = self
            .state
            .set(qubit, value, &self.comm)
            .map_err(|e| SimulatorError::from_state(name, e))?;
        if outcome == Projection::Flip {
            if let Some(telemetry) = self.telemetry.as_mut() {
                telemetry.flips += 1;
            }
            let x = Matrix::from_2x2(&matrices::PAULI_X).cast::<T>();
            self.apply_matrix(name, &x, &[qubit])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionConfig;
    use approx::assert_relative_eq;
    use qpage_transport::{Environment, LocalCluster, LocalOptions, LocalSubstrate};
    use std::f64::consts::FRAC_1_SQRT_2;

    fn q(i: usize) -> Qubit {
        Qubit::new(i)
    }

    /// One-process world; the environment must outlive the dispatcher
    fn single(config: &SimulatorConfig) -> (Environment, Dispatcher<f64, LocalSubstrate>) {
        let (env, mut substrates) = LocalCluster::launch(1, LocalOptions::default()).unwrap();
        let comm = Communicator::new(substrates.remove(0)).unwrap();
        (env, Dispatcher::new(config, comm).unwrap())
    }

    #[test]
    fn test_auto_fusion_defers_application() {
        let config = SimulatorConfig::new(5).with_pages(2);
        let (_env, mut d) = single(&config);
        d.apply(&GateRequest::Hadamard(q(0))).unwrap();
        d.apply(&GateRequest::PauliZ(q(1))).unwrap();
        assert_eq!(d.state().metrics().applications(), 0);
        assert_eq!(d.fusion().qubits(), &[q(0), q(1)]);

        d.finish().unwrap();
        assert_eq!(d.state().metrics().local_applications, 1);
        assert!(d.fusion().is_empty());
        assert_relative_eq!(d.state().amplitude(1).unwrap().re, FRAC_1_SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn test_without_fusion_every_gate_applies() {
        let config = SimulatorConfig::new(5).with_pages(2).with_fusion(FusionConfig {
            auto_fusion: false,
            max_fused_qubits: 4,
        });
        let (_env, mut d) = single(&config);
        d.apply(&GateRequest::Hadamard(q(0))).unwrap();
        d.apply(&GateRequest::PauliZ(q(1))).unwrap();
        assert_eq!(d.state().metrics().local_applications, 2);
    }

    #[test]
    fn test_explicit_block_fuses_with_auto_fusion_off() {
        let config = SimulatorConfig::new(5).with_pages(2).with_fusion(FusionConfig {
            auto_fusion: false,
            max_fused_qubits: 4,
        });
        let (_env, mut d) = single(&config);
        d.apply(&GateRequest::BeginFusion).unwrap();
        assert!(d.fusion().is_open());
        d.apply(&GateRequest::Hadamard(q(0))).unwrap();
        d.apply(&GateRequest::Hadamard(q(0))).unwrap();
        assert_eq!(d.state().metrics().applications(), 0);
        d.apply(&GateRequest::EndFusion).unwrap();
        assert!(!d.fusion().is_open());
        assert_eq!(d.state().metrics().local_applications, 1);
        assert_eq!(d.state().metrics().fusions_completed, 1);
        assert_relative_eq!(d.state().amplitude(0).unwrap().re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_page_qubit_flushes_then_swaps() {
        // 5 qubits, 2 pages: q4 selects the page
        let config = SimulatorConfig::new(5).with_pages(2);
        let (_env, mut d) = single(&config);
        d.apply(&GateRequest::Hadamard(q(0))).unwrap();
        d.apply(&GateRequest::Hadamard(q(4))).unwrap();
        let metrics = d.state().metrics();
        assert_eq!(metrics.local_applications, 1);
        assert_eq!(metrics.page_crossing_applications, 1);
        assert!(d.fusion().is_empty());
        assert_relative_eq!(d.state().amplitude(0b10001).unwrap().re, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_toffoli_is_never_fused() {
        let config = SimulatorConfig::new(6).with_pages(2);
        let (_env, mut d) = single(&config);
        d.apply(&GateRequest::PauliX(q(0))).unwrap();
        d.apply(&GateRequest::PauliX(q(1))).unwrap();
        d.apply(&GateRequest::Toffoli {
            controls: [q(0), q(1)],
            target: q(2),
        })
        .unwrap();
        assert!(d.fusion().is_empty());
        assert_relative_eq!(d.state().amplitude(0b111).unwrap().re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clear_on_zero_probability_flips() {
        let config = SimulatorConfig::new(5).with_pages(2).with_initial_value(0b10000);
        let (_env, mut d) = single(&config);
        // q3 is |0>, so SET must flip it
        d.apply(&GateRequest::Set(q(3))).unwrap();
        assert_relative_eq!(d.state().amplitude(0b11000).unwrap().re, 1.0, epsilon = 1e-12);
        // q4 is |1>, so CLEAR flips through the page swap
        d.apply(&GateRequest::Clear(q(4))).unwrap();
        assert_relative_eq!(d.state().amplitude(0b01000).unwrap().re, 1.0, epsilon = 1e-12);
        assert_eq!(d.telemetry().unwrap().flips, 2);
        assert_eq!(d.state().metrics().page_crossing_applications, 1);
    }

    #[test]
    fn test_invalid_requests() {
        let config = SimulatorConfig::new(5).with_pages(2);
        let (_env, mut d) = single(&config);
        let err = d.apply(&GateRequest::Hadamard(q(7))).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);

        let err = d
            .apply(&GateRequest::ControlledNot {
                control: q(1),
                target: q(1),
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
        assert_eq!(d.telemetry().unwrap().error_events.len(), 2);
    }

    #[test]
    fn test_hand_built_unitary_with_wrong_width_is_rejected() {
        let config = SimulatorConfig::new(6).with_pages(2);
        let (_env, mut d) = single(&config);
        let request = GateRequest::Unitary {
            qubits: [q(0), q(1), q(2)].into_iter().collect(),
            matrix: Matrix::identity(1),
        };
        let err = d.apply(&request).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
        assert_eq!(d.state().metrics().applications(), 0);
        assert_relative_eq!(d.state().amplitude(0).unwrap().re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gate_wider_than_page() {
        // 6 qubits, 8 pages: 3 in-page qubits
        let config = SimulatorConfig::new(6).with_pages(8);
        let (_env, mut d) = single(&config);
        let matrix = Matrix::identity(4);
        let request = GateRequest::unitary([q(0), q(1), q(2), q(3)], matrix).unwrap();
        let err = d.apply(&request).unwrap_err();
        assert!(matches!(err, SimulatorError::InvalidRequest { ref gate, .. } if gate == "UNITARY"));
    }

    #[test]
    fn test_permute_flushes_first() {
        let config = SimulatorConfig::new(5).with_pages(2);
        let (_env, mut d) = single(&config);
        d.apply(&GateRequest::PauliX(q(0))).unwrap();
        d.apply(&GateRequest::Permute(vec![4, 1, 2, 3, 0])).unwrap();
        assert_eq!(d.state().metrics().local_applications, 1);
        assert!(d.state().is_page_qubit(q(0)));
        assert_relative_eq!(d.state().amplitude(1).unwrap().re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_collect_state_vector_flushes() {
        let config = SimulatorConfig::new(5).with_pages(1);
        let (_env, mut d) = single(&config);
        d.apply(&GateRequest::PauliX(q(2))).unwrap();
        let full = d.collect_state_vector().unwrap().unwrap();
        assert_eq!(full.len(), 32);
        assert_relative_eq!(full[4].re, 1.0, epsilon = 1e-12);
    }
}
