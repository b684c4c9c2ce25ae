//! Gate fusion
//!
//! [`FusionAccumulator`] composes consecutive small unitaries into one
//! dense matrix over the union of their qubits, so the state vector is
//! swept once per block instead of once per gate. The union is bounded;
//! a gate that would push it past the bound evicts the current block.

use qpage_core::{Matrix, Qubit, Real, Result};
use smallvec::SmallVec;

/// A composed block ready to be applied
#[derive(Clone, Debug, PartialEq)]
pub struct FusedBlock<T: Real> {
    pub matrix: Matrix<T>,
    /// Qubits of `matrix`, most significant first
    pub qubits: SmallVec<[Qubit; 8]>,
    /// Names of the absorbed gates, in application order
    pub gates: Vec<&'static str>,
}

impl<T: Real> FusedBlock<T> {
    /// Number of absorbed gates
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct FusionAccumulator<T: Real> {
    max_qubits: usize,
    /// Inside an explicit fusion block
    open: bool,
    qubits: SmallVec<[Qubit; 8]>,
    matrix: Option<Matrix<T>>,
    gates: Vec<&'static str>,
}

impl<T: Real> FusionAccumulator<T> {
    /// Create an empty accumulator whose blocks span at most `max_qubits`
    ///
    /// # Arguments
    ///
    /// * `max_qubits` - Bound on the union of fused qubits, already capped
    ///   by the caller to the in-page width
    pub fn new(max_qubits: usize) -> Self {
        Self {
            max_qubits,
            open: false,
            qubits: SmallVec::new(),
            matrix: None,
            gates: Vec::new(),
        }
    }

    #[inline]
    pub fn max_qubits(&self) -> usize {
        self.max_qubits
    }

    /// Enter an explicit fusion block
    pub fn begin(&mut self) {
        self.open = true;
    }

    /// Leave the explicit fusion block; pending gates stay pending
    pub fn close(&mut self) {
        self.open = false;
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matrix.is_none()
    }

    /// Qubits spanned by the pending block
    pub fn qubits(&self) -> &[Qubit] {
        &self.qubits
    }

    /// Whether a gate on `width` qubits can ever be absorbed
    #[inline]
    pub fn fits(&self, width: usize) -> bool {
        width <= self.max_qubits
    }

    /// Compose `matrix` on `qubits` after everything accumulated so far
    ///
    /// If the union of qubits would exceed the bound, the pending block is
    /// returned for application first and a new block starts with this gate.
    ///
    /// # Errors
    ///
    /// Fails if the matrix does not match `qubits`.
    pub fn accumulate(
        &mut self,
        name: &'static str,
        matrix: &Matrix<T>,
        qubits: &[Qubit],
    ) -> Result<Option<FusedBlock<T>>> {
        let mut union = self.qubits.clone();
        union.extend(qubits.iter().copied().filter(|q| !self.qubits.contains(q)));

        let evicted = if union.len() > self.max_qubits && !self.is_empty() {
            union = qubits.iter().copied().collect();
            self.flush()
        } else {
            None
        };

        let gate = matrix.expand(qubits, &union)?;
        let composed = match self.matrix.take() {
            Some(acc) => gate.matmul(&acc.expand(&self.qubits, &union)?)?,
            None => gate,
        };
        self.matrix = Some(composed);
        self.qubits = union;
        self.gates.push(name);
        Ok(evicted)
    }

    /// Take the pending block and reset to empty
    ///
    /// Returns `None` when nothing is pending.
    pub fn flush(&mut self) -> Option<FusedBlock<T>> {
        let matrix = self.matrix.take()?;
        Some(FusedBlock {
            matrix,
            qubits: std::mem::take(&mut self.qubits),
            gates: std::mem::take(&mut self.gates),
        })
    }
}
