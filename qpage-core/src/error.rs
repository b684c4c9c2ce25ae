//! Error types for gate requests and matrices

use crate::Qubit;
use thiserror::Error;

/// Errors raised while building or validating gate requests
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Qubit index outside the register
    #[error("Invalid qubit {qubit}: register has only {num_qubits} qubits")]
    InvalidQubit { qubit: Qubit, num_qubits: usize },

    /// The same qubit appears twice in one request
    #[error("Duplicate qubit {0} in gate request")]
    DuplicateQubit(Qubit),

    /// Matrix data does not describe a square 2^k x 2^k operator
    #[error("Invalid matrix: {0}")]
    InvalidMatrix(String),

    /// Matrix size does not match the number of target qubits
    #[error("Matrix acts on {matrix_qubits} qubits but {qubits} qubits were given")]
    DimensionMismatch { matrix_qubits: usize, qubits: usize },

    /// Matrix is not unitary within tolerance
    #[error("Matrix for '{gate}' is not unitary")]
    NotUnitary { gate: String },

    /// Unknown precision category name
    #[error("Unknown precision '{0}' (expected single, double or extended)")]
    UnknownPrecision(String),
}

impl CoreError {
    pub fn invalid_qubit(qubit: impl Into<Qubit>, num_qubits: usize) -> Self {
        Self::InvalidQubit {
            qubit: qubit.into(),
            num_qubits,
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_qubit_message() {
        let err = CoreError::invalid_qubit(7usize, 4);
        let msg = err.to_string();
        assert!(msg.contains("q7"));
        assert!(msg.contains('4'));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = CoreError::DimensionMismatch {
            matrix_qubits: 2,
            qubits: 3,
        };
        assert_eq!(
            err.to_string(),
            "Matrix acts on 2 qubits but 3 qubits were given"
        );
    }
}
