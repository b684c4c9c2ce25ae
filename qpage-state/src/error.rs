//! Error types for the paged state vector

use qpage_core::{CoreError, Qubit};
use qpage_transport::TransportError;
use thiserror::Error;

/// Startup configuration rejected before any page is allocated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Unsupported page count {num_pages}: supported values are 1, 2, 4 and 8")]
    UnsupportedPageCount { num_pages: usize },

    #[error("Process count {size} is not a power of two")]
    ProcessCountNotPowerOfTwo { size: usize },

    #[error(
        "{num_qubits} qubits with {num_pages} pages on {num_processes} processes leave \
         {available} in-page qubits, at least {required} are required"
    )]
    PageTooSmall {
        num_qubits: usize,
        num_pages: usize,
        num_processes: usize,
        available: usize,
        required: usize,
    },

    #[error("{num_qubits} qubits exceed the addressable maximum of {max}")]
    TooManyQubits { num_qubits: usize, max: usize },

    #[error("Rank {rank} outside a world of {size} processes")]
    InvalidRank { rank: usize, size: usize },

    #[error("Initial value {value} does not fit in {num_qubits} qubits")]
    InvalidInitialValue { value: u64, num_qubits: usize },

    #[error("Invalid initial permutation: {0}")]
    InvalidPermutation(String),

    #[error("Fused qubit bound {0} must lie in 1..=6")]
    InvalidFusionBound(usize),
}

/// Errors that can occur during state vector operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid qubit {qubit} for {num_qubits}-qubit state")]
    InvalidQubit { qubit: Qubit, num_qubits: usize },

    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),

    /// A gate needs more qubits than a page holds
    #[error("Gate on {qubits} qubits does not fit in pages of {in_page_qubits} qubits")]
    GateTooWide { qubits: usize, in_page_qubits: usize },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use qpage_transport::ErrorCode;

    #[test]
    fn test_transport_error_converts() {
        let err: StateError = TransportError::substrate("send_receive", ErrorCode::TIMEOUT).into();
        assert!(matches!(err, StateError::Transport(ref t) if t.code() == Some(ErrorCode::TIMEOUT)));
    }

    #[test]
    fn test_page_too_small_message() {
        let err = ConfigurationError::PageTooSmall {
            num_qubits: 4,
            num_pages: 4,
            num_processes: 2,
            available: 1,
            required: 3,
        };
        assert!(err.to_string().contains("leave 1 in-page qubits"));
    }
}
