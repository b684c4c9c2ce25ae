//! Transport errors

use crate::{ErrorCode, Rank};
use std::fmt;
use thiserror::Error;

/// Role an operation is restricted to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Root,
    NonRoot,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Root => f.write_str("root"),
            Role::NonRoot => f.write_str("non-root"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The substrate reported a failure
    #[error("{operation} failed with substrate error {code}")]
    Substrate {
        operation: &'static str,
        code: ErrorCode,
    },

    /// An operation was invoked from a process with the wrong role
    #[error("{operation} may only be called on a {required} process (called on rank {rank})")]
    RoleViolation {
        operation: &'static str,
        rank: Rank,
        required: Role,
    },

    #[error("Transport environment is already initialized")]
    AlreadyInitialized,

    #[error("Transport environment is already finalized")]
    AlreadyFinalized,
}

impl TransportError {
    pub fn substrate(operation: &'static str, code: ErrorCode) -> Self {
        Self::Substrate { operation, code }
    }

    /// Native error code, if the failure came from the substrate
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TransportError::Substrate { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Name of the adapter operation that failed
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            TransportError::Substrate { operation, .. }
            | TransportError::RoleViolation { operation, .. } => Some(operation),
            _ => None,
        }
    }

    pub fn is_role_violation(&self) -> bool {
        matches!(self, TransportError::RoleViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
