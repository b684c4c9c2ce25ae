//! Error types for gate dispatch and simulation

use qpage_state::{ConfigurationError, StateError};
use qpage_transport::TransportError;
use thiserror::Error;

/// Coarse classification of a [`SimulatorError`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected at startup, before any page was allocated
    Configuration,
    /// The substrate reported a failure; carries its native code
    Transport,
    /// A root-only or non-root-only operation called from the wrong rank
    RoleViolation,
    /// A gate request that cannot be applied to this register
    InvalidRequest,
}

/// Errors surfaced while applying gate requests
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulatorError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("{0}")]
    RoleViolation(TransportError),

    #[error("Invalid gate request {gate}: {reason}")]
    InvalidRequest { gate: String, reason: String },

    #[error("Configuration file error: {0}")]
    ConfigFile(String),
}

impl SimulatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimulatorError::Configuration(_) | SimulatorError::ConfigFile(_) => ErrorKind::Configuration,
            SimulatorError::Transport(_) => ErrorKind::Transport,
            SimulatorError::RoleViolation(_) => ErrorKind::RoleViolation,
            SimulatorError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
        }
    }

    /// The underlying transport error, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            SimulatorError::Transport(e) | SimulatorError::RoleViolation(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn invalid_request(gate: &str, reason: impl ToString) -> Self {
        SimulatorError::InvalidRequest {
            gate: gate.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Attach the gate name to a state-level failure
    pub(crate) fn from_state(gate: &str, err: StateError) -> Self {
        match err {
            StateError::Configuration(e) => SimulatorError::Configuration(e),
            StateError::Transport(e) => e.into(),
            other => SimulatorError::invalid_request(gate, other),
        }
    }
}

impl From<TransportError> for SimulatorError {
    fn from(err: TransportError) -> Self {
        if err.is_role_violation() {
            SimulatorError::RoleViolation(err)
        } else {
            SimulatorError::Transport(err)
        }
    }
}

impl From<StateError> for SimulatorError {
    fn from(err: StateError) -> Self {
        SimulatorError::from_state("state", err)
    }
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
