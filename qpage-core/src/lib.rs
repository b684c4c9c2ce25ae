//! # QPage Core
//!
//! Shared vocabulary of the page-distributed state-vector simulator:
//! qubit identifiers, precision selection, dense gate matrices and the
//! closed set of gate requests a front end feeds into the dispatcher.
//!
//! ## Example
//!
//! ```
//! use qpage_core::{GateRequest, Qubit};
//!
//! let gate = GateRequest::ControlledNot {
//!     control: Qubit::new(0),
//!     target: Qubit::new(3),
//! };
//! assert_eq!(gate.name(), "CNOT");
//! assert_eq!(gate.qubits().len(), 2);
//! assert!(gate.is_fusable());
//! ```

pub mod error;
pub mod gate;
pub mod matrices;
pub mod matrix;
pub mod precision;
pub mod qubit;

pub use error::{CoreError, Result};
pub use gate::{GateClass, GateRequest};
pub use matrix::Matrix;
pub use precision::{
    select_native, DoublePrecision, ExtendedPrecision, NativeFloat, NativeOf, Precision,
    PrecisionCategory, Real, SinglePrecision,
};
pub use qubit::Qubit;
