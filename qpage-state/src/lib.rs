//! # QPage State
//!
//! Page-distributed dense state vector.
//!
//! Each process owns a fixed number of pages of `2^q` amplitudes. Gates on
//! in-page qubits run locally through [`PagedState::local_apply`]; gates
//! touching page-determining qubits go through
//! [`PagedState::apply_page_crossing`], which exchanges page contents with
//! peer processes over a [`Communicator`](qpage_transport::Communicator),
//! applies the matrix on a staging copy and commits only after every
//! exchange succeeded.
//!
//! ```
//! use qpage_core::{matrices, Matrix, Qubit};
//! use qpage_state::{Locality, PagedState};
//!
//! // 5 qubits, 2 pages, single process: q4 selects the page
//! let mut state = PagedState::<f64>::initialize(5, 2, 0, 1).unwrap();
//! assert_eq!(state.classify(&[Qubit::new(4)]), Locality::PageCrossing);
//!
//! let h = Matrix::from_2x2(&matrices::HADAMARD);
//! state.local_apply(&h, &[Qubit::new(0)]);
//! assert!((state.amplitude(1).unwrap().re - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
//! ```

pub mod error;
pub mod kernels;
pub mod layout;
pub mod metrics;
pub mod paged_state;
pub mod permutation;
pub mod swap;

pub use error::{ConfigurationError, Result, StateError};
pub use layout::{BitRole, PageLayout, MAX_QUBITS, MIN_IN_PAGE_QUBITS, SUPPORTED_PAGE_COUNTS};
pub use metrics::StateMetrics;
pub use paged_state::{Locality, PagedState, Projection, StateOptions};
pub use permutation::Permutation;
pub use swap::SwapPlan;
