//! # QPage Transport
//!
//! Error-checked adapter over a message-passing substrate.
//!
//! The simulator never talks to the substrate directly. It goes through a
//! [`Communicator`], which checks every substrate result and turns failures
//! into [`TransportError`] values that carry the native [`ErrorCode`] and
//! the name of the failing operation.
//!
//! [`LocalCluster`] provides an in-process substrate where each rank is a
//! thread connected to its peers by FIFO channels.
//!
//! ```
//! use qpage_transport::{Communicator, LocalCluster, LocalOptions, Rank, Tag};
//! use num_complex::Complex64;
//!
//! let results = LocalCluster::run(2, LocalOptions::default(), |substrate| {
//!     let comm = Communicator::new(substrate)?;
//!     let datatype = comm.datatype_of::<Complex64>()?;
//!     let send = vec![Complex64::new(comm.rank().index() as f64, 0.0)];
//!     let mut receive = vec![Complex64::new(0.0, 0.0)];
//!     let peer = Rank::new(comm.rank().index() ^ 1);
//!     comm.send_receive(&send, &mut receive, &datatype, peer, Tag::new(7))?;
//!     Ok::<_, qpage_transport::TransportError>(receive[0].re)
//! })
//! .unwrap();
//! assert_eq!(results[0].as_ref().unwrap(), &1.0);
//! assert_eq!(results[1].as_ref().unwrap(), &0.0);
//! ```

pub mod communicator;
pub mod datatype;
pub mod environment;
pub mod error;
pub mod fault;
pub mod local;
pub mod rank;
pub mod substrate;

pub use communicator::Communicator;
pub use datatype::{Datatype, ElementLayout, Payload, PayloadElement, ScalarKind};
pub use environment::{Environment, Lifecycle, Phase};
pub use error::{Result, Role, TransportError};
pub use fault::{FaultPlan, FaultPoint, FaultySubstrate};
pub use local::{LocalCluster, LocalOptions, LocalSubstrate};
pub use rank::{Rank, Tag};
pub use substrate::{DatatypeHandle, Envelope, ErrorCode, ReceiveSpec, Substrate, SubstrateResult};
