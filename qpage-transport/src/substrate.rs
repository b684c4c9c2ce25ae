//! Substrate interface
//!
//! A substrate is the raw message-passing layer. Every call reports
//! success or a native [`ErrorCode`]; the [`Communicator`](crate::Communicator)
//! is the only place those codes are inspected.

use crate::datatype::{ElementLayout, Payload};
use std::fmt;

/// Native substrate error code
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    pub const BUFFER: ErrorCode = ErrorCode(1);
    pub const COUNT: ErrorCode = ErrorCode(2);
    pub const TYPE: ErrorCode = ErrorCode(3);
    pub const TAG: ErrorCode = ErrorCode(4);
    pub const COMM: ErrorCode = ErrorCode(5);
    pub const RANK: ErrorCode = ErrorCode(6);
    pub const ROOT: ErrorCode = ErrorCode(7);
    pub const TRUNCATE: ErrorCode = ErrorCode(15);
    pub const OTHER: ErrorCode = ErrorCode(16);
    pub const INTERN: ErrorCode = ErrorCode(17);
    pub const NOT_INITIALIZED: ErrorCode = ErrorCode(60);
    pub const FINALIZED: ErrorCode = ErrorCode(61);
    pub const TIMEOUT: ErrorCode = ErrorCode(62);
    pub const DISCONNECTED: ErrorCode = ErrorCode(63);

    #[inline]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn value(&self) -> i32 {
        self.0
    }

    pub fn description(&self) -> &'static str {
        match *self {
            ErrorCode::BUFFER => "invalid buffer",
            ErrorCode::COUNT => "invalid count",
            ErrorCode::TYPE => "datatype mismatch",
            ErrorCode::TAG => "tag mismatch",
            ErrorCode::COMM => "invalid communicator",
            ErrorCode::RANK => "invalid rank",
            ErrorCode::ROOT => "invalid root",
            ErrorCode::TRUNCATE => "message truncated",
            ErrorCode::OTHER => "unexpected message",
            ErrorCode::INTERN => "internal error",
            ErrorCode::NOT_INITIALIZED => "environment not initialized",
            ErrorCode::FINALIZED => "environment finalized",
            ErrorCode::TIMEOUT => "receive timed out",
            ErrorCode::DISCONNECTED => "peer disconnected",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.description())
    }
}

pub type SubstrateResult<T> = std::result::Result<T, ErrorCode>;

/// Handle of a committed datatype
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatatypeHandle(pub u32);

/// Point-to-point message
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub tag: i32,
    pub datatype: DatatypeHandle,
    pub payload: Payload,
}

/// What the receiving side of an exchange expects
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReceiveSpec {
    pub tag: i32,
    pub datatype: DatatypeHandle,
    /// Number of elements of the datatype
    pub count: usize,
}

/// Raw message-passing layer
pub trait Substrate: Send {
    /// Whether the environment was ever initialized
    fn initialized(&self) -> SubstrateResult<bool>;

    fn finalized(&self) -> SubstrateResult<bool>;

    fn rank(&self) -> SubstrateResult<usize>;

    fn size(&self) -> SubstrateResult<usize>;

    fn processor_name(&self) -> SubstrateResult<String>;

    /// Register a derived datatype; equal layouts get equal handles on every rank
    fn commit_datatype(&self, layout: ElementLayout) -> SubstrateResult<DatatypeHandle>;

    /// Send `outgoing` to `peer` and receive one message from `peer`
    fn send_receive(
        &self,
        outgoing: Envelope,
        peer: usize,
        expected: ReceiveSpec,
    ) -> SubstrateResult<Envelope>;

    /// Sum of `value` over all ranks, identical on every rank
    fn all_reduce_sum(&self, value: f64) -> SubstrateResult<f64>;

    /// Gather one payload per rank at `root`, in rank order
    ///
    /// Returns `Some` on the root and `None` elsewhere.
    fn gather(&self, payload: Payload, root: usize) -> SubstrateResult<Option<Vec<Payload>>>;

    fn barrier(&self) -> SubstrateResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::TAG.to_string(), "4 (tag mismatch)");
        assert_eq!(ErrorCode::new(999).description(), "unknown error");
    }
}
