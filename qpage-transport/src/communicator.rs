//! Checked adapter over a substrate

use crate::datatype::{Datatype, ElementLayout, PayloadElement};
use crate::substrate::{Envelope, ErrorCode, ReceiveSpec, Substrate, SubstrateResult};
use crate::{Rank, Result, Role, Tag, TransportError};
use tracing::trace;

#[inline]
fn checked<T>(operation: &'static str, result: SubstrateResult<T>) -> Result<T> {
    result.map_err(|code| TransportError::substrate(operation, code))
}

/// The simulator's only entry point into the substrate
///
/// Holds no page data. Rank and size are queried once at construction.
#[derive(Debug)]
pub struct Communicator<S> {
    substrate: S,
    rank: Rank,
    size: usize,
}

impl<S: Substrate> Communicator<S> {
    /// Wrap a substrate, querying rank and size
    ///
    /// # Errors
    ///
    /// Returns a transport error if either query fails.
    pub fn new(substrate: S) -> Result<Self> {
        let rank = checked("rank", substrate.rank())?;
        let size = checked("size", substrate.size())?;
        if rank >= size {
            return Err(TransportError::substrate("rank", ErrorCode::RANK));
        }
        Ok(Self {
            substrate,
            rank: Rank::new(rank),
            size,
        })
    }

    #[inline]
    pub fn rank(&self) -> Rank {
        self.rank
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.rank.is_root()
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    pub fn into_substrate(self) -> S {
        self.substrate
    }

    pub fn is_initialized(&self) -> Result<bool> {
        checked("is_initialized", self.substrate.initialized())
    }

    pub fn is_finalized(&self) -> Result<bool> {
        checked("is_finalized", self.substrate.finalized())
    }

    pub fn processor_name(&self) -> Result<String> {
        checked("processor_name", self.substrate.processor_name())
    }

    /// Derive and commit a datatype for an element layout
    pub fn describe_datatype(&self, layout: ElementLayout) -> Result<Datatype> {
        if layout.components == 0 {
            return Err(TransportError::substrate("describe_datatype", ErrorCode::TYPE));
        }
        let handle = checked("describe_datatype", self.substrate.commit_datatype(layout))?;
        Ok(Datatype { handle, layout })
    }

    pub fn datatype_of<E: PayloadElement>(&self) -> Result<Datatype> {
        self.describe_datatype(E::layout())
    }

    /// Send `send` to `peer` and fill `receive` with the peer's message
    ///
    /// Blocks until both directions complete. The peer must make the
    /// matching call with the same tag, datatype and element count.
    pub fn send_receive<E: PayloadElement>(
        &self,
        send: &[E],
        receive: &mut [E],
        datatype: &Datatype,
        peer: Rank,
        tag: Tag,
    ) -> Result<()> {
        const OP: &str = "send_receive";
        if datatype.layout != E::layout() {
            return Err(TransportError::substrate(OP, ErrorCode::TYPE));
        }
        if peer.index() >= self.size {
            return Err(TransportError::substrate(OP, ErrorCode::RANK));
        }
        if send.len() != receive.len() {
            return Err(TransportError::substrate(OP, ErrorCode::COUNT));
        }

        trace!(peer = %peer, tag = %tag, elements = send.len(), "send_receive");
        let outgoing = Envelope {
            tag: tag.value(),
            datatype: datatype.handle,
            payload: E::to_payload(send),
        };
        let expected = ReceiveSpec {
            tag: tag.value(),
            datatype: datatype.handle,
            count: receive.len(),
        };
        let incoming = checked(OP, self.substrate.send_receive(outgoing, peer.index(), expected))?;
        if !E::read_payload(&incoming.payload, receive) {
            return Err(TransportError::substrate(OP, ErrorCode::TRUNCATE));
        }
        Ok(())
    }

    /// Global sum, identical on every rank
    pub fn all_reduce_sum(&self, value: f64) -> Result<f64> {
        trace!(value, "all_reduce_sum");
        checked("all_reduce_sum", self.substrate.all_reduce_sum(value))
    }

    pub fn barrier(&self) -> Result<()> {
        checked("barrier", self.substrate.barrier())
    }

    /// Root side of a gather: every rank's `local`, in rank order
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RoleViolation`] when called on a non-root
    /// rank, without touching the substrate.
    pub fn collect<E: PayloadElement>(&self, local: &[E], root: Rank) -> Result<Vec<Vec<E>>> {
        const OP: &str = "collect";
        if self.rank != root {
            return Err(TransportError::RoleViolation {
                operation: OP,
                rank: self.rank,
                required: Role::Root,
            });
        }
        let payloads = checked(OP, self.substrate.gather(E::to_payload(local), root.index()))?
            .ok_or_else(|| TransportError::substrate(OP, ErrorCode::ROOT))?;
        payloads
            .iter()
            .map(|p| E::from_payload(p).ok_or_else(|| TransportError::substrate(OP, ErrorCode::TYPE)))
            .collect()
    }

    /// Non-root side of a gather
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RoleViolation`] when called on the root.
    pub fn contribute<E: PayloadElement>(&self, local: &[E], root: Rank) -> Result<()> {
        const OP: &str = "contribute";
        if self.rank == root {
            return Err(TransportError::RoleViolation {
                operation: OP,
                rank: self.rank,
                required: Role::NonRoot,
            });
        }
        checked(OP, self.substrate.gather(E::to_payload(local), root.index()))?;
        Ok(())
    }
}
