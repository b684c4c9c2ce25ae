//! Fault injection
//!
//! [`FaultySubstrate`] forwards to an inner substrate and fails one chosen
//! call with a chosen code. The failing call never reaches the inner
//! substrate, so the peer of a failed exchange sees its partner vanish.

use crate::datatype::{ElementLayout, Payload};
use crate::substrate::{DatatypeHandle, Envelope, ErrorCode, ReceiveSpec, Substrate, SubstrateResult};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultPoint {
    SendReceive,
    AllReduce,
    Gather,
    Barrier,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaultPlan {
    pub point: FaultPoint,
    /// Number of successful calls at `point` before the failing one
    pub after: usize,
    pub code: ErrorCode,
}

impl FaultPlan {
    /// Fail the `n`-th (zero-based) send-receive
    pub fn send_receive(n: usize, code: ErrorCode) -> Self {
        Self {
            point: FaultPoint::SendReceive,
            after: n,
            code,
        }
    }
}

#[derive(Debug)]
pub struct FaultySubstrate<S> {
    inner: S,
    plan: Option<FaultPlan>,
    calls: AtomicUsize,
}

impl<S: Substrate> FaultySubstrate<S> {
    pub fn new(inner: S, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan: Some(plan),
            calls: AtomicUsize::new(0),
        }
    }

    /// Forward everything without failing
    pub fn passthrough(inner: S) -> Self {
        Self {
            inner,
            plan: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Whether the planned fault already fired
    pub fn fired(&self) -> bool {
        self.plan
            .map(|plan| self.calls.load(Ordering::SeqCst) > plan.after)
            .unwrap_or(false)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn intercept(&self, point: FaultPoint) -> SubstrateResult<()> {
        match self.plan {
            Some(plan) if plan.point == point => {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call == plan.after {
                    Err(plan.code)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

impl<S: Substrate> Substrate for FaultySubstrate<S> {
    fn initialized(&self) -> SubstrateResult<bool> {
        self.inner.initialized()
    }

    fn finalized(&self) -> SubstrateResult<bool> {
        self.inner.finalized()
    }

    fn rank(&self) -> SubstrateResult<usize> {
        self.inner.rank()
    }

    fn size(&self) -> SubstrateResult<usize> {
        self.inner.size()
    }

    fn processor_name(&self) -> SubstrateResult<String> {
        self.inner.processor_name()
    }

    fn commit_datatype(&self, layout: ElementLayout) -> SubstrateResult<DatatypeHandle> {
        self.inner.commit_datatype(layout)
    }

    fn send_receive(
        &self,
        outgoing: Envelope,
        peer: usize,
        expected: ReceiveSpec,
    ) -> SubstrateResult<Envelope> {
        self.intercept(FaultPoint::SendReceive)?;
        self.inner.send_receive(outgoing, peer, expected)
    }

    fn all_reduce_sum(&self, value: f64) -> SubstrateResult<f64> {
        self.intercept(FaultPoint::AllReduce)?;
        self.inner.all_reduce_sum(value)
    }

    fn gather(&self, payload: Payload, root: usize) -> SubstrateResult<Option<Vec<Payload>>> {
        self.intercept(FaultPoint::Gather)?;
        self.inner.gather(payload, root)
    }

    fn barrier(&self) -> SubstrateResult<()> {
        self.intercept(FaultPoint::Barrier)?;
        self.inner.barrier()
    }
}
