//! In-process substrate
//!
//! Every rank is a thread. Each ordered pair of ranks shares one FIFO
//! channel, so messages between two ranks arrive in the order they were
//! sent, whatever kind they are. All ranks issue the same sequence of
//! operations, which keeps sends and receives matched.

use crate::datatype::{ElementLayout, Payload};
use crate::environment::{Environment, Lifecycle};
use crate::substrate::{
    DatatypeHandle, Envelope, ErrorCode, ReceiveSpec, Substrate, SubstrateResult,
};
use crate::{Result, TransportError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct LocalOptions {
    /// How long a receive waits before failing with [`ErrorCode::TIMEOUT`]
    pub receive_timeout: Duration,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
enum Packet {
    PointToPoint(Envelope),
    Reduce(f64),
    Gather(Payload),
    Barrier,
}

impl Packet {
    fn kind(&self) -> &'static str {
        match self {
            Packet::PointToPoint(_) => "point-to-point",
            Packet::Reduce(_) => "reduce",
            Packet::Gather(_) => "gather",
            Packet::Barrier => "barrier",
        }
    }
}

#[derive(Debug)]
struct Shared {
    lifecycle: Arc<Lifecycle>,
    datatypes: Mutex<Vec<ElementLayout>>,
    host: String,
}

/// One rank's endpoint of a [`LocalCluster`]
#[derive(Debug)]
pub struct LocalSubstrate {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
    /// indexed by destination rank
    outboxes: Vec<Sender<Packet>>,
    /// indexed by source rank
    inboxes: Vec<Receiver<Packet>>,
    timeout: Duration,
}

/// Launcher for in-process worlds
pub struct LocalCluster;

impl LocalCluster {
    /// Create an initialized world of `size` ranks
    ///
    /// Dropping the returned [`Environment`] finalizes the world; later
    /// substrate calls then fail.
    pub fn launch(size: usize, options: LocalOptions) -> Result<(Environment, Vec<LocalSubstrate>)> {
        if size == 0 {
            return Err(TransportError::substrate("launch", ErrorCode::COMM));
        }
        let lifecycle = Lifecycle::new();
        let shared = Arc::new(Shared {
            lifecycle: Arc::clone(&lifecycle),
            datatypes: Mutex::new(Vec::new()),
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
        });

        // channels[src][dst]
        let mut senders: Vec<Vec<Option<Sender<Packet>>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for src in 0..size {
            let mut row = Vec::with_capacity(size);
            for dst_receivers in receivers.iter_mut() {
                let (tx, rx) = unbounded();
                row.push(Some(tx));
                dst_receivers[src] = Some(rx);
            }
            senders.push(row);
        }

        let substrates = senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalSubstrate {
                rank,
                size,
                shared: Arc::clone(&shared),
                outboxes: outboxes.into_iter().flatten().collect(),
                inboxes: inboxes.into_iter().flatten().collect(),
                timeout: options.receive_timeout,
            })
            .collect();

        let environment = Environment::initialize(lifecycle)?;
        Ok((environment, substrates))
    }

    /// Run `body` once per rank on its own thread and return the results in rank order
    ///
    /// The world is finalized after every rank returned. A panic on any rank
    /// is resumed on the caller.
    pub fn run<R, F>(size: usize, options: LocalOptions, body: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(LocalSubstrate) -> R + Sync,
    {
        let (environment, substrates) = Self::launch(size, options)?;
        let body = &body;
        let results = std::thread::scope(|scope| {
            let handles: Vec<_> = substrates
                .into_iter()
                .map(|substrate| {
                    std::thread::Builder::new()
                        .name(format!("rank-{}", substrate.rank))
                        .spawn_scoped(scope, move || body(substrate))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle {
                    Ok(handle) => match handle.join() {
                        Ok(value) => Ok(value),
                        Err(panic) => std::panic::resume_unwind(panic),
                    },
                    Err(_) => Err(TransportError::substrate("launch", ErrorCode::INTERN)),
                })
                .collect::<Result<Vec<R>>>()
        });
        environment.finalize()?;
        results
    }
}

impl LocalSubstrate {
    fn ensure_active(&self) -> SubstrateResult<()> {
        let lifecycle = &self.shared.lifecycle;
        if !lifecycle.is_initialized() {
            Err(ErrorCode::NOT_INITIALIZED)
        } else if lifecycle.is_finalized() {
            Err(ErrorCode::FINALIZED)
        } else {
            Ok(())
        }
    }

    fn post(&self, peer: usize, packet: Packet) -> SubstrateResult<()> {
        self.outboxes
            .get(peer)
            .ok_or(ErrorCode::RANK)?
            .send(packet)
            .map_err(|_| ErrorCode::DISCONNECTED)
    }

    fn take(&self, peer: usize) -> SubstrateResult<Packet> {
        let inbox = self.inboxes.get(peer).ok_or(ErrorCode::RANK)?;
        inbox.recv_timeout(self.timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ErrorCode::TIMEOUT,
            RecvTimeoutError::Disconnected => ErrorCode::DISCONNECTED,
        })
    }

    fn unexpected(&self, peer: usize, expected: &'static str, got: &Packet) -> ErrorCode {
        warn!(
            rank = self.rank,
            peer,
            expected,
            got = got.kind(),
            "message kind out of sequence"
        );
        ErrorCode::OTHER
    }

    fn others(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(move |&r| r != self.rank)
    }
}

impl Substrate for LocalSubstrate {
    fn initialized(&self) -> SubstrateResult<bool> {
        Ok(self.shared.lifecycle.is_initialized())
    }

    fn finalized(&self) -> SubstrateResult<bool> {
        Ok(self.shared.lifecycle.is_finalized())
    }

    fn rank(&self) -> SubstrateResult<usize> {
        self.ensure_active()?;
        Ok(self.rank)
    }

    fn size(&self) -> SubstrateResult<usize> {
        self.ensure_active()?;
        Ok(self.size)
    }

    fn processor_name(&self) -> SubstrateResult<String> {
        self.ensure_active()?;
        Ok(format!("{}/rank-{}", self.shared.host, self.rank))
    }

    fn commit_datatype(&self, layout: ElementLayout) -> SubstrateResult<DatatypeHandle> {
        self.ensure_active()?;
        let mut registry = self.shared.datatypes.lock();
        let index = match registry.iter().position(|l| *l == layout) {
            Some(index) => index,
            None => {
                registry.push(layout);
                registry.len() - 1
            }
        };
        Ok(DatatypeHandle(index as u32))
    }

    fn send_receive(
        &self,
        outgoing: Envelope,
        peer: usize,
        expected: ReceiveSpec,
    ) -> SubstrateResult<Envelope> {
        self.ensure_active()?;
        if peer >= self.size {
            return Err(ErrorCode::RANK);
        }
        let incoming = if peer == self.rank {
            outgoing
        } else {
            self.post(peer, Packet::PointToPoint(outgoing))?;
            match self.take(peer)? {
                Packet::PointToPoint(envelope) => envelope,
                other => return Err(self.unexpected(peer, "point-to-point", &other)),
            }
        };

        if incoming.tag != expected.tag {
            return Err(ErrorCode::TAG);
        }
        if incoming.datatype != expected.datatype {
            return Err(ErrorCode::TYPE);
        }
        let registry = self.shared.datatypes.lock();
        let layout = registry
            .get(expected.datatype.0 as usize)
            .copied()
            .ok_or(ErrorCode::TYPE)?;
        drop(registry);
        if incoming.payload.scalar() != layout.scalar {
            return Err(ErrorCode::TYPE);
        }
        if incoming.payload.len() != expected.count * layout.components {
            return Err(ErrorCode::TRUNCATE);
        }
        Ok(incoming)
    }

    fn all_reduce_sum(&self, value: f64) -> SubstrateResult<f64> {
        self.ensure_active()?;
        for peer in self.others() {
            self.post(peer, Packet::Reduce(value))?;
        }
        let mut contributions = vec![0.0; self.size];
        contributions[self.rank] = value;
        for peer in self.others() {
            match self.take(peer)? {
                Packet::Reduce(v) => contributions[peer] = v,
                other => return Err(self.unexpected(peer, "reduce", &other)),
            }
        }
        // rank order keeps the sum bit-identical everywhere
        Ok(contributions.iter().sum())
    }

    fn gather(&self, payload: Payload, root: usize) -> SubstrateResult<Option<Vec<Payload>>> {
        self.ensure_active()?;
        if root >= self.size {
            return Err(ErrorCode::ROOT);
        }
        if self.rank != root {
            self.post(root, Packet::Gather(payload))?;
            return Ok(None);
        }
        let mut own = Some(payload);
        let mut gathered = Vec::with_capacity(self.size);
        for peer in 0..self.size {
            if peer == root {
                gathered.push(own.take().ok_or(ErrorCode::INTERN)?);
                continue;
            }
            match self.take(peer)? {
                Packet::Gather(p) => gathered.push(p),
                other => return Err(self.unexpected(peer, "gather", &other)),
            }
        }
        Ok(Some(gathered))
    }

    fn barrier(&self) -> SubstrateResult<()> {
        self.ensure_active()?;
        for peer in self.others() {
            self.post(peer, Packet::Barrier)?;
        }
        for peer in self.others() {
            match self.take(peer)? {
                Packet::Barrier => {}
                other => return Err(self.unexpected(peer, "barrier", &other)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_rejects_empty_world() {
        assert!(LocalCluster::launch(0, LocalOptions::default()).is_err());
    }

    #[test]
    fn test_single_rank_collectives() {
        let (_env, mut substrates) = LocalCluster::launch(1, LocalOptions::default()).unwrap();
        let s = substrates.remove(0);
        assert_eq!(s.all_reduce_sum(2.5), Ok(2.5));
        assert_eq!(s.barrier(), Ok(()));
        let gathered = s.gather(Payload::F64(vec![1.0]), 0).unwrap().unwrap();
        assert_eq!(gathered, vec![Payload::F64(vec![1.0])]);
    }

    #[test]
    fn test_datatype_handles_are_shared() {
        let (_env, substrates) = LocalCluster::launch(2, LocalOptions::default()).unwrap();
        let layout = ElementLayout {
            scalar: crate::ScalarKind::Float64,
            components: 2,
        };
        let a = substrates[0].commit_datatype(layout).unwrap();
        let b = substrates[1].commit_datatype(layout).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_finalized_world_rejects_calls() {
        let (env, substrates) = LocalCluster::launch(2, LocalOptions::default()).unwrap();
        env.finalize().unwrap();
        assert_eq!(substrates[0].rank(), Err(ErrorCode::FINALIZED));
        assert_eq!(substrates[0].initialized(), Ok(true));
        assert_eq!(substrates[1].finalized(), Ok(true));
    }
}
