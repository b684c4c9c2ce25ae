//! Page swap protocol
//!
//! A gate touching page-determining qubits is applied by temporarily
//! swapping each such qubit's bit with a free in-page bit. On a staging
//! copy of the local pages:
//!
//! 1. page-slot bits are swapped in-process;
//! 2. rank bits are swapped by pairwise exchange with every peer of the
//!    rank group, in ascending peer rank;
//! 3. the matrix runs locally on the remapped in-page positions;
//! 4. steps 1 and 2 repeat, which swaps every amplitude back.
//!
//! Only then are the staged pages committed. A transport failure anywhere
//! leaves the authoritative pages and the permutation untouched.

use crate::error::{Result, StateError};
use crate::kernels::{self, bits};
use crate::layout::{BitRole, PageLayout};
use crate::paged_state::PagedState;
use crate::permutation::Permutation;
use num_complex::Complex;
use qpage_core::{Matrix, Qubit, Real};
use qpage_transport::{Communicator, Datatype, Rank, Substrate, Tag};
use smallvec::SmallVec;
use std::time::Instant;
use tracing::{debug, debug_span, trace};

/// Exchange schedule for one page-crossing application
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapPlan {
    /// In-page positions the matrix acts on once swapped, in matrix order
    positions: SmallVec<[usize; 8]>,
    /// `(in-page position, page-slot bit)`
    slot_pairs: SmallVec<[(usize, usize); 4]>,
    /// `(in-page position, rank bit)`
    rank_pairs: SmallVec<[(usize, usize); 4]>,
    /// Ascending; excludes this process
    peers: SmallVec<[usize; 8]>,
}

impl SwapPlan {
    /// Plan the swap of `qubits` under the current permutation
    ///
    /// # Errors
    ///
    /// Returns [`StateError::GateTooWide`] when the gate has more qubits than
    /// a page has bits.
    pub fn new(layout: &PageLayout, permutation: &Permutation, qubits: &[Qubit]) -> Result<Self> {
        let in_page = layout.in_page_qubits();
        if qubits.len() > in_page {
            return Err(StateError::GateTooWide {
                qubits: qubits.len(),
                in_page_qubits: in_page,
            });
        }
        let original: SmallVec<[usize; 8]> = qubits.iter().map(|&q| permutation.position(q)).collect();

        // highest in-page positions the gate does not already use
        let mut free = (0..in_page).rev().filter(|p| !original.contains(p));

        let mut positions = SmallVec::new();
        let mut slot_pairs = SmallVec::new();
        let mut rank_pairs = SmallVec::new();
        for &position in &original {
            match layout.role_of_position(position) {
                BitRole::InPage => positions.push(position),
                role => {
                    let partner = free.next().ok_or(StateError::GateTooWide {
                        qubits: qubits.len(),
                        in_page_qubits: in_page,
                    })?;
                    positions.push(partner);
                    match role {
                        BitRole::PageSlot(bit) => slot_pairs.push((partner, bit)),
                        BitRole::Rank(bit) => rank_pairs.push((partner, bit)),
                        BitRole::InPage => unreachable!(),
                    }
                }
            }
        }

        let mask: usize = rank_pairs.iter().map(|&(_, bit)| 1usize << bit).sum();
        let me = layout.rank();
        let peers = (0..layout.num_processes())
            .filter(|&r| r != me && (r ^ me) & !mask == 0)
            .collect();

        Ok(Self {
            positions,
            slot_pairs,
            rank_pairs,
            peers,
        })
    }

    /// In-page positions the matrix acts on once swapped, in matrix order
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Ranks exchanged with, ascending
    pub fn peers(&self) -> &[usize] {
        &self.peers
    }

    /// `(in-page position, page-slot bit)` pairs swapped in-process
    pub fn slot_pairs(&self) -> &[(usize, usize)] {
        &self.slot_pairs
    }

    /// `(in-page position, rank bit)` pairs swapped with peers
    pub fn rank_pairs(&self) -> &[(usize, usize)] {
        &self.rank_pairs
    }

    /// Amplitudes sent to each peer per exchange round
    pub fn amplitudes_per_peer(&self, layout: &PageLayout) -> usize {
        layout.local_amplitudes() >> self.rank_pairs.len()
    }

    /// Swap every page-slot bit with its in-page partner
    pub fn swap_slots<T: Real>(&self, pages: &mut [Vec<Complex<T>>]) {
        for &(position, bit) in &self.slot_pairs {
            let slot_bit = 1usize << bit;
            let offset_bit = 1usize << position;
            for low in (0..pages.len()).filter(|s| s & slot_bit == 0) {
                let (head, tail) = pages.split_at_mut(low + slot_bit);
                let zero_page = &mut head[low];
                let one_page = &mut tail[0];
                for offset in (0..zero_page.len()).filter(|o| o & offset_bit != 0) {
                    std::mem::swap(&mut zero_page[offset], &mut one_page[offset ^ offset_bit]);
                }
            }
        }
    }

    /// Swap every rank bit with its in-page partner by exchanging with peers
    ///
    /// Returns the number of amplitudes sent.
    pub fn exchange<T: Real, S: Substrate>(
        &self,
        pages: &mut [Vec<Complex<T>>],
        comm: &Communicator<S>,
        datatype: &Datatype,
        tag: Tag,
    ) -> Result<usize> {
        if self.rank_pairs.is_empty() {
            return Ok(0);
        }
        let partners: SmallVec<[usize; 4]> = self.rank_pairs.iter().map(|&(p, _)| p).collect();
        let mut sorted = partners.clone();
        sorted.sort_unstable();
        let page_size = pages.first().map(Vec::len).unwrap_or(0);
        let per_page = page_size >> partners.len();
        let zero = Complex::new(T::zero(), T::zero());
        let mut send = Vec::with_capacity(per_page * pages.len());
        let mut receive = vec![zero; per_page * pages.len()];
        let mut sent = 0;

        for &peer in &self.peers {
            // peer's rank bits land on the partner positions
            let fixed = self
                .rank_pairs
                .iter()
                .fold(0usize, |acc, &(position, bit)| acc | (((peer >> bit) & 1) << position));
            send.clear();
            for page in pages.iter() {
                send.extend((0..per_page).map(|i| page[bits::insert_zero_bits(i, &sorted) | fixed]));
            }
            trace!(peer, amplitudes = send.len(), "page exchange");
            comm.send_receive(&send, &mut receive, datatype, Rank::new(peer), tag)?;
            for (page, chunk) in pages.iter_mut().zip(receive.chunks_exact(per_page)) {
                for (i, &amp) in chunk.iter().enumerate() {
                    page[bits::insert_zero_bits(i, &sorted) | fixed] = amp;
                }
            }
            sent += send.len();
        }
        Ok(sent)
    }
}

impl<T: Real> PagedState<T> {
    /// Apply `matrix` on `qubits` when at least one of them selects a page
    ///
    /// Collective: every process must call it with the same arguments.
    ///
    /// # Errors
    ///
    /// Propagates transport errors unchanged. On error the local pages are
    /// exactly as before the call.
    pub fn apply_page_crossing<S: Substrate>(
        &mut self,
        matrix: &Matrix<T>,
        qubits: &[Qubit],
        comm: &Communicator<S>,
    ) -> Result<()> {
        let plan = SwapPlan::new(self.layout(), self.permutation(), qubits)?;
        let span = debug_span!(
            "page_swap",
            rank = self.layout().rank(),
            qubits = ?qubits,
            peers = ?plan.peers()
        );
        let _guard = span.enter();
        let started = Instant::now();

        let datatype = comm.datatype_of::<Complex<T>>()?;
        let tag = self.next_swap_tag();
        let threshold = self.parallel_threshold();
        let mut staging = self.pages().to_vec();

        plan.swap_slots(&mut staging);
        let mut sent = plan.exchange(&mut staging, comm, &datatype, tag)?;
        kernels::apply_to_pages(&mut staging, matrix, plan.positions(), threshold);
        plan.swap_slots(&mut staging);
        sent += plan.exchange(&mut staging, comm, &datatype, tag.offset(1))?;

        *self.pages_mut() = staging;
        let elapsed = started.elapsed();
        let rounds = 2 * plan.peers().len();
        let metrics = self.metrics_mut();
        metrics.page_crossing_applications += 1;
        metrics.exchanges += rounds;
        metrics.amplitudes_exchanged += sent;
        metrics.swap_time += elapsed;
        debug!(
            exchanges = rounds,
            amplitudes = sent,
            elapsed_us = elapsed.as_micros() as u64,
            "page swap committed"
        );
        Ok(())
    }
}
