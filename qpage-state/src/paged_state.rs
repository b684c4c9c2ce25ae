//! The paged state vector

use crate::error::{ConfigurationError, Result, StateError};
use crate::kernels::{self, projection};
use crate::layout::{BitRole, PageLayout};
use crate::metrics::StateMetrics;
use crate::permutation::Permutation;
use num_complex::Complex;
use qpage_core::{Matrix, Qubit, Real};
use qpage_transport::{Communicator, Rank, Substrate, Tag};
use tracing::{debug, info, warn};

/// Default amplitude count above which kernels use rayon
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 14;

/// First tag used by page-swap exchanges
const SWAP_TAG_BASE: i32 = 1 << 10;

/// Where a set of qubits can be handled
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Locality {
    /// Every qubit indexes within a page
    Local,
    /// At least one qubit selects a page
    PageCrossing,
}

/// Outcome of [`PagedState::set`]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Projection {
    /// Projected and renormalized; carries the global probability of the value
    Projected { probability: f64 },
    /// The value has zero probability; the caller must flip the qubit
    Flip,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateOptions {
    /// Logical basis state to start in
    pub initial_value: u64,
    /// `assignment[logical] = physical position`; identity when `None`
    pub initial_permutation: Option<Vec<usize>>,
    pub parallel_threshold: usize,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            initial_value: 0,
            initial_permutation: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// The pages owned by one process
#[derive(Clone, Debug)]
pub struct PagedState<T: Real> {
    layout: PageLayout,
    permutation: Permutation,
    /// indexed by local page slot
    pages: Vec<Vec<Complex<T>>>,
    parallel_threshold: usize,
    swap_epoch: i32,
    metrics: StateMetrics,
}

impl<T: Real> PagedState<T> {
    /// Ground state under the identity permutation
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unsupported page counts or
    /// inconsistent qubit, page and process counts. Nothing is allocated
    /// in that case.
    pub fn initialize(num_qubits: usize, num_pages: usize, rank: usize, num_processes: usize) -> Result<Self> {
        Self::with_options(num_qubits, num_pages, rank, num_processes, &StateOptions::default())
    }

    pub fn with_options(
        num_qubits: usize,
        num_pages: usize,
        rank: usize,
        num_processes: usize,
        options: &StateOptions,
    ) -> Result<Self> {
        let layout = PageLayout::new(num_qubits, num_pages, num_processes, rank)?;
        if num_qubits < 64 && options.initial_value >> num_qubits != 0 {
            return Err(ConfigurationError::InvalidInitialValue {
                value: options.initial_value,
                num_qubits,
            }
            .into());
        }
        let permutation = match &options.initial_permutation {
            None => Permutation::identity(num_qubits),
            Some(assignment) if assignment.len() != num_qubits => {
                return Err(ConfigurationError::InvalidPermutation(format!(
                    "{} positions given for {} qubits",
                    assignment.len(),
                    num_qubits
                ))
                .into())
            }
            Some(assignment) => Permutation::from_assignment(assignment.clone()).map_err(|e| match e {
                StateError::InvalidPermutation(reason) => ConfigurationError::InvalidPermutation(reason),
                other => ConfigurationError::InvalidPermutation(other.to_string()),
            })?,
        };

        let zero = Complex::new(T::zero(), T::zero());
        let mut pages = vec![vec![zero; layout.page_size()]; layout.num_pages()];
        let physical = permutation.to_physical_index(options.initial_value as usize);
        let (owner, slot, offset) = layout.locate(physical);
        if owner == layout.rank() {
            pages[slot][offset] = Complex::new(T::one(), T::zero());
        }

        info!(
            rank,
            num_qubits,
            num_pages,
            num_processes,
            in_page_qubits = layout.in_page_qubits(),
            page_size = layout.page_size(),
            "paged state initialized"
        );

        Ok(Self {
            layout,
            permutation,
            pages,
            parallel_threshold: options.parallel_threshold,
            swap_epoch: 0,
            metrics: StateMetrics::default(),
        })
    }

    /// Initialize with rank and process count taken from a communicator
    pub fn for_communicator<S: Substrate>(
        comm: &Communicator<S>,
        num_qubits: usize,
        num_pages: usize,
        options: &StateOptions,
    ) -> Result<Self> {
        Self::with_options(num_qubits, num_pages, comm.rank().index(), comm.size(), options)
    }

    #[inline]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[inline]
    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.layout.num_qubits()
    }

    /// Pages held by this process
    #[inline]
    pub fn num_pages(&self) -> usize {
        self.layout.num_pages()
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    /// Local pages indexed by slot, each in physical offset order
    pub fn pages(&self) -> &[Vec<Complex<T>>] {
        &self.pages
    }

    /// One local page
    ///
    /// # Panics
    ///
    /// Panics if `slot >= self.num_pages()`.
    pub fn page(&self, slot: usize) -> &[Complex<T>] {
        &self.pages[slot]
    }

    /// Counters accumulated since initialization
    pub fn metrics(&self) -> &StateMetrics {
        &self.metrics
    }

    /// Page size from which kernels sweep in parallel
    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub fn set_parallel_threshold(&mut self, threshold: usize) {
        self.parallel_threshold = threshold;
    }

    /// Whether `qubit` currently selects a page
    #[inline]
    pub fn is_page_qubit(&self, qubit: Qubit) -> bool {
        self.layout.is_page_determining(self.permutation.position(qubit))
    }

    pub fn classify(&self, qubits: &[Qubit]) -> Locality {
        if qubits.iter().any(|&q| self.is_page_qubit(q)) {
            Locality::PageCrossing
        } else {
            Locality::Local
        }
    }

    /// Reject qubits outside the register
    pub fn check_qubits(&self, qubits: &[Qubit]) -> Result<()> {
        match qubits.iter().find(|q| q.index() >= self.num_qubits()) {
            Some(&qubit) => Err(StateError::InvalidQubit {
                qubit,
                num_qubits: self.num_qubits(),
            }),
            None => Ok(()),
        }
    }

    /// Apply `matrix` on in-page `qubits` of every owned page
    ///
    /// # Panics
    ///
    /// Panics if any qubit is page-determining. Callers classify first.
    pub fn local_apply(&mut self, matrix: &Matrix<T>, qubits: &[Qubit]) {
        let positions: smallvec::SmallVec<[usize; 8]> = qubits
            .iter()
            .map(|&q| {
                let position = self.permutation.position(q);
                assert!(
                    !self.layout.is_page_determining(position),
                    "local_apply called on page-determining qubit {}",
                    q
                );
                position
            })
            .collect();
        kernels::apply_to_pages(&mut self.pages, matrix, &positions, self.parallel_threshold);
        self.metrics.local_applications += 1;
    }

    /// Replace the permutation and re-index local amplitudes
    ///
    /// In-page and page-slot positions may be reassigned freely. Rank
    /// positions must keep their logical qubit, so page ownership across
    /// processes is untouched and no communication happens.
    pub fn permute(&mut self, assignment: Vec<usize>) -> Result<()> {
        if assignment.len() != self.num_qubits() {
            return Err(StateError::InvalidPermutation(format!(
                "{} positions given for {} qubits",
                assignment.len(),
                self.num_qubits()
            )));
        }
        let next = Permutation::from_assignment(assignment)?;
        let local_qubits = self.layout.local_qubits();
        for position in local_qubits..self.num_qubits() {
            let qubit = self.permutation.qubit_at(position);
            if next.position(qubit) != position {
                return Err(StateError::InvalidPermutation(format!(
                    "{} holds rank position {} and cannot move",
                    qubit, position
                )));
            }
        }

        // (old bit, new bit) for every local position that moves
        let moves: Vec<(usize, usize)> = (0..local_qubits)
            .map(|old| (old, next.position(self.permutation.qubit_at(old))))
            .filter(|(old, new)| old != new)
            .collect();
        if !moves.is_empty() {
            let q = self.layout.in_page_qubits();
            let page_mask = self.page_size() - 1;
            let zero = Complex::new(T::zero(), T::zero());
            let mut reordered = vec![vec![zero; self.page_size()]; self.num_pages()];
            for (slot, page) in self.pages.iter().enumerate() {
                for (offset, &amp) in page.iter().enumerate() {
                    let old_local = (slot << q) | offset;
                    let mut new_local = old_local;
                    for &(old, _) in &moves {
                        new_local &= !(1 << old);
                    }
                    for &(old, new) in &moves {
                        new_local |= ((old_local >> old) & 1) << new;
                    }
                    reordered[new_local >> q][new_local & page_mask] = amp;
                }
            }
            self.pages = reordered;
        }
        debug!(moved = moves.len(), "permutation updated");
        self.permutation = next;
        self.metrics.permutations += 1;
        Ok(())
    }

    /// Record the completion of a fused block
    pub fn end_fusion(&mut self) {
        self.metrics.fusions_completed += 1;
    }

    /// Project `qubit` onto `value` across all processes and renormalize
    ///
    /// All processes must call this together. When `value` has zero global
    /// probability nothing changes and [`Projection::Flip`] asks the caller
    /// to apply X through the regular dispatch path.
    pub fn set<S: Substrate>(&mut self, qubit: Qubit, value: bool, comm: &Communicator<S>) -> Result<Projection> {
        self.check_qubits(&[qubit])?;
        let position = self.permutation.position(qubit);
        let role = self.layout.role_of_position(position);
        let rank = self.layout.rank();

        let local: T = match role {
            BitRole::InPage => self
                .pages
                .iter()
                .map(|page| projection::probability(page, position, value))
                .sum(),
            BitRole::PageSlot(bit) => self
                .pages
                .iter()
                .enumerate()
                .filter(|(slot, _)| ((slot >> bit) & 1 == 1) == value)
                .map(|(_, page)| projection::norm_sqr(page))
                .sum(),
            BitRole::Rank(bit) if ((rank >> bit) & 1 == 1) == value => self.local_norm_sqr(),
            BitRole::Rank(_) => T::zero(),
        };
        let probability = comm.all_reduce_sum(local.widen())?;
        if probability <= T::tolerance().widen() {
            warn!(qubit = %qubit, value, "requested value has zero probability, flipping");
            return Ok(Projection::Flip);
        }

        let scale = T::narrow(probability.sqrt().recip());
        let parallel = self.layout.local_amplitudes() >= self.parallel_threshold;
        let zero = Complex::new(T::zero(), T::zero());
        match role {
            BitRole::InPage => {
                for page in self.pages.iter_mut() {
                    projection::project(page, position, value, scale, parallel);
                }
            }
            BitRole::PageSlot(bit) => {
                for (slot, page) in self.pages.iter_mut().enumerate() {
                    if ((slot >> bit) & 1 == 1) == value {
                        projection::scale(page, scale);
                    } else {
                        page.fill(zero);
                    }
                }
            }
            BitRole::Rank(bit) => {
                let keep = ((rank >> bit) & 1 == 1) == value;
                for page in self.pages.iter_mut() {
                    if keep {
                        projection::scale(page, scale);
                    } else {
                        page.fill(zero);
                    }
                }
            }
        }
        self.metrics.projections += 1;
        Ok(Projection::Projected { probability })
    }

    /// Amplitude of a logical basis state, if this process owns it
    pub fn amplitude(&self, logical_index: usize) -> Option<Complex<T>> {
        if logical_index >> self.num_qubits() != 0 {
            return None;
        }
        let physical = self.permutation.to_physical_index(logical_index);
        let (owner, slot, offset) = self.layout.locate(physical);
        (owner == self.layout.rank()).then(|| self.pages[slot][offset])
    }

    pub fn local_norm_sqr(&self) -> T {
        self.pages.iter().map(|page| projection::norm_sqr(page)).sum()
    }

    /// Gather the full state vector at the root, in logical index order
    ///
    /// Collective: every process must call it. Returns `Some` on the root
    /// and `None` elsewhere.
    pub fn collect_state_vector<S: Substrate>(&self, comm: &Communicator<S>) -> Result<Option<Vec<Complex<T>>>> {
        let local: Vec<Complex<T>> = self.pages.iter().flatten().copied().collect();
        if !comm.is_root() {
            comm.contribute(&local, Rank::ROOT)?;
            return Ok(None);
        }
        let parts = comm.collect(&local, Rank::ROOT)?;
        let shift = self.layout.local_qubits();
        let zero = Complex::new(T::zero(), T::zero());
        let mut full = vec![zero; 1 << self.num_qubits()];
        for (rank, part) in parts.iter().enumerate() {
            for (local_index, &amp) in part.iter().enumerate() {
                let physical = (rank << shift) | local_index;
                full[self.permutation.to_logical_index(physical)] = amp;
            }
        }
        Ok(Some(full))
    }

    pub(crate) fn pages_mut(&mut self) -> &mut Vec<Vec<Complex<T>>> {
        &mut self.pages
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut StateMetrics {
        &mut self.metrics
    }

    /// Tag pair for the next page swap, identical on every process
    pub(crate) fn next_swap_tag(&mut self) -> Tag {
        let tag = Tag::new(SWAP_TAG_BASE).offset(self.swap_epoch);
        self.swap_epoch = self.swap_epoch.wrapping_add(2) & (i32::MAX >> 1);
        tag
    }
}
