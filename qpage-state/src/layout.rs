//! Page layout
//!
//! The bits of a physical amplitude index split into three bands, lowest
//! first:
//!
//! ```text
//!  | rank bits | page-slot bits | in-page offset bits |
//!  n-1        q+p-1            q-1                   0
//! ```
//!
//! A page is the block of `2^q` amplitudes sharing the upper `p + g` bits.
//! Rank `r` owns the `2^p` consecutive pages `r * 2^p .. (r + 1) * 2^p`, so
//! every page has exactly one owner.

use crate::error::ConfigurationError;
use std::ops::Range;

/// Page counts per process the state vector accepts
pub const SUPPORTED_PAGE_COUNTS: [usize; 4] = [1, 2, 4, 8];

/// Smallest in-page width; every built-in gate fits in a page
pub const MIN_IN_PAGE_QUBITS: usize = 3;

/// Widest register whose full index still fits in a `usize`
pub const MAX_QUBITS: usize = usize::BITS as usize - 1;

/// Role of one physical bit position
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitRole {
    InPage,
    /// Selects one of this process's pages; carries the slot bit
    PageSlot(usize),
    /// Selects the owning process; carries the rank bit
    Rank(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PageLayout {
    num_qubits: usize,
    in_page_qubits: usize,
    page_slot_qubits: usize,
    rank_qubits: usize,
    rank: usize,
}

impl PageLayout {
    /// Validate and build the layout for one rank
    ///
    /// # Errors
    ///
    /// Rejects registers wider than [`MAX_QUBITS`], unsupported page counts,
    /// process counts that are not powers of two, ranks outside the world
    /// and pages narrower than [`MIN_IN_PAGE_QUBITS`].
    pub fn new(
        num_qubits: usize,
        num_pages: usize,
        num_processes: usize,
        rank: usize,
    ) -> Result<Self, ConfigurationError> {
        if num_qubits > MAX_QUBITS {
            return Err(ConfigurationError::TooManyQubits {
                num_qubits,
                max: MAX_QUBITS,
            });
        }
        if !SUPPORTED_PAGE_COUNTS.contains(&num_pages) {
            return Err(ConfigurationError::UnsupportedPageCount { num_pages });
        }
        if num_processes == 0 || !num_processes.is_power_of_two() {
            return Err(ConfigurationError::ProcessCountNotPowerOfTwo {
                size: num_processes,
            });
        }
        if rank >= num_processes {
            return Err(ConfigurationError::InvalidRank {
                rank,
                size: num_processes,
            });
        }
        let page_slot_qubits = num_pages.trailing_zeros() as usize;
        let rank_qubits = num_processes.trailing_zeros() as usize;
        let available = num_qubits.saturating_sub(page_slot_qubits + rank_qubits);
        if num_qubits < page_slot_qubits + rank_qubits + MIN_IN_PAGE_QUBITS {
            return Err(ConfigurationError::PageTooSmall {
                num_qubits,
                num_pages,
                num_processes,
                available,
                required: MIN_IN_PAGE_QUBITS,
            });
        }
        Ok(Self {
            num_qubits,
            in_page_qubits: available,
            page_slot_qubits,
            rank_qubits,
            rank,
        })
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    #[inline]
    pub fn in_page_qubits(&self) -> usize {
        self.in_page_qubits
    }

    #[inline]
    pub fn page_slot_qubits(&self) -> usize {
        self.page_slot_qubits
    }

    #[inline]
    pub fn rank_qubits(&self) -> usize {
        self.rank_qubits
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Pages owned by each process
    #[inline]
    pub fn num_pages(&self) -> usize {
        1 << self.page_slot_qubits
    }

    #[inline]
    pub fn num_processes(&self) -> usize {
        1 << self.rank_qubits
    }

    /// Amplitudes per page
    #[inline]
    pub fn page_size(&self) -> usize {
        1 << self.in_page_qubits
    }

    #[inline]
    pub fn total_pages(&self) -> usize {
        1 << (self.page_slot_qubits + self.rank_qubits)
    }

    /// Amplitudes held by this process
    #[inline]
    pub fn local_amplitudes(&self) -> usize {
        self.page_size() * self.num_pages()
    }

    /// Number of process-local bit positions (in-page plus page-slot)
    #[inline]
    pub fn local_qubits(&self) -> usize {
        self.in_page_qubits + self.page_slot_qubits
    }

    pub fn role_of_position(&self, position: usize) -> BitRole {
        debug_assert!(position < self.num_qubits);
        if position < self.in_page_qubits {
            BitRole::InPage
        } else if position < self.local_qubits() {
            BitRole::PageSlot(position - self.in_page_qubits)
        } else {
            BitRole::Rank(position - self.local_qubits())
        }
    }

    #[inline]
    pub fn is_page_determining(&self, position: usize) -> bool {
        position >= self.in_page_qubits
    }

    /// Global page indices owned by `rank`
    pub fn pages_of(&self, rank: usize) -> Range<usize> {
        let first = rank << self.page_slot_qubits;
        first..first + self.num_pages()
    }

    /// Global page indices owned by this process
    pub fn owned_pages(&self) -> Range<usize> {
        self.pages_of(self.rank)
    }

    /// `(owner rank, local slot)` of a global page
    pub fn owner_of_page(&self, global_page: usize) -> (usize, usize) {
        (
            global_page >> self.page_slot_qubits,
            global_page & (self.num_pages() - 1),
        )
    }

    /// Physical index of `(slot, offset)` on `rank`
    #[inline]
    pub fn physical_index(&self, rank: usize, slot: usize, offset: usize) -> usize {
        (((rank << self.page_slot_qubits) | slot) << self.in_page_qubits) | offset
    }

    /// `(rank, slot, offset)` holding a physical index
    #[inline]
    pub fn locate(&self, physical_index: usize) -> (usize, usize, usize) {
        let offset = physical_index & (self.page_size() - 1);
        let (rank, slot) = self.owner_of_page(physical_index >> self.in_page_qubits);
        (rank, slot, offset)
    }
}
