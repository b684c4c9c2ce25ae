//! Dense matrix kernels over one page
//!
//! All kernels take bit positions inside the page. Matrix index bit
//! `k - 1 - m` corresponds to `positions[m]`. Work is split into blocks
//! of `2^(max position + 1)` amplitudes, each holding whole amplitude
//! groups, which is what makes the rayon path safe.

pub mod bits;
pub mod dense;
pub mod projection;
pub mod single_qubit;
pub mod two_qubit;

use num_complex::Complex;
use qpage_core::{Matrix, Real};
use rayon::prelude::*;

/// Apply `matrix` on `positions` of one page
pub fn apply_matrix<T: Real>(
    page: &mut [Complex<T>],
    matrix: &Matrix<T>,
    positions: &[usize],
    parallel: bool,
) {
    debug_assert_eq!(matrix.num_qubits(), positions.len());
    match positions.len() {
        0 => {}
        1 => single_qubit::apply(page, &single_qubit::entries(matrix), positions[0], parallel),
        2 => two_qubit::apply(page, matrix, [positions[0], positions[1]], parallel),
        _ => dense::apply(page, matrix, positions, parallel),
    }
}

/// Apply `matrix` on `positions` of every page
///
/// Pages run in parallel when the total amplitude count reaches
/// `parallel_threshold`; a single large page parallelizes internally.
pub fn apply_to_pages<T: Real>(
    pages: &mut [Vec<Complex<T>>],
    matrix: &Matrix<T>,
    positions: &[usize],
    parallel_threshold: usize,
) {
    let total: usize = pages.iter().map(Vec::len).sum();
    let parallel = total >= parallel_threshold;
    if parallel && pages.len() > 1 {
        pages
            .par_iter_mut()
            .for_each(|page| apply_matrix(page, matrix, positions, false));
    } else {
        for page in pages.iter_mut() {
            apply_matrix(page, matrix, positions, parallel);
        }
    }
}

/// Run `body` over every block of `2^(top + 1)` amplitudes
#[inline]
pub(crate) fn for_each_block<T, F>(page: &mut [Complex<T>], top: usize, parallel: bool, body: F)
where
    T: Real,
    F: Fn(&mut [Complex<T>]) + Sync + Send,
{
    let block = 1usize << (top + 1);
    debug_assert!(page.len() >= block);
    if parallel && page.len() > block {
        page.par_chunks_mut(block).for_each(body);
    } else {
        page.chunks_mut(block).for_each(body);
    }
}
