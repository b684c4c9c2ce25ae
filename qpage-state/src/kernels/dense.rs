//! General k-qubit kernel

use super::bits::{deposit, insert_zero_bits};
use super::for_each_block;
use num_complex::Complex;
use qpage_core::{Matrix, Real};
use smallvec::SmallVec;

pub fn apply<T: Real>(page: &mut [Complex<T>], matrix: &Matrix<T>, positions: &[usize], parallel: bool) {
    let k = positions.len();
    let dim = 1usize << k;
    let mut sorted: SmallVec<[usize; 8]> = positions.iter().copied().collect();
    sorted.sort_unstable();
    let top = sorted[k - 1];
    let offsets: SmallVec<[usize; 64]> = (0..dim).map(|b| deposit(b, positions)).collect();
    let zero = Complex::new(T::zero(), T::zero());

    for_each_block(page, top, parallel, |block| {
        let mut scratch: SmallVec<[Complex<T>; 64]> = SmallVec::from_elem(zero, dim);
        for i in 0..block.len() >> k {
            let base = insert_zero_bits(i, &sorted);
            for (slot, &offset) in scratch.iter_mut().zip(offsets.iter()) {
                *slot = block[base + offset];
            }
            for (r, &offset) in offsets.iter().enumerate() {
                block[base + offset] = matrix
                    .row(r)
                    .iter()
                    .zip(scratch.iter())
                    .fold(zero, |acc, (m, a)| acc + *m * *a);
            }
        }
    });
}
