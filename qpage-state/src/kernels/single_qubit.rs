//! Single-qubit kernel

use super::for_each_block;
use num_complex::Complex;
use qpage_core::{Matrix, Real};

pub type Matrix2x2<T> = [[Complex<T>; 2]; 2];

/// The four entries of a single-qubit matrix
#[inline]
pub fn entries<T: Real>(matrix: &Matrix<T>) -> Matrix2x2<T> {
    [
        [matrix[(0, 0)], matrix[(0, 1)]],
        [matrix[(1, 0)], matrix[(1, 1)]],
    ]
}

/// Apply a 2x2 gate on bit `position` of the page
pub fn apply<T: Real>(page: &mut [Complex<T>], gate: &Matrix2x2<T>, position: usize, parallel: bool) {
    let stride = 1usize << position;
    let gate = *gate;
    for_each_block(page, position, parallel, move |block| {
        for j in 0..stride {
            let a = block[j];
            let b = block[j + stride];
            block[j] = gate[0][0] * a + gate[0][1] * b;
            block[j + stride] = gate[1][0] * a + gate[1][1] * b;
        }
    });
}
