//! Two-qubit kernel

use super::bits::insert_zero_bits;
use super::for_each_block;
use num_complex::Complex;
use qpage_core::{Matrix, Real};

/// Apply a 4x4 gate on `[high, low]` matrix bit positions of the page
pub fn apply<T: Real>(page: &mut [Complex<T>], matrix: &Matrix<T>, positions: [usize; 2], parallel: bool) {
    let [p0, p1] = positions;
    debug_assert_ne!(p0, p1);
    let sorted = if p0 < p1 { [p0, p1] } else { [p1, p0] };
    let mut gate = [[Complex::new(T::zero(), T::zero()); 4]; 4];
    for (r, row) in gate.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = matrix[(r, c)];
        }
    }
    let offsets = [0, 1 << p1, 1 << p0, (1 << p0) | (1 << p1)];

    for_each_block(page, sorted[1], parallel, move |block| {
        for i in 0..block.len() >> 2 {
            let base = insert_zero_bits(i, &sorted);
            let a = [
                block[base + offsets[0]],
                block[base + offsets[1]],
                block[base + offsets[2]],
                block[base + offsets[3]],
            ];
            for (row, &offset) in gate.iter().zip(offsets.iter()) {
                block[base + offset] = row[0] * a[0] + row[1] * a[1] + row[2] * a[2] + row[3] * a[3];
            }
        }
    });
}
