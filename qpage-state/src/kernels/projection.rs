//! Basis projection helpers used by SET and CLEAR

use super::for_each_block;
use num_complex::Complex;
use qpage_core::Real;

/// Probability mass of amplitudes whose bit `position` equals `value`
pub fn probability<T: Real>(page: &[Complex<T>], position: usize, value: bool) -> T {
    let bit = 1usize << position;
    page.iter()
        .enumerate()
        .filter(|(i, _)| ((i & bit) != 0) == value)
        .map(|(_, a)| a.norm_sqr())
        .sum()
}

/// Zero amplitudes whose bit differs from `value`, scale the others
pub fn project<T: Real>(page: &mut [Complex<T>], position: usize, value: bool, scale: T, parallel: bool) {
    let stride = 1usize << position;
    let zero = Complex::new(T::zero(), T::zero());
    for_each_block(page, position, parallel, move |block| {
        let (low, high) = block.split_at_mut(stride);
        let (keep, drop) = if value { (high, low) } else { (low, high) };
        for a in keep.iter_mut() {
            *a = *a * scale;
        }
        for a in drop.iter_mut() {
            *a = zero;
        }
    });
}

pub fn scale<T: Real>(page: &mut [Complex<T>], factor: T) {
    for a in page.iter_mut() {
        *a = *a * factor;
    }
}

pub fn norm_sqr<T: Real>(page: &[Complex<T>]) -> T {
    page.iter().map(|a| a.norm_sqr()).sum()
}
