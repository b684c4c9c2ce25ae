//! Dense square operators over a small set of qubits
//!
//! A [`Matrix`] acting on `k` qubits is a `2^k x 2^k` row-major array.
//! For a target list `[q0, q1, ..]`, `q0` is the most significant bit of
//! the row/column index.

use crate::{CoreError, Qubit, Real, Result};
use num_complex::Complex;
use std::ops::Index;

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T = f64> {
    num_qubits: usize,
    data: Vec<Complex<T>>,
}

impl<T: Real> Matrix<T> {
    /// Identity on `num_qubits` qubits
    pub fn identity(num_qubits: usize) -> Self {
        let dim = 1usize << num_qubits;
        let mut data = vec![Complex::new(T::zero(), T::zero()); dim * dim];
        for i in 0..dim {
            data[i * dim + i] = Complex::new(T::one(), T::zero());
        }
        Self { num_qubits, data }
    }

    /// Build from row-major elements
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMatrix`] unless `data.len()` is `4^k` for some `k >= 1`.
    pub fn from_row_major(data: Vec<Complex<T>>) -> Result<Self> {
        let len = data.len();
        let dim = (len as f64).sqrt().round() as usize;
        if dim < 2 || dim * dim != len || !dim.is_power_of_two() {
            return Err(CoreError::InvalidMatrix(format!(
                "{} elements do not form a 2^k x 2^k matrix",
                len
            )));
        }
        Ok(Self {
            num_qubits: dim.trailing_zeros() as usize,
            data,
        })
    }

    pub(crate) fn from_parts(num_qubits: usize, data: Vec<Complex<T>>) -> Self {
        debug_assert_eq!(data.len(), 1 << (2 * num_qubits));
        Self { num_qubits, data }
    }

    pub fn from_2x2(m: &[[Complex<T>; 2]; 2]) -> Self {
        Self {
            num_qubits: 1,
            data: m.iter().flatten().copied().collect(),
        }
    }

    pub fn from_4x4(m: &[[Complex<T>; 4]; 4]) -> Self {
        Self {
            num_qubits: 2,
            data: m.iter().flatten().copied().collect(),
        }
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    #[inline]
    pub fn dim(&self) -> usize {
        1 << self.num_qubits
    }

    #[inline]
    pub fn as_slice(&self) -> &[Complex<T>] {
        &self.data
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[Complex<T>] {
        let dim = self.dim();
        &self.data[row * dim..(row + 1) * dim]
    }

    /// Matrix product `self * rhs`: `rhs` acts first
    pub fn matmul(&self, rhs: &Matrix<T>) -> Result<Self> {
        if self.num_qubits != rhs.num_qubits {
            return Err(CoreError::DimensionMismatch {
                matrix_qubits: rhs.num_qubits,
                qubits: self.num_qubits,
            });
        }
        let dim = self.dim();
        let zero = Complex::new(T::zero(), T::zero());
        let mut data = vec![zero; dim * dim];
        for i in 0..dim {
            for k in 0..dim {
                let a = self.data[i * dim + k];
                if a == zero {
                    continue;
                }
                for j in 0..dim {
                    data[i * dim + j] = data[i * dim + j] + a * rhs.data[k * dim + j];
                }
            }
        }
        Ok(Self {
            num_qubits: self.num_qubits,
            data,
        })
    }

    /// Conjugate transpose
    pub fn adjoint(&self) -> Self {
        let dim = self.dim();
        let mut data = self.data.clone();
        for i in 0..dim {
            for j in 0..dim {
                data[j * dim + i] = self.data[i * dim + j].conj();
            }
        }
        Self {
            num_qubits: self.num_qubits,
            data,
        }
    }

    /// Element-wise comparison with absolute tolerance
    pub fn approx_eq(&self, other: &Matrix<T>, epsilon: T) -> bool {
        self.num_qubits == other.num_qubits
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (*a - *b).norm() <= epsilon)
    }

    pub fn is_identity(&self, epsilon: T) -> bool {
        self.approx_eq(&Self::identity(self.num_qubits), epsilon)
    }

    /// Check `U * U^dagger == I` within tolerance
    pub fn is_unitary(&self, epsilon: T) -> bool {
        match self.matmul(&self.adjoint()) {
            Ok(product) => product.is_identity(epsilon),
            Err(_) => false,
        }
    }

    /// Convert to another scalar precision
    pub fn cast<U: Real>(&self) -> Matrix<U> {
        Matrix {
            num_qubits: self.num_qubits,
            data: self
                .data
                .iter()
                .map(|c| Complex::new(U::narrow(c.re.widen()), U::narrow(c.im.widen())))
                .collect(),
        }
    }

    /// Embed an operator on `own` into the larger qubit list `target`
    ///
    /// Every qubit of `own` must occur in `target`. The result acts as the
    /// identity on the qubits of `target` missing from `own`.
    ///
    /// # Errors
    ///
    /// Returns an error if `own` does not match the matrix size or is not
    /// contained in `target`.
    pub fn expand(&self, own: &[Qubit], target: &[Qubit]) -> Result<Self> {
        if own.len() != self.num_qubits {
            return Err(CoreError::DimensionMismatch {
                matrix_qubits: self.num_qubits,
                qubits: own.len(),
            });
        }
        let width = target.len();
        let mut own_bits = Vec::with_capacity(own.len());
        for qubit in own {
            let pos = target
                .iter()
                .position(|t| t == qubit)
                .ok_or_else(|| CoreError::InvalidMatrix(format!("{} missing from target set", qubit)))?;
            own_bits.push(width - 1 - pos);
        }
        if own == target {
            return Ok(self.clone());
        }

        let k = own.len();
        let own_mask: usize = own_bits.iter().map(|b| 1usize << b).sum();
        let extract = |index: usize| -> usize {
            own_bits
                .iter()
                .enumerate()
                .map(|(m, &bit)| ((index >> bit) & 1) << (k - 1 - m))
                .sum()
        };

        let dim = 1usize << width;
        let small_dim = self.dim();
        let mut data = vec![Complex::new(T::zero(), T::zero()); dim * dim];
        for row in 0..dim {
            let r = extract(row);
            let rest = row & !own_mask;
            for c in 0..small_dim {
                // columns sharing the row's untouched bits
                let mut col = rest;
                for (m, &bit) in own_bits.iter().enumerate() {
                    col |= ((c >> (k - 1 - m)) & 1) << bit;
                }
                data[row * dim + col] = self.data[r * small_dim + c];
            }
        }
        Ok(Self {
            num_qubits: width,
            data,
        })
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = Complex<T>;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.data[(row << self.num_qubits) + col]
    }
}
