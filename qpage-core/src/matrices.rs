//! Standard gate matrices
//!
//! Fixed gates are compile-time constants; parameterized gates are built on
//! demand. Multi-qubit matrices list the first qubit as the most significant
//! index bit, so `CNOT` is ordered `[control, target]`.

use crate::Matrix;
use num_complex::Complex64;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);
const NEG_I: Complex64 = Complex64::new(0.0, -1.0);
const NEG_ONE: Complex64 = Complex64::new(-1.0, 0.0);

const INV_SQRT2: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// H = 1/√2 * [[1, 1], [1, -1]]
pub const HADAMARD: [[Complex64; 2]; 2] = [
    [Complex64::new(INV_SQRT2, 0.0), Complex64::new(INV_SQRT2, 0.0)],
    [Complex64::new(INV_SQRT2, 0.0), Complex64::new(-INV_SQRT2, 0.0)],
];

pub const PAULI_X: [[Complex64; 2]; 2] = [[ZERO, ONE], [ONE, ZERO]];

pub const PAULI_Y: [[Complex64; 2]; 2] = [[ZERO, NEG_I], [I, ZERO]];

pub const PAULI_Z: [[Complex64; 2]; 2] = [[ONE, ZERO], [ZERO, NEG_ONE]];

pub const IDENTITY: [[Complex64; 2]; 2] = [[ONE, ZERO], [ZERO, ONE]];

/// S = [[1, 0], [0, i]]
pub const S_GATE: [[Complex64; 2]; 2] = [[ONE, ZERO], [ZERO, I]];

pub const S_GATE_DAGGER: [[Complex64; 2]; 2] = [[ONE, ZERO], [ZERO, NEG_I]];

/// T = [[1, 0], [0, e^(iπ/4)]]
pub const T_GATE: [[Complex64; 2]; 2] = [
    [ONE, ZERO],
    [ZERO, Complex64::new(INV_SQRT2, INV_SQRT2)],
];

pub const T_GATE_DAGGER: [[Complex64; 2]; 2] = [
    [ONE, ZERO],
    [ZERO, Complex64::new(INV_SQRT2, -INV_SQRT2)],
];

pub const CNOT: [[Complex64; 4]; 4] = [
    [ONE, ZERO, ZERO, ZERO],
    [ZERO, ONE, ZERO, ZERO],
    [ZERO, ZERO, ZERO, ONE],
    [ZERO, ZERO, ONE, ZERO],
];

pub const CZ: [[Complex64; 4]; 4] = [
    [ONE, ZERO, ZERO, ZERO],
    [ZERO, ONE, ZERO, ZERO],
    [ZERO, ZERO, ONE, ZERO],
    [ZERO, ZERO, ZERO, NEG_ONE],
];

pub const SWAP: [[Complex64; 4]; 4] = [
    [ONE, ZERO, ZERO, ZERO],
    [ZERO, ZERO, ONE, ZERO],
    [ZERO, ONE, ZERO, ZERO],
    [ZERO, ZERO, ZERO, ONE],
];

/// RX(θ) = [[cos(θ/2), -i sin(θ/2)], [-i sin(θ/2), cos(θ/2)]]
pub fn rotation_x(theta: f64) -> [[Complex64; 2]; 2] {
    let (s, c) = (theta / 2.0).sin_cos();
    [
        [Complex64::new(c, 0.0), Complex64::new(0.0, -s)],
        [Complex64::new(0.0, -s), Complex64::new(c, 0.0)],
    ]
}

/// RY(θ) = [[cos(θ/2), -sin(θ/2)], [sin(θ/2), cos(θ/2)]]
pub fn rotation_y(theta: f64) -> [[Complex64; 2]; 2] {
    let (s, c) = (theta / 2.0).sin_cos();
    [
        [Complex64::new(c, 0.0), Complex64::new(-s, 0.0)],
        [Complex64::new(s, 0.0), Complex64::new(c, 0.0)],
    ]
}

/// RZ(θ) = [[e^(-iθ/2), 0], [0, e^(iθ/2)]]
pub fn rotation_z(theta: f64) -> [[Complex64; 2]; 2] {
    [
        [Complex64::from_polar(1.0, -theta / 2.0), ZERO],
        [ZERO, Complex64::from_polar(1.0, theta / 2.0)],
    ]
}

/// U1(λ) = [[1, 0], [0, e^(iλ)]]
pub fn phase(lambda: f64) -> [[Complex64; 2]; 2] {
    [[ONE, ZERO], [ZERO, Complex64::from_polar(1.0, lambda)]]
}

/// U3(θ, φ, λ), the general single-qubit rotation
pub fn u3(theta: f64, phi: f64, lambda: f64) -> [[Complex64; 2]; 2] {
    let (s, c) = (theta / 2.0).sin_cos();
    [
        [
            Complex64::new(c, 0.0),
            -Complex64::from_polar(s, lambda),
        ],
        [
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        ],
    ]
}

/// Controlled phase: diag(1, 1, 1, e^(iθ))
pub fn controlled_phase(theta: f64) -> [[Complex64; 4]; 4] {
    let mut m = [[ZERO; 4]; 4];
    m[0][0] = ONE;
    m[1][1] = ONE;
    m[2][2] = ONE;
    m[3][3] = Complex64::from_polar(1.0, theta);
    m
}

/// Toffoli on `[control1, control2, target]`
pub fn toffoli() -> Matrix<f64> {
    let mut m = Matrix::<f64>::identity(3).as_slice().to_vec();
    for (row, col) in [(6usize, 6usize), (7, 7)] {
        m[row * 8 + col] = ZERO;
    }
    m[6 * 8 + 7] = ONE;
    m[7 * 8 + 6] = ONE;
    Matrix::from_parts(3, m)
}

/// Kronecker product `a ⊗ b`; `a` acts on the high bit
pub fn kron_2x2(a: &[[Complex64; 2]; 2], b: &[[Complex64; 2]; 2]) -> [[Complex64; 4]; 4] {
    let mut m = [[ZERO; 4]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = a[i >> 1][j >> 1] * b[i & 1][j & 1];
        }
    }
    m
}
