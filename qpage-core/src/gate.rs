//! Gate requests
//!
//! The front end hands the dispatcher an ordered sequence of
//! [`GateRequest`] values. The set of kinds is closed; each kind knows its
//! name, its fixed-width parameter rendering, its target qubits and (for
//! unitary kinds) its matrix. Where a gate runs is decided elsewhere.

use crate::matrices;
use crate::{CoreError, Matrix, Qubit, Result};
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// Width of one rendered parameter field
const FIELD_WIDTH: usize = 6;
/// Width of one rendered angle field
const ANGLE_WIDTH: usize = 12;

/// Coarse category of a request
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateClass {
    /// Matrix-representable operation
    Unitary,
    /// Non-unitary projection onto a basis value (SET / CLEAR)
    Projection,
    /// BEGIN FUSION / END FUSION markers
    FusionMarker,
    /// Explicit qubit reordering
    Reordering,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GateRequest {
    Hadamard(Qubit),
    PauliX(Qubit),
    PauliY(Qubit),
    PauliZ(Qubit),
    S(Qubit),
    SDagger(Qubit),
    T(Qubit),
    TDagger(Qubit),
    RotationX { qubit: Qubit, angle: f64 },
    RotationY { qubit: Qubit, angle: f64 },
    RotationZ { qubit: Qubit, angle: f64 },
    U1 { qubit: Qubit, lambda: f64 },
    U2 { qubit: Qubit, phi: f64, lambda: f64 },
    U3 { qubit: Qubit, theta: f64, phi: f64, lambda: f64 },
    ControlledNot { control: Qubit, target: Qubit },
    ControlledZ { control: Qubit, target: Qubit },
    ControlledPhase { control: Qubit, target: Qubit, angle: f64 },
    Swap(Qubit, Qubit),
    Toffoli { controls: [Qubit; 2], target: Qubit },
    /// Arbitrary unitary; the first qubit is the most significant matrix bit
    Unitary { qubits: SmallVec<[Qubit; 4]>, matrix: Matrix<f64> },
    /// Force the qubit to |1>
    Set(Qubit),
    /// Force the qubit to |0>
    Clear(Qubit),
    BeginFusion,
    EndFusion,
    /// New physical position for every logical qubit, indexed by logical qubit
    Permute(Vec<usize>),
}

impl GateRequest {
    /// Build an arbitrary unitary request
    ///
    /// # Errors
    ///
    /// Fails if the matrix size does not match `qubits`, a qubit repeats,
    /// or the matrix is not unitary.
    pub fn unitary(qubits: impl IntoIterator<Item = Qubit>, matrix: Matrix<f64>) -> Result<Self> {
        let qubits: SmallVec<[Qubit; 4]> = qubits.into_iter().collect();
        check_operator(&qubits, &matrix)?;
        check_distinct(&qubits)?;
        Ok(GateRequest::Unitary { qubits, matrix })
    }

    /// Mnemonic used by the front end and in logs
    pub fn name(&self) -> &'static str {
        match self {
            GateRequest::Hadamard(_) => "H",
            GateRequest::PauliX(_) => "X",
            GateRequest::PauliY(_) => "Y",
            GateRequest::PauliZ(_) => "Z",
            GateRequest::S(_) => "S",
            GateRequest::SDagger(_) => "SDG",
            GateRequest::T(_) => "T",
            GateRequest::TDagger(_) => "TDG",
            GateRequest::RotationX { .. } => "RX",
            GateRequest::RotationY { .. } => "RY",
            GateRequest::RotationZ { .. } => "RZ",
            GateRequest::U1 { .. } => "U1",
            GateRequest::U2 { .. } => "U2",
            GateRequest::U3 { .. } => "U3",
            GateRequest::ControlledNot { .. } => "CNOT",
            GateRequest::ControlledZ { .. } => "CZ",
            GateRequest::ControlledPhase { .. } => "CPHASE",
            GateRequest::Swap(..) => "SWAP",
            GateRequest::Toffoli { .. } => "TOFFOLI",
            GateRequest::Unitary { .. } => "UNITARY",
            GateRequest::Set(_) => "SET",
            GateRequest::Clear(_) => "CLEAR",
            GateRequest::BeginFusion => "BEGIN FUSION",
            GateRequest::EndFusion => "END FUSION",
            GateRequest::Permute(_) => "PERMUTE",
        }
    }

    pub fn class(&self) -> GateClass {
        match self {
            GateRequest::Set(_) | GateRequest::Clear(_) => GateClass::Projection,
            GateRequest::BeginFusion | GateRequest::EndFusion => GateClass::FusionMarker,
            GateRequest::Permute(_) => GateClass::Reordering,
            _ => GateClass::Unitary,
        }
    }

    /// Qubits the request acts on, in matrix order
    pub fn qubits(&self) -> SmallVec<[Qubit; 4]> {
        match self {
            GateRequest::Hadamard(q)
            | GateRequest::PauliX(q)
            | GateRequest::PauliY(q)
            | GateRequest::PauliZ(q)
            | GateRequest::S(q)
            | GateRequest::SDagger(q)
            | GateRequest::T(q)
            | GateRequest::TDagger(q)
            | GateRequest::Set(q)
            | GateRequest::Clear(q) => smallvec![*q],
            GateRequest::RotationX { qubit, .. }
            | GateRequest::RotationY { qubit, .. }
            | GateRequest::RotationZ { qubit, .. }
            | GateRequest::U1 { qubit, .. }
            | GateRequest::U2 { qubit, .. }
            | GateRequest::U3 { qubit, .. } => smallvec![*qubit],
            GateRequest::ControlledNot { control, target }
            | GateRequest::ControlledZ { control, target }
            | GateRequest::ControlledPhase {
                control, target, ..
            } => smallvec![*control, *target],
            GateRequest::Swap(a, b) => smallvec![*a, *b],
            GateRequest::Toffoli { controls, target } => smallvec![controls[0], controls[1], *target],
            GateRequest::Unitary { qubits, .. } => qubits.clone(),
            GateRequest::BeginFusion | GateRequest::EndFusion | GateRequest::Permute(_) => {
                SmallVec::new()
            }
        }
    }

    /// Dense matrix for unitary kinds, `None` otherwise
    pub fn matrix(&self) -> Option<Matrix<f64>> {
        let m = match self {
            GateRequest::Hadamard(_) => Matrix::from_2x2(&matrices::HADAMARD),
            GateRequest::PauliX(_) => Matrix::from_2x2(&matrices::PAULI_X),
            GateRequest::PauliY(_) => Matrix::from_2x2(&matrices::PAULI_Y),
            GateRequest::PauliZ(_) => Matrix::from_2x2(&matrices::PAULI_Z),
            GateRequest::S(_) => Matrix::from_2x2(&matrices::S_GATE),
            GateRequest::SDagger(_) => Matrix::from_2x2(&matrices::S_GATE_DAGGER),
            GateRequest::T(_) => Matrix::from_2x2(&matrices::T_GATE),
            GateRequest::TDagger(_) => Matrix::from_2x2(&matrices::T_GATE_DAGGER),
            GateRequest::RotationX { angle, .. } => Matrix::from_2x2(&matrices::rotation_x(*angle)),
            GateRequest::RotationY { angle, .. } => Matrix::from_2x2(&matrices::rotation_y(*angle)),
            GateRequest::RotationZ { angle, .. } => Matrix::from_2x2(&matrices::rotation_z(*angle)),
            GateRequest::U1 { lambda, .. } => Matrix::from_2x2(&matrices::phase(*lambda)),
            GateRequest::U2 { phi, lambda, .. } => {
                Matrix::from_2x2(&matrices::u3(std::f64::consts::FRAC_PI_2, *phi, *lambda))
            }
            GateRequest::U3 {
                theta, phi, lambda, ..
            } => Matrix::from_2x2(&matrices::u3(*theta, *phi, *lambda)),
            GateRequest::ControlledNot { .. } => Matrix::from_4x4(&matrices::CNOT),
            GateRequest::ControlledZ { .. } => Matrix::from_4x4(&matrices::CZ),
            GateRequest::ControlledPhase { angle, .. } => {
                Matrix::from_4x4(&matrices::controlled_phase(*angle))
            }
            GateRequest::Swap(..) => Matrix::from_4x4(&matrices::SWAP),
            GateRequest::Toffoli { .. } => matrices::toffoli(),
            GateRequest::Unitary { matrix, .. } => matrix.clone(),
            GateRequest::Set(_)
            | GateRequest::Clear(_)
            | GateRequest::BeginFusion
            | GateRequest::EndFusion
            | GateRequest::Permute(_) => return None,
        };
        Some(m)
    }

    /// Whether the request may be merged into a fused matrix
    ///
    /// Only one- and two-qubit unitary requests qualify. Whether the qubits
    /// are page-determining is checked by the dispatcher.
    pub fn is_fusable(&self) -> bool {
        self.class() == GateClass::Unitary && matches!(self.qubits().len(), 1 | 2)
    }

    /// Exact inverse of a unitary request
    pub fn adjoint(&self) -> Option<GateRequest> {
        let inverse = match self {
            GateRequest::Hadamard(_)
            | GateRequest::PauliX(_)
            | GateRequest::PauliY(_)
            | GateRequest::PauliZ(_)
            | GateRequest::ControlledNot { .. }
            | GateRequest::ControlledZ { .. }
            | GateRequest::Swap(..)
            | GateRequest::Toffoli { .. } => self.clone(),
            GateRequest::S(q) => GateRequest::SDagger(*q),
            GateRequest::SDagger(q) => GateRequest::S(*q),
            GateRequest::T(q) => GateRequest::TDagger(*q),
            GateRequest::TDagger(q) => GateRequest::T(*q),
            GateRequest::RotationX { qubit, angle } => GateRequest::RotationX {
                qubit: *qubit,
                angle: -angle,
            },
            GateRequest::RotationY { qubit, angle } => GateRequest::RotationY {
                qubit: *qubit,
                angle: -angle,
            },
            GateRequest::RotationZ { qubit, angle } => GateRequest::RotationZ {
                qubit: *qubit,
                angle: -angle,
            },
            GateRequest::U1 { qubit, lambda } => GateRequest::U1 {
                qubit: *qubit,
                lambda: -lambda,
            },
            GateRequest::U2 { qubit, phi, lambda } => GateRequest::U3 {
                qubit: *qubit,
                theta: -std::f64::consts::FRAC_PI_2,
                phi: -lambda,
                lambda: -phi,
            },
            GateRequest::U3 {
                qubit,
                theta,
                phi,
                lambda,
            } => GateRequest::U3 {
                qubit: *qubit,
                theta: -theta,
                phi: -lambda,
                lambda: -phi,
            },
            GateRequest::ControlledPhase {
                control,
                target,
                angle,
            } => GateRequest::ControlledPhase {
                control: *control,
                target: *target,
                angle: -angle,
            },
            GateRequest::Unitary { qubits, matrix } => GateRequest::Unitary {
                qubits: qubits.clone(),
                matrix: matrix.adjoint(),
            },
            GateRequest::Set(_)
            | GateRequest::Clear(_)
            | GateRequest::BeginFusion
            | GateRequest::EndFusion
            | GateRequest::Permute(_) => return None,
        };
        Some(inverse)
    }

    /// Check qubit indices against the register size
    ///
    /// A `Unitary` built without [`GateRequest::unitary`] is checked here
    /// for a matrix of matching width that is unitary.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidQubit`], [`CoreError::DuplicateQubit`],
    /// [`CoreError::DimensionMismatch`] or [`CoreError::NotUnitary`].
    pub fn validate(&self, num_qubits: usize) -> Result<()> {
        let qubits = self.qubits();
        if let Some(bad) = qubits.iter().find(|q| q.index() >= num_qubits) {
            return Err(CoreError::invalid_qubit(*bad, num_qubits));
        }
        check_distinct(&qubits)?;
        if let GateRequest::Unitary { qubits, matrix } = self {
            check_operator(qubits, matrix)?;
        }
        Ok(())
    }

    /// Fixed-width rendering of the parameters, without the name
    ///
    /// Qubits take [`FIELD_WIDTH`] columns each and angles [`ANGLE_WIDTH`].
    pub fn render_parameters(&self) -> String {
        let mut out = String::new();
        for q in self.qubits() {
            out.push_str(&format!("{:>width$}", q.to_string(), width = FIELD_WIDTH));
        }
        let angles: SmallVec<[f64; 3]> = match self {
            GateRequest::RotationX { angle, .. }
            | GateRequest::RotationY { angle, .. }
            | GateRequest::RotationZ { angle, .. }
            | GateRequest::ControlledPhase { angle, .. } => smallvec![*angle],
            GateRequest::U1 { lambda, .. } => smallvec![*lambda],
            GateRequest::U2 { phi, lambda, .. } => smallvec![*phi, *lambda],
            GateRequest::U3 {
                theta, phi, lambda, ..
            } => smallvec![*theta, *phi, *lambda],
            _ => SmallVec::new(),
        };
        for angle in angles {
            out.push_str(&format!("{:>width$.6}", angle, width = ANGLE_WIDTH));
        }
        match self {
            GateRequest::Unitary { matrix, .. } => {
                let shape = format!("[{0}x{0}]", matrix.dim());
                out.push_str(&format!("{:>width$}", shape, width = ANGLE_WIDTH));
            }
            GateRequest::Permute(assignment) => {
                for position in assignment {
                    out.push_str(&format!("{:>width$}", position, width = FIELD_WIDTH));
                }
            }
            _ => {}
        }
        out
    }
}

impl fmt::Display for GateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<14}{}", self.name(), self.render_parameters())
    }
}

fn check_operator(qubits: &[Qubit], matrix: &Matrix<f64>) -> Result<()> {
    if qubits.len() != matrix.num_qubits() {
        return Err(CoreError::DimensionMismatch {
            matrix_qubits: matrix.num_qubits(),
            qubits: qubits.len(),
        });
    }
    if !matrix.is_unitary(1e-9) {
        return Err(CoreError::NotUnitary {
            gate: "UNITARY".to_string(),
        });
    }
    Ok(())
}

fn check_distinct(qubits: &[Qubit]) -> Result<()> {
    for (i, q) in qubits.iter().enumerate() {
        if qubits[..i].contains(q) {
            return Err(CoreError::DuplicateQubit(*q));
        }
    }
    Ok(())
}
