//! Datatype descriptions for amplitude buffers
//!
//! Page contents travel as typed payloads, never as raw bytes. A complex
//! amplitude is described as two contiguous scalars of the native float
//! type.

use crate::substrate::DatatypeHandle;
use num_complex::Complex;
use qpage_core::{NativeFloat, Real};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float32,
    Float64,
}

impl ScalarKind {
    pub const fn size_of(self) -> usize {
        match self {
            ScalarKind::Float32 => 4,
            ScalarKind::Float64 => 8,
        }
    }
}

impl From<NativeFloat> for ScalarKind {
    fn from(native: NativeFloat) -> Self {
        match native {
            NativeFloat::F32 => ScalarKind::Float32,
            NativeFloat::F64 => ScalarKind::Float64,
        }
    }
}

/// Element layout: `components` contiguous scalars of one kind
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementLayout {
    pub scalar: ScalarKind,
    pub components: usize,
}

impl ElementLayout {
    /// Layout of `Complex<T>`
    pub fn complex_of<T: Real>() -> Self {
        Self {
            scalar: T::NATIVE.into(),
            components: 2,
        }
    }

    /// Layout of a bare `T`
    pub fn real_of<T: Real>() -> Self {
        Self {
            scalar: T::NATIVE.into(),
            components: 1,
        }
    }

    pub const fn size_bytes(&self) -> usize {
        self.scalar.size_of() * self.components
    }
}

/// Derived datatype committed with the substrate
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Datatype {
    pub(crate) handle: DatatypeHandle,
    pub(crate) layout: ElementLayout,
}

impl Datatype {
    pub fn handle(&self) -> DatatypeHandle {
        self.handle
    }

    pub fn layout(&self) -> ElementLayout {
        self.layout
    }
}

/// Flattened scalar payload
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Payload {
    pub fn scalar(&self) -> ScalarKind {
        match self {
            Payload::F32(_) => ScalarKind::Float32,
            Payload::F64(_) => ScalarKind::Float64,
        }
    }

    /// Number of scalars carried
    pub fn len(&self) -> usize {
        match self {
            Payload::F32(v) => v.len(),
            Payload::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element type that can be flattened into a [`Payload`]
pub trait PayloadElement: Copy + Send + 'static {
    fn layout() -> ElementLayout;

    fn to_payload(values: &[Self]) -> Payload;

    /// Copy a payload into `out`; `false` if kind or length do not match
    fn read_payload(payload: &Payload, out: &mut [Self]) -> bool;

    /// Decode a payload of unknown length
    fn from_payload(payload: &Payload) -> Option<Vec<Self>>;
}

fn scalars<T: Real>(payload: &Payload) -> Option<Vec<T>> {
    match (payload, T::NATIVE) {
        (Payload::F32(v), NativeFloat::F32) => Some(v.iter().map(|&x| T::narrow(x as f64)).collect()),
        (Payload::F64(v), NativeFloat::F64) => Some(v.iter().map(|&x| T::narrow(x)).collect()),
        _ => None,
    }
}

fn to_scalars<T: Real>(values: impl Iterator<Item = T>) -> Payload {
    match T::NATIVE {
        NativeFloat::F32 => Payload::F32(values.map(|x| x.widen() as f32).collect()),
        NativeFloat::F64 => Payload::F64(values.map(|x| x.widen()).collect()),
    }
}

impl<T: Real> PayloadElement for Complex<T> {
    fn layout() -> ElementLayout {
        ElementLayout::complex_of::<T>()
    }

    fn to_payload(values: &[Self]) -> Payload {
        to_scalars(values.iter().flat_map(|c| [c.re, c.im]))
    }

    fn read_payload(payload: &Payload, out: &mut [Self]) -> bool {
        if payload.len() != out.len() * 2 {
            return false;
        }
        match scalars::<T>(payload) {
            Some(flat) => {
                for (slot, pair) in out.iter_mut().zip(flat.chunks_exact(2)) {
                    *slot = Complex::new(pair[0], pair[1]);
                }
                true
            }
            None => false,
        }
    }

    fn from_payload(payload: &Payload) -> Option<Vec<Self>> {
        if payload.len() % 2 != 0 {
            return None;
        }
        let flat = scalars::<T>(payload)?;
        Some(flat.chunks_exact(2).map(|p| Complex::new(p[0], p[1])).collect())
    }
}

impl PayloadElement for f64 {
    fn layout() -> ElementLayout {
        ElementLayout::real_of::<f64>()
    }

    fn to_payload(values: &[Self]) -> Payload {
        Payload::F64(values.to_vec())
    }

    fn read_payload(payload: &Payload, out: &mut [Self]) -> bool {
        match payload {
            Payload::F64(v) if v.len() == out.len() => {
                out.copy_from_slice(v);
                true
            }
            _ => false,
        }
    }

    fn from_payload(payload: &Payload) -> Option<Vec<Self>> {
        match payload {
            Payload::F64(v) => Some(v.clone()),
            Payload::F32(_) => None,
        }
    }
}
