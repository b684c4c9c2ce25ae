//! Precision selection
//!
//! Maps a requested precision category to the native floating-point type
//! that numeric kernels are instantiated with. The mapping exists twice:
//! as a runtime function ([`select_native`]) for configuration values, and
//! as a type-level table ([`PrecisionCategory`]) for generic code.

use crate::CoreError;
use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::iter::Sum;
use std::str::FromStr;

/// Requested numeric precision category
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    #[default]
    Double,
    Extended,
}

impl Precision {
    pub const ALL: [Precision; 3] = [Precision::Single, Precision::Double, Precision::Extended];

    pub const fn name(self) -> &'static str {
        match self {
            Precision::Single => "single",
            Precision::Double => "double",
            Precision::Extended => "extended",
        }
    }

    #[inline]
    pub const fn native(self) -> NativeFloat {
        select_native(self)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Precision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "float" | "f32" => Ok(Precision::Single),
            "double" | "f64" => Ok(Precision::Double),
            "extended" | "long double" => Ok(Precision::Extended),
            _ => Err(CoreError::UnknownPrecision(s.to_string())),
        }
    }
}

/// Native floating-point representation available to kernels
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeFloat {
    F32,
    F64,
}

impl NativeFloat {
    pub const fn size_of(self) -> usize {
        match self {
            NativeFloat::F32 => std::mem::size_of::<f32>(),
            NativeFloat::F64 => std::mem::size_of::<f64>(),
        }
    }

    pub const fn mantissa_digits(self) -> u32 {
        match self {
            NativeFloat::F32 => f32::MANTISSA_DIGITS,
            NativeFloat::F64 => f64::MANTISSA_DIGITS,
        }
    }
}

/// Select the native representation for a precision category
///
/// Extended precision resolves to `f64`, the widest float stable Rust
/// provides natively.
///
/// # Example
/// ```
/// use qpage_core::{select_native, NativeFloat, Precision};
///
/// assert_eq!(select_native(Precision::Single), NativeFloat::F32);
/// assert_eq!(select_native(Precision::Double), NativeFloat::F64);
/// ```
#[inline]
pub const fn select_native(precision: Precision) -> NativeFloat {
    match precision {
        Precision::Single => NativeFloat::F32,
        Precision::Double | Precision::Extended => NativeFloat::F64,
    }
}

/// Floating-point scalar the kernels are generic over
pub trait Real:
    Float + FloatConst + Default + Debug + Display + Sum + Send + Sync + 'static
{
    /// Native representation of this scalar
    const NATIVE: NativeFloat;

    /// Convert from `f64`, rounding to the nearest representable value
    fn narrow(value: f64) -> Self;

    /// Convert to `f64` without loss
    fn widen(self) -> f64;

    /// Tolerance used for unitarity and zero-probability checks
    fn tolerance() -> Self;
}

impl Real for f32 {
    const NATIVE: NativeFloat = NativeFloat::F32;

    #[inline]
    fn narrow(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }

    #[inline]
    fn tolerance() -> Self {
        1e-5
    }
}

impl Real for f64 {
    const NATIVE: NativeFloat = NativeFloat::F64;

    #[inline]
    fn narrow(value: f64) -> Self {
        value
    }

    #[inline]
    fn widen(self) -> f64 {
        self
    }

    #[inline]
    fn tolerance() -> Self {
        1e-12
    }
}

/// Type-level precision category
pub trait PrecisionCategory {
    const PRECISION: Precision;
    type Native: Real;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SinglePrecision;

#[derive(Copy, Clone, Debug, Default)]
pub struct DoublePrecision;

#[derive(Copy, Clone, Debug, Default)]
pub struct ExtendedPrecision;

impl PrecisionCategory for SinglePrecision {
    const PRECISION: Precision = Precision::Single;
    type Native = f32;
}

impl PrecisionCategory for DoublePrecision {
    const PRECISION: Precision = Precision::Double;
    type Native = f64;
}

impl PrecisionCategory for ExtendedPrecision {
    const PRECISION: Precision = Precision::Extended;
    type Native = f64;
}

/// Native scalar selected for a precision category
pub type NativeOf<P> = <P as PrecisionCategory>::Native;
