use crate::compare::Tolerance;
use num_traits::{Float, NumAssign, NumCast};

/// Floating point element type of the dense kernels.
pub trait Real:
    Float
    + NumAssign
    + std::iter::Sum
    + std::fmt::Debug
    + std::fmt::Display
    + Send
    + Sync
    + 'static
{
    const DTYPE: DType;

    /// Tolerance for comparing results that were accumulated in this precision.
    fn default_tolerance() -> Tolerance;
}

impl Real for f32 {
    const DTYPE: DType = DType::F32;

    fn default_tolerance() -> Tolerance {
        Tolerance::new(1e-6, 1e-3).with_norm_factor(1e-4)
    }
}

impl Real for f64 {
    const DTYPE: DType = DType::F64;

    fn default_tolerance() -> Tolerance {
        Tolerance::default()
    }
}

/// Converts a constant into the element type.
///
/// Values outside the range of `T` saturate to infinity, they never fail.
#[inline]
#[must_use]
pub fn cast<T: Real>(value: f64) -> T {
    <T as NumCast>::from(value).unwrap_or_else(T::nan)
}

#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    F32,
    F64,
}

impl DType {
    #[must_use]
    pub fn bits(self) -> usize {
        match self {
            Self::F32 => 32,
            Self::F64 => 64,
        }
    }

    #[must_use]
    pub fn from_bits(bits: usize) -> Option<Self> {
        match bits {
            32 => Some(Self::F32),
            64 => Some(Self::F64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{cast, DType, Real};

    #[test]
    fn cast_saturates_instead_of_failing() {
        assert_eq!(cast::<f64>(0.5), 0.5);
        assert!(cast::<f32>(1e300).is_infinite());
    }

    #[test]
    fn dtype_bits_round_trip() {
        use strum::IntoEnumIterator;
        for dtype in DType::iter() {
            assert_eq!(DType::from_bits(dtype.bits()), Some(dtype));
        }
        assert_eq!(DType::from_bits(16), None);
        assert_eq!(f32::DTYPE.to_string(), "f32");
    }
}
