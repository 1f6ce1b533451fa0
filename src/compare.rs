use crate::element::Real;
use serde::{Deserialize, Serialize};

/// Combined absolute and relative tolerance.
///
/// Two finite values `a` and `b` of an array agree if
///
/// `|a - b| <= abs + norm_factor * norm + rel * max(|a|, |b|)`
///
/// where `norm` is the largest finite magnitude found in either array.
/// The `norm_factor` term admits the rounding error that cancellation leaves
/// on elements much smaller than their terms. It is a small multiple of the
/// machine epsilon, so a large array norm never hides a wrong small element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub abs: f64,
    pub rel: f64,
    #[serde(default)]
    pub norm_factor: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::new(1e-9, 1e-9).with_norm_factor(1e-12)
    }
}

impl std::fmt::Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "abs={:e} rel={:e}", self.abs, self.rel)?;
        if self.norm_factor != 0.0 {
            write!(f, " norm={:e}", self.norm_factor)?;
        }
        Ok(())
    }
}

impl Tolerance {
    #[must_use]
    pub const fn new(abs: f64, rel: f64) -> Self {
        Self {
            abs,
            rel,
            norm_factor: 0.0,
        }
    }

    #[must_use]
    pub const fn with_norm_factor(mut self, norm_factor: f64) -> Self {
        self.norm_factor = norm_factor;
        self
    }

    /// Bit-exact comparison.
    #[must_use]
    pub const fn exact() -> Self {
        Self::new(0.0, 0.0)
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.abs == 0.0 && self.rel == 0.0 && self.norm_factor == 0.0
    }

    /// Whether two finite values agree given the `norm` of their arrays.
    #[must_use]
    pub fn allows(&self, have: f64, want: f64, norm: f64) -> bool {
        let abs_diff = (have - want).abs();
        let allowed =
            self.abs + self.norm_factor * norm + self.rel * have.abs().max(want.abs());
        abs_diff <= allowed
    }
}

/// Serde format for values that may be NaN or infinite.
///
/// Finite values are plain numbers, the others the strings `"NaN"`, `"inf"`
/// and `"-inf"`, since JSON numbers cannot hold them.
pub mod non_finite {
    use serde::{de, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if value.is_sign_positive() { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    struct Visitor;

    impl<'de> de::Visitor<'de> for Visitor {
        type Value = f64;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(r#"a number, "NaN", "inf" or "-inf""#)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            match value {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(Visitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DivergenceKind {
    /// Both values are finite but differ by more than the tolerance.
    OutOfTolerance,
    /// One of the values is NaN or the values are different infinities.
    NonFinite,
    /// The arrays differ in length. `have` and `want` hold the lengths.
    Shape,
}

/// First element at which two arrays disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    /// Row-major offset into the flattened array.
    pub offset: usize,
    /// Multi-dimensional index, `[offset]` until the array shape is known.
    pub index: Vec<usize>,
    #[serde(with = "non_finite")]
    pub have: f64,
    #[serde(with = "non_finite")]
    pub want: f64,
    #[serde(with = "non_finite")]
    pub abs_diff: f64,
    #[serde(with = "non_finite")]
    pub rel_diff: f64,
    pub kind: DivergenceKind,
}

impl Divergence {
    /// Resolves the multi-dimensional index for an array of the given shape.
    #[must_use]
    pub fn with_shape(mut self, shape: &[usize]) -> Self {
        if self.kind != DivergenceKind::Shape && !shape.is_empty() {
            self.index = crate::shape::unravel(self.offset, shape);
        }
        self
    }
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DivergenceKind::Shape => write!(
                f,
                "length mismatch: have {} elements, want {}",
                self.have, self.want
            ),
            DivergenceKind::NonFinite => write!(
                f,
                "non-finite mismatch at {:?}: have {}, want {}",
                self.index, self.have, self.want
            ),
            DivergenceKind::OutOfTolerance => write!(
                f,
                "at {:?}: have {}, want {} (abs diff {:e}, rel diff {:e})",
                self.index, self.have, self.want, self.abs_diff, self.rel_diff
            ),
        }
    }
}

/// Result of comparing two arrays element by element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub elements: usize,
    /// Largest absolute difference among finite pairs.
    pub max_abs_diff: f64,
    /// Largest relative difference among finite pairs.
    pub max_rel_diff: f64,
    /// Number of elements outside the tolerance.
    pub divergent: usize,
    pub first: Option<Divergence>,
}

impl Comparison {
    fn empty(elements: usize) -> Self {
        Self {
            elements,
            max_abs_diff: 0.0,
            max_rel_diff: 0.0,
            divergent: 0,
            first: None,
        }
    }

    fn length_mismatch(have: usize, want: usize) -> Self {
        Self {
            elements: have.max(want),
            max_abs_diff: f64::INFINITY,
            max_rel_diff: f64::INFINITY,
            divergent: have.abs_diff(want).max(1),
            first: Some(Divergence {
                offset: have.min(want),
                index: vec![have.min(want)],
                have: have as f64,
                want: want as f64,
                abs_diff: f64::INFINITY,
                rel_diff: f64::INFINITY,
                kind: DivergenceKind::Shape,
            }),
        }
    }

    #[must_use]
    pub fn is_equivalent(&self) -> bool {
        self.divergent == 0
    }

    fn record(&mut self, divergence: Divergence) {
        self.divergent += 1;
        if self.first.is_none() {
            self.first = Some(divergence);
        }
    }
}

fn rel_diff(abs_diff: f64, have: f64, want: f64) -> f64 {
    let magnitude = have.abs().max(want.abs());
    if magnitude == 0.0 {
        0.0
    } else {
        abs_diff / magnitude
    }
}

/// Compares `have` against `want` element by element.
///
/// NaN never agrees with anything, not even NaN. Infinities agree only with
/// an infinity of the same sign.
pub fn compare_arrays<T: Real>(have: &[T], want: &[T], tolerance: &Tolerance) -> Comparison {
    if have.len() != want.len() {
        return Comparison::length_mismatch(have.len(), want.len());
    }
    let to_f64 = |v: &T| v.to_f64().unwrap_or(f64::NAN);
    let norm = have
        .iter()
        .chain(want.iter())
        .map(to_f64)
        .filter(|v| v.is_finite())
        .fold(0.0f64, |norm, v| norm.max(v.abs()));

    let mut comparison = Comparison::empty(have.len());
    for (offset, (have, want)) in have.iter().map(to_f64).zip(want.iter().map(to_f64)).enumerate() {
        if !have.is_finite() || !want.is_finite() {
            #[allow(clippy::float_cmp)]
            let agree = !have.is_nan() && have == want;
            if !agree {
                comparison.record(Divergence {
                    offset,
                    index: vec![offset],
                    have,
                    want,
                    abs_diff: f64::NAN,
                    rel_diff: f64::NAN,
                    kind: DivergenceKind::NonFinite,
                });
            }
            continue;
        }

        let abs_diff = (have - want).abs();
        let rel_diff = rel_diff(abs_diff, have, want);
        comparison.max_abs_diff = comparison.max_abs_diff.max(abs_diff);
        comparison.max_rel_diff = comparison.max_rel_diff.max(rel_diff);
        if !tolerance.allows(have, want, norm) {
            comparison.record(Divergence {
                offset,
                index: vec![offset],
                have,
                want,
                abs_diff,
                rel_diff,
                kind: DivergenceKind::OutOfTolerance,
            });
        }
    }
    comparison
}

/// Exact comparison for integer and byte outputs.
pub fn compare_exact<V>(have: &[V], want: &[V]) -> Comparison
where
    V: Copy + PartialEq + Into<i64>,
{
    if have.len() != want.len() {
        return Comparison::length_mismatch(have.len(), want.len());
    }
    let mut comparison = Comparison::empty(have.len());
    for (offset, (have, want)) in have.iter().zip(want.iter()).enumerate() {
        let (have, want): (i64, i64) = ((*have).into(), (*want).into());
        let abs_diff = have.abs_diff(want) as f64;
        let rel_diff = rel_diff(abs_diff, have as f64, want as f64);
        comparison.max_abs_diff = comparison.max_abs_diff.max(abs_diff);
        comparison.max_rel_diff = comparison.max_rel_diff.max(rel_diff);
        if have != want {
            comparison.record(Divergence {
                offset,
                index: vec![offset],
                have: have as f64,
                want: want as f64,
                abs_diff,
                rel_diff,
                kind: DivergenceKind::OutOfTolerance,
            });
        }
    }
    comparison
}
