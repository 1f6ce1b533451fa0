use crate::error::Error;
use std::ops::Range;

/// Tile size used when a schedule is written as plain `tiled`.
pub const DEFAULT_TILE: usize = 16;

/// Loop schedule of a kernel.
///
/// Every schedule computes the same mathematical result as [`Schedule::Reference`].
/// Only the order of iterations (and therefore the floating point summation
/// order) differs. Kernels reject schedules that would break a dependence.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Schedule {
    /// Original loop order.
    #[default]
    Reference,
    /// Permuted loop nest.
    Interchanged,
    /// Fused loop split into separate passes.
    Distributed,
    /// Separate passes merged into one nest.
    Fused,
    /// Loops strip-mined into tiles of the given size.
    Tiled(usize),
    /// Independent iterations mapped in parallel.
    Parallel,
}

impl Schedule {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Interchanged => "interchanged",
            Self::Distributed => "distributed",
            Self::Fused => "fused",
            Self::Tiled(_) => "tiled",
            Self::Parallel => "parallel",
        }
    }

    /// Whether both schedules apply the same transformation, ignoring parameters.
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tiled(tile) => write!(f, "tiled:{tile}"),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl std::str::FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let (name, param) = match normalized.split_once(':') {
            Some((name, param)) => (name, Some(param)),
            None => (normalized.as_str(), None),
        };
        let schedule = match (name, param) {
            ("reference", None) => Self::Reference,
            ("interchanged", None) => Self::Interchanged,
            ("distributed", None) => Self::Distributed,
            ("fused", None) => Self::Fused,
            ("parallel", None) => Self::Parallel,
            ("tiled", None) => Self::Tiled(DEFAULT_TILE),
            ("tiled", Some(tile)) => match tile.parse::<usize>() {
                Ok(tile) if tile > 0 => Self::Tiled(tile),
                _ => return Err(Error::InvalidSchedule(s.to_string())),
            },
            _ => return Err(Error::InvalidSchedule(s.to_string())),
        };
        Ok(schedule)
    }
}

impl TryFrom<String> for Schedule {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Schedule> for String {
    fn from(schedule: Schedule) -> Self {
        schedule.to_string()
    }
}

/// Splits `range` into consecutive tiles of at most `tile` iterations.
///
/// The last tile is clamped to the end of the range, so every index is
/// visited exactly once and in ascending order.
pub fn tiles(range: Range<usize>, tile: usize) -> impl Iterator<Item = Range<usize>> {
    let end = range.end;
    let tile = tile.max(1);
    range
        .step_by(tile)
        .map(move |start| start..(start + tile).min(end))
}
