use crate::{
    compare::{Comparison, Divergence, Tolerance},
    error::Error,
    schedule::Schedule,
};
use serde::{Deserialize, Serialize};

/// First divergence of an array, together with the trial that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstDivergence {
    pub trial: usize,
    pub seed: u64,
    pub scale: f64,
    #[serde(flatten)]
    pub divergence: Divergence,
}

/// Statistics of one output array accumulated over all trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayReport {
    pub name: String,
    /// Number of compared elements summed over all trials.
    pub elements: usize,
    pub max_abs_diff: f64,
    pub max_rel_diff: f64,
    /// Number of divergent elements summed over all trials.
    pub divergent: usize,
    pub divergent_trials: usize,
    pub first: Option<FirstDivergence>,
}

impl ArrayReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            elements: 0,
            max_abs_diff: 0.0,
            max_rel_diff: 0.0,
            divergent: 0,
            divergent_trials: 0,
            first: None,
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.divergent == 0
    }
}

/// Outcome of checking one pair of schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub kernel: String,
    pub original: Schedule,
    pub transformed: Schedule,
    /// Base seed, trial `t` uses `seed + t`.
    pub seed: u64,
    pub trials: usize,
    pub tolerance: Tolerance,
    pub arrays: Vec<ArrayReport>,
}

impl Report {
    #[must_use]
    pub fn new(
        kernel: impl Into<String>,
        original: Schedule,
        transformed: Schedule,
        seed: u64,
        tolerance: Tolerance,
    ) -> Self {
        Self {
            kernel: kernel.into(),
            original,
            transformed,
            seed,
            trials: 0,
            tolerance,
            arrays: Vec::new(),
        }
    }

    /// Seed used to generate the input of `trial`.
    #[must_use]
    pub fn trial_seed(&self, trial: usize) -> u64 {
        self.seed.wrapping_add(trial as u64)
    }

    /// Accumulates the comparison of array `name` in `trial`.
    pub fn record(&mut self, trial: usize, scale: f64, name: &str, comparison: &Comparison) {
        let seed = self.trial_seed(trial);
        let array = match self.arrays.iter().position(|a| a.name == name) {
            Some(pos) => &mut self.arrays[pos],
            None => {
                self.arrays.push(ArrayReport::new(name));
                let last = self.arrays.len() - 1;
                &mut self.arrays[last]
            }
        };
        array.elements += comparison.elements;
        array.max_abs_diff = array.max_abs_diff.max(comparison.max_abs_diff);
        array.max_rel_diff = array.max_rel_diff.max(comparison.max_rel_diff);
        array.divergent += comparison.divergent;
        if !comparison.is_equivalent() {
            array.divergent_trials += 1;
        }
        if array.first.is_none() {
            array.first = comparison.first.clone().map(|divergence| FirstDivergence {
                trial,
                seed,
                scale,
                divergence,
            });
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.arrays.iter().all(ArrayReport::passed)
    }

    /// Earliest divergence over all arrays, by trial.
    #[must_use]
    pub fn first_divergence(&self) -> Option<(&str, &FirstDivergence)> {
        self.arrays
            .iter()
            .filter_map(|a| a.first.as_ref().map(|first| (a.name.as_str(), first)))
            .min_by_key(|(_, first)| first.trial)
    }

    #[must_use]
    pub fn divergent_elements(&self) -> usize {
        self.arrays.iter().map(|a| a.divergent).sum()
    }

    #[must_use]
    pub fn max_abs_diff(&self) -> f64 {
        self.arrays.iter().map(|a| a.max_abs_diff).fold(0.0, f64::max)
    }

    #[must_use]
    pub fn max_rel_diff(&self) -> f64 {
        self.arrays.iter().map(|a| a.max_rel_diff).fold(0.0, f64::max)
    }

    /// Converts a failed report into [`Error::Diverged`].
    pub fn into_result(self) -> Result<Self, Error> {
        let first = self
            .first_divergence()
            .map(|(array, first)| (array.to_string(), first.trial, first.divergence.clone()));
        let Some((array, trial, divergence)) = first else {
            return Ok(self);
        };
        Err(Error::Diverged {
            array,
            trial,
            divergence: Box::new(divergence),
            kernel: self.kernel,
            original: self.original,
            transformed: self.transformed,
        })
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} vs {}: {} trials (seed {}, {})",
            self.kernel, self.original, self.transformed, self.trials, self.seed, self.tolerance
        )?;
        match self.first_divergence() {
            None => write!(
                f,
                ": equivalent (max abs diff {:e}, max rel diff {:e})",
                self.max_abs_diff(),
                self.max_rel_diff()
            ),
            Some((array, first)) => write!(
                f,
                ": {} divergent elements, first in {:?} at trial {} (seed {}, scale {:e}) {}",
                self.divergent_elements(),
                array,
                first.trial,
                first.seed,
                first.scale,
                first.divergence
            ),
        }
    }
}
