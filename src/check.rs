use crate::{
    compare::Tolerance,
    error::Error,
    init::Init,
    kernel::Kernel,
    report::Report,
    schedule::Schedule,
};
use serde::{Deserialize, Serialize};

/// Options of an equivalence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub trials: usize,
    /// Base seed. A random seed is drawn (and recorded in the report) if unset.
    pub seed: Option<u64>,
    /// Overrides the tolerance of the kernel.
    pub tolerance: Option<Tolerance>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trials: 10,
            seed: None,
            tolerance: None,
        }
    }
}

impl Options {
    #[must_use]
    pub fn trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
}

/// Checks that `transformed` computes the same outputs as `original`.
///
/// Every trial generates one input, clones it, and runs both schedules on
/// their own copy one after the other. All outputs are compared pairwise.
/// Trial `t` draws its input from seed `seed + t` and cycles through the input
/// magnitudes of the kernel.
pub fn check<K>(
    kernel: &K,
    original: Schedule,
    transformed: Schedule,
    options: &Options,
) -> Result<Report, Error>
where
    K: Kernel + ?Sized,
{
    for schedule in [original, transformed] {
        if !kernel.supports(&schedule) {
            return Err(Error::UnsupportedSchedule {
                kernel: kernel.name(),
                schedule,
            });
        }
    }

    let seed = options.seed.unwrap_or_else(rand::random);
    let tolerance = options.tolerance.unwrap_or_else(|| kernel.tolerance());
    let scales = match kernel.scales() {
        [] => &[1.0][..],
        scales => scales,
    };

    let mut report = Report::new(kernel.name(), original, transformed, seed, tolerance);
    let start = std::time::Instant::now();

    for trial in 0..options.trials {
        let scale = scales[trial % scales.len()];
        let mut init = Init::new(report.trial_seed(trial)).with_scale(scale);
        let input = kernel.init(&mut init);

        let mut want = input.clone();
        let mut have = input;
        kernel.run(original, &mut want)?;
        kernel.run(transformed, &mut have)?;

        let want = kernel.outputs(&want);
        let have = kernel.outputs(&have);
        debug_assert_eq!(have.len(), want.len());

        let mut diverged = false;
        for (have, want) in have.iter().zip(want.iter()) {
            let comparison = have.compare(want, &tolerance);
            diverged |= !comparison.is_equivalent();
            report.record(trial, scale, have.name, &comparison);
        }
        log::debug!(
            "{} {} vs {}: trial {} (scale {:e}) {}",
            kernel.name(),
            original,
            transformed,
            trial,
            scale,
            if diverged { "diverged" } else { "ok" }
        );
    }
    report.trials = options.trials;

    if report.passed() {
        log::info!("{} (took {:?})", report, start.elapsed());
    } else {
        log::warn!("{} (took {:?})", report, start.elapsed());
    }
    Ok(report)
}
