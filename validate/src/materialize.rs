use crate::paths::{schedule_file_stem, PathExt};
use crate::Error;
use polyverify::{DynKernel, Options, Schedule};
use polyverify_kernels::Registry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_RESULTS_DIR: &str = "results";

/// One pair of schedules to check, with every default applied.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckConfig {
    pub kernel: String,
    pub original: Schedule,
    pub transformed: Schedule,
    #[serde(flatten)]
    pub options: Options,
    pub report_path: PathBuf,
}

impl std::fmt::Display for CheckConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} vs {}", self.kernel, self.original, self.transformed)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MaterializedConfig {
    pub results_dir: PathBuf,
    /// None means one check per physical core.
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Materialized {
    pub config: MaterializedConfig,
    pub checks: Vec<CheckConfig>,
}

fn ensure_supported(kernel: &dyn DynKernel, schedule: Schedule) -> Result<(), Error> {
    if kernel.schedules().iter().any(|s| s.same_kind(&schedule)) {
        Ok(())
    } else {
        Err(polyverify::Error::UnsupportedSchedule {
            kernel: kernel.name(),
            schedule,
        }
        .into())
    }
}

impl crate::Check {
    /// Expands the check of `kernel` into one config per transformed schedule.
    pub fn materialize(
        &self,
        kernel: &dyn DynKernel,
        config: &crate::Config,
        results_dir: &Path,
    ) -> Result<Vec<CheckConfig>, Error> {
        let original = self.original.unwrap_or_default();
        ensure_supported(kernel, original)?;

        let transformed = match &self.transformed {
            Some(transformed) => transformed.clone(),
            None => kernel
                .schedules()
                .into_iter()
                .filter(|schedule| *schedule != original)
                .collect(),
        };

        let options = Options {
            trials: self
                .trials
                .or(config.trials)
                .unwrap_or(Options::default().trials),
            seed: self.seed.or(config.seed),
            tolerance: self.tolerance.or(config.tolerance),
        };

        transformed
            .into_iter()
            .map(|transformed| {
                ensure_supported(kernel, transformed)?;
                let report_path = results_dir.join(kernel.name()).join(format!(
                    "{}-vs-{}.json",
                    schedule_file_stem(&original),
                    schedule_file_stem(&transformed)
                ));
                Ok(CheckConfig {
                    kernel: kernel.name().to_string(),
                    original,
                    transformed,
                    options: options.clone(),
                    report_path,
                })
            })
            .collect()
    }
}

impl crate::Checks {
    /// Merges every enabled check with the global defaults.
    ///
    /// Relative paths are resolved against `base`.
    pub fn materialize(&self, base: &Path, registry: &Registry) -> Result<Materialized, Error> {
        let results_dir = self
            .config
            .results_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR))
            .resolve(base);

        let mut checks = Vec::new();
        for (name, check) in self.enabled() {
            let kernel = registry.get(name)?;
            checks.extend(check.materialize(kernel.as_ref(), &self.config, &results_dir)?);
        }
        log::debug!("materialized {} checks", checks.len());

        Ok(Materialized {
            config: MaterializedConfig {
                results_dir,
                concurrency: self.config.concurrency,
            },
            checks,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Checks, Error};
    use color_eyre::eyre;
    use polyverify::{Schedule, Tolerance};
    use polyverify_kernels::Registry;
    use pretty_assertions_sorted as diff;
    use std::path::{Path, PathBuf};

    fn registry() -> Registry {
        Registry::with_default_kernels::<f64>()
    }

    #[test]
    fn test_absent_transformed_expands_to_legal_schedules() -> eyre::Result<()> {
        let checks = Checks::from_str("checks:\n  atax: {}\n")?;
        let materialized = checks.materialize(Path::new("/base"), &registry())?;
        let transformed: Vec<_> = materialized.checks.iter().map(|c| c.transformed).collect();
        diff::assert_eq!(
            transformed,
            vec![
                Schedule::Distributed,
                Schedule::Interchanged,
                Schedule::Tiled(16),
                Schedule::Parallel,
            ]
        );
        diff::assert_eq!(materialized.config.results_dir, PathBuf::from("/base/results"));
        diff::assert_eq!(
            materialized.checks[2].report_path,
            PathBuf::from("/base/results/atax/reference-vs-tiled16.json")
        );
        Ok(())
    }

    #[test]
    fn test_check_overrides_defaults() -> eyre::Result<()> {
        let checks = r"
results_dir: /tmp/results
trials: 50
seed: 1
tolerance:
  abs: 1.0e-6
  rel: 0.0
checks:
  bicg:
    transformed:
      - parallel
    trials: 5
  gemm:
    transformed:
      - tiled:4
    seed: 9
  mvt:
    enabled: false
";
        let checks = Checks::from_str(checks)?;
        let materialized = checks.materialize(Path::new("/base"), &registry())?;
        diff::assert_eq!(materialized.checks.len(), 2);

        let bicg = &materialized.checks[0];
        diff::assert_eq!(bicg.to_string(), "bicg reference vs parallel");
        diff::assert_eq!(bicg.options.trials, 5);
        diff::assert_eq!(bicg.options.seed, Some(1));
        diff::assert_eq!(bicg.options.tolerance, Some(Tolerance::new(1e-6, 0.0)));

        let gemm = &materialized.checks[1];
        diff::assert_eq!(gemm.options.trials, 50);
        diff::assert_eq!(gemm.options.seed, Some(9));
        diff::assert_eq!(
            gemm.report_path,
            PathBuf::from("/tmp/results/gemm/reference-vs-tiled4.json")
        );
        Ok(())
    }

    #[test]
    fn test_unknown_kernel_is_rejected() -> eyre::Result<()> {
        let checks = Checks::from_str("checks:\n  lu: {}\n")?;
        let result = checks.materialize(Path::new("."), &registry());
        assert!(matches!(
            result,
            Err(Error::Check(polyverify::Error::UnknownKernel(name))) if name == "lu"
        ));
        Ok(())
    }

    #[test]
    fn test_illegal_schedule_is_rejected() -> eyre::Result<()> {
        let checks =
            Checks::from_str("checks:\n  seidel-2d:\n    transformed:\n      - interchanged\n")?;
        let result = checks.materialize(Path::new("."), &registry());
        assert!(matches!(
            result,
            Err(Error::Check(polyverify::Error::UnsupportedSchedule {
                kernel: "seidel-2d",
                schedule: Schedule::Interchanged,
            }))
        ));
        Ok(())
    }

    #[test]
    fn test_bundled_checks_file_materializes() -> eyre::Result<()> {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let mut checks = Checks::from(manifest_dir.join("checks.yml"))?;
        checks.resolve(&manifest_dir);
        let materialized = checks.materialize(&manifest_dir, &registry())?;
        assert!(materialized.checks.iter().all(|c| c.options.seed == Some(42)));
        assert!(materialized
            .checks
            .iter()
            .any(|c| c.kernel == "gemm" && c.transformed == Schedule::Tiled(32)));
        Ok(())
    }

    #[test]
    fn test_materialized_round_trips_through_yaml() -> eyre::Result<()> {
        let checks = Checks::from_str("seed: 3\nchecks:\n  aes: {}\n")?;
        let materialized = checks.materialize(Path::new("/base"), &registry())?;
        let yaml = serde_yaml::to_string(&materialized)?;
        let parsed: crate::Materialized = serde_yaml::from_str(&yaml)?;
        diff::assert_eq!(parsed, materialized);
        Ok(())
    }
}
