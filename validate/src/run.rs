use crate::{materialize::CheckConfig, Error};
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use polyverify::Report;
use polyverify_kernels::Registry;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of running one check.
#[derive(Debug)]
pub enum Outcome {
    Passed(Report),
    Diverged(Report),
    /// The check could not run, e.g. because of a shape error.
    Failed(Error),
    Canceled,
}

impl Outcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Diverged(_) | Self::Failed(_))
    }

    #[must_use]
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Passed(report) | Self::Diverged(report) => Some(report),
            Self::Failed(_) | Self::Canceled => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Passed(_) => "passed",
            Self::Diverged(_) => "diverged",
            Self::Failed(_) => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// Runs `check` to completion on the calling thread.
pub fn run_check(registry: &Registry, check: &CheckConfig) -> Outcome {
    let kernel = match registry.get(&check.kernel) {
        Ok(kernel) => kernel,
        Err(err) => return Outcome::Failed(err.into()),
    };
    match kernel.check(check.original, check.transformed, &check.options) {
        Ok(report) if report.passed() => Outcome::Passed(report),
        Ok(report) => Outcome::Diverged(report),
        Err(err) => Outcome::Failed(err.into()),
    }
}

pub fn write_report(path: &Path, report: &Report) -> Result<(), Error> {
    let writer = utils::fs::open_writable(path)?;
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Runs `checks` with up to `concurrency` checks in flight.
///
/// The report of every finished check is written to its `report_path`, and a
/// report that cannot be written fails the check. With `fail_fast`, checks
/// that have not started when a check fails are canceled.
pub async fn run_all<F>(
    registry: Arc<Registry>,
    checks: Vec<CheckConfig>,
    concurrency: usize,
    fail_fast: bool,
    bar: &ProgressBar,
    on_finished: F,
) -> Vec<(CheckConfig, Outcome, Duration)>
where
    F: Fn(&CheckConfig, &Outcome, Duration),
{
    let should_exit = AtomicBool::new(false);
    let should_exit = &should_exit;
    let on_finished = &on_finished;

    stream::iter(checks)
        .map(|check| {
            let registry = registry.clone();
            async move {
                if should_exit.load(Ordering::Relaxed) {
                    bar.inc(1);
                    return (check, Outcome::Canceled, Duration::ZERO);
                }
                bar.set_message(check.to_string());
                let start = Instant::now();
                let outcome = {
                    let check = check.clone();
                    tokio::task::spawn_blocking(move || run_check(&registry, &check))
                        .await
                        .unwrap_or_else(|err| Outcome::Failed(err.into()))
                };
                let elapsed = start.elapsed();

                let written = outcome
                    .report()
                    .map(|report| write_report(&check.report_path, report));
                let outcome = match written {
                    Some(Err(err)) => {
                        log::error!("failed to write {}: {err}", check.report_path.display());
                        Outcome::Failed(err)
                    }
                    Some(Ok(())) | None => outcome,
                };

                bar.inc(1);
                on_finished(&check, &outcome, elapsed);

                if fail_fast && outcome.is_failure() {
                    should_exit.store(true, Ordering::Relaxed);
                }
                (check, outcome, elapsed)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

/// One row of `summary.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub kernel: String,
    pub original: String,
    pub transformed: String,
    pub status: &'static str,
    pub trials: usize,
    pub seed: Option<u64>,
    pub divergent: usize,
    pub max_abs_diff: Option<f64>,
    pub max_rel_diff: Option<f64>,
    pub first_array: Option<String>,
    pub first_index: Option<String>,
    pub elapsed_secs: f64,
    pub finished_at: String,
}

impl SummaryRow {
    #[must_use]
    pub fn new(
        check: &CheckConfig,
        outcome: &Outcome,
        elapsed: Duration,
        finished_at: DateTime<Local>,
    ) -> Self {
        let report = outcome.report();
        let first = report.and_then(Report::first_divergence);
        Self {
            kernel: check.kernel.clone(),
            original: check.original.to_string(),
            transformed: check.transformed.to_string(),
            status: outcome.status(),
            trials: report.map_or(0, |r| r.trials),
            seed: report.map(|r| r.seed).or(check.options.seed),
            divergent: report.map_or(0, Report::divergent_elements),
            max_abs_diff: report.map(Report::max_abs_diff),
            max_rel_diff: report.map(Report::max_rel_diff),
            first_array: first.map(|(array, _)| array.to_string()),
            first_index: first.map(|(_, first)| format!("{:?}", first.divergence.index)),
            elapsed_secs: elapsed.as_secs_f64(),
            finished_at: finished_at.to_rfc3339(),
        }
    }
}

pub fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<(), Error> {
    let writer = utils::fs::open_writable(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .flexible(false)
        .from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Passed, failed and canceled counts of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl Summary {
    pub fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Passed(_) => self.passed += 1,
            Outcome::Diverged(_) | Outcome::Failed(_) => self.failed += 1,
            Outcome::Canceled => self.canceled += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.canceled
    }

    /// Process exit code, nonzero if any check failed.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        run_all, run_check, write_report, write_summary, Outcome, Summary, SummaryRow,
    };
    use crate::materialize::CheckConfig;
    use indicatif::ProgressBar;
    use polyverify::{Error, Init, Kernel, Options, Output, Report, Schedule, Tolerance};
    use polyverify_kernels::Registry;
    use pretty_assertions_sorted as diff;
    use std::cell::Cell;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    /// Kernel whose interchanged schedule corrupts the first output byte.
    #[derive(Debug, Default)]
    struct Corrupting;

    impl Kernel for Corrupting {
        type State = Vec<u8>;

        fn name(&self) -> &'static str {
            "corrupting"
        }

        fn schedules(&self) -> Vec<Schedule> {
            vec![Schedule::Reference, Schedule::Interchanged]
        }

        fn init(&self, _init: &mut Init) -> Vec<u8> {
            vec![1, 2, 3]
        }

        fn run(&self, schedule: Schedule, state: &mut Vec<u8>) -> Result<(), Error> {
            if schedule == Schedule::Interchanged {
                state[0] += 1;
            }
            Ok(())
        }

        fn outputs(&self, state: &Vec<u8>) -> Vec<Output> {
            vec![Output::bytes("out", state)]
        }
    }

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::with_default_kernels::<f64>();
        registry.register(Corrupting);
        Arc::new(registry)
    }

    fn check_in(dir: &Path, kernel: &str, transformed: Schedule) -> CheckConfig {
        CheckConfig {
            report_path: dir.join(format!("{kernel}.json")),
            ..check(kernel, transformed)
        }
    }

    fn summarize(results: &[(CheckConfig, Outcome, Duration)]) -> Summary {
        let mut summary = Summary::default();
        for (_, outcome, _) in results {
            summary.add(outcome);
        }
        summary
    }

    fn check(kernel: &str, transformed: Schedule) -> CheckConfig {
        CheckConfig {
            kernel: kernel.to_string(),
            original: Schedule::Reference,
            transformed,
            options: Options::default().trials(2).seed(5),
            report_path: PathBuf::from("unused.json"),
        }
    }

    #[test]
    fn test_passing_check() {
        let registry = Registry::with_default_kernels::<f64>();
        let outcome = run_check(&registry, &check("mvt", Schedule::Interchanged));
        assert!(matches!(outcome, Outcome::Passed(_)), "{outcome:?}");
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_unsupported_schedule_fails() {
        let registry = Registry::with_default_kernels::<f64>();
        let outcome = run_check(&registry, &check("adi", Schedule::Tiled(4)));
        assert!(outcome.is_failure());
        assert_eq!(outcome.status(), "failed");
    }

    #[test]
    fn test_summary_exit_code() {
        let report = Report::new(
            "atax",
            Schedule::Reference,
            Schedule::Parallel,
            1,
            Tolerance::default(),
        );
        let mut summary = Summary::default();
        summary.add(&Outcome::Passed(report.clone()));
        summary.add(&Outcome::Canceled);
        diff::assert_eq!(summary.exit_code(), 0);
        summary.add(&Outcome::Diverged(report));
        diff::assert_eq!(
            summary,
            Summary {
                passed: 1,
                failed: 1,
                canceled: 1
            }
        );
        diff::assert_eq!(summary.total(), 3);
        diff::assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_write_report_and_summary() -> color_eyre::eyre::Result<()> {
        let dir = std::env::temp_dir().join(format!("validate-run-{}", std::process::id()));
        let registry = Registry::with_default_kernels::<f64>();
        let check = check("gesummv", Schedule::Parallel);
        let outcome = run_check(&registry, &check);
        let report = outcome.report().expect("report");

        let report_path = dir.join("gesummv/reference-vs-parallel.json");
        write_report(&report_path, report)?;
        let written: Report = serde_json::from_reader(utils::fs::open_readable(&report_path)?)?;
        diff::assert_eq!(&written, report);

        let elapsed = Duration::from_millis(1500);
        let row = SummaryRow::new(&check, &outcome, elapsed, chrono::Local::now());
        diff::assert_eq!(row.status, "passed");
        diff::assert_eq!(row.seed, Some(5));
        diff::assert_eq!(row.elapsed_secs, 1.5);

        let summary_path = dir.join("summary.csv");
        write_summary(&summary_path, &[row])?;
        let mut reader = csv::Reader::from_path(&summary_path)?;
        let headers = reader.headers()?.clone();
        diff::assert_eq!(&headers[0], "kernel");
        diff::assert_eq!(reader.records().count(), 1);

        std::fs::remove_dir_all(dir)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_pending_checks() -> color_eyre::eyre::Result<()> {
        let dir = std::env::temp_dir().join(format!("validate-fail-fast-{}", std::process::id()));
        let checks = vec![
            check_in(&dir, "corrupting", Schedule::Interchanged),
            check_in(&dir, "mvt", Schedule::Interchanged),
            check_in(&dir, "atax", Schedule::Parallel),
        ];
        let finished = Cell::new(0);
        let results = run_all(registry(), checks, 1, true, &ProgressBar::hidden(), |_, _, _| {
            finished.set(finished.get() + 1);
        })
        .await;

        let statuses: Vec<_> = results.iter().map(|(_, outcome, _)| outcome.status()).collect();
        diff::assert_eq!(statuses, vec!["diverged", "canceled", "canceled"]);
        diff::assert_eq!(finished.get(), 1);
        let summary = summarize(&results);
        diff::assert_eq!(
            summary,
            Summary {
                passed: 0,
                failed: 1,
                canceled: 2
            }
        );
        diff::assert_eq!(summary.exit_code(), 1);

        let written: Report =
            serde_json::from_reader(utils::fs::open_readable(dir.join("corrupting.json"))?)?;
        diff::assert_eq!(written.divergent_elements(), 2);
        assert!(!dir.join("mvt.json").exists());

        std::fs::remove_dir_all(dir)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_divergence_without_fail_fast_keeps_going() -> color_eyre::eyre::Result<()> {
        let dir = std::env::temp_dir().join(format!("validate-keep-going-{}", std::process::id()));
        let checks = vec![
            check_in(&dir, "corrupting", Schedule::Interchanged),
            check_in(&dir, "mvt", Schedule::Interchanged),
        ];
        let results = run_all(registry(), checks, 2, false, &ProgressBar::hidden(), |_, _, _| {})
            .await;
        let summary = summarize(&results);
        diff::assert_eq!(
            summary,
            Summary {
                passed: 1,
                failed: 1,
                canceled: 0
            }
        );
        diff::assert_eq!(summary.exit_code(), 1);
        assert!(dir.join("mvt.json").is_file());

        std::fs::remove_dir_all(dir)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_unwritable_report_fails_check() -> color_eyre::eyre::Result<()> {
        let dir = std::env::temp_dir().join(format!("validate-unwritable-{}", std::process::id()));
        // a file where the report directory should be
        let blocker = dir.join("blocker");
        utils::fs::create_dirs(&dir)?;
        std::fs::write(&blocker, b"")?;

        let mut passing = check("mvt", Schedule::Interchanged);
        passing.report_path = blocker.join("mvt.json");
        let results =
            run_all(registry(), vec![passing], 1, false, &ProgressBar::hidden(), |_, _, _| {})
                .await;

        let (_, outcome, _) = &results[0];
        assert!(matches!(outcome, Outcome::Failed(_)), "{outcome:?}");
        diff::assert_eq!(summarize(&results).exit_code(), 1);

        std::fs::remove_dir_all(dir)?;
        Ok(())
    }
}
