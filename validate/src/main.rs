mod options;
mod progress;

use chrono::offset::Local;
use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use console::{style, Style};
use indicatif::ProgressBar;
use options::{Command, Options};
use polyverify::DType;
use polyverify_kernels::Registry;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use validate::paths::PathExt;
use validate::run::{self, Outcome, Summary, SummaryRow};
use validate::{CheckConfig, Checks, Materialized};

fn registry(bits: usize) -> eyre::Result<Registry> {
    let dtype = DType::from_bits(bits).ok_or_else(|| eyre::eyre!("invalid dtype {bits:?}"))?;
    log::debug!("using {dtype} kernels");
    Ok(Registry::for_dtype(dtype))
}

fn parse_checks(options: &Options, registry: &Registry) -> eyre::Result<Materialized> {
    let cwd = std::env::current_dir()?;
    let default_checks_file_path = cwd.join("checks.yml");

    let checks_file_path = match options.checks_file_path {
        Some(ref path) => Some(
            path.canonicalize()
                .wrap_err_with(|| format!("{} does not exist", path.display()))?,
        ),
        None if default_checks_file_path.is_file() => Some(default_checks_file_path),
        None => None,
    };

    let (mut checks, base_dir) = match checks_file_path {
        Some(ref path) => {
            let base_dir = path
                .parent()
                .ok_or_else(|| eyre::eyre!("{} has no parent base path", path.display()))?
                .to_path_buf();
            (Checks::from(path)?, base_dir)
        }
        // every legal schedule of every kernel
        None => (Checks::all(registry), cwd.clone()),
    };
    checks.resolve(&base_dir);

    let materialized = checks.materialize(&base_dir, registry)?;

    if let Some(ref materialize_path) = checks.config.materialize {
        use std::io::Write;
        let mut materialize_file = utils::fs::open_writable(materialize_path)?;
        write!(
            &mut materialize_file,
            r"
##
## AUTO GENERATED! DO NOT EDIT
##
## this configuration was materialized from {} on {}
##

",
            checks_file_path
                .as_deref()
                .map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
            Local::now().format("%d/%m/%Y %T"),
        )?;
        serde_yaml::to_writer(&mut materialize_file, &materialized)?;
        println!(
            "materialized to {}",
            materialize_path.relative_to(&cwd).display()
        );
    }

    Ok(materialized)
}

/// Keeps the selected kernels and applies command line overrides.
fn filter_checks(checks: &mut Vec<CheckConfig>, options: &Options) {
    checks.retain(|check| {
        if options.selected_kernels.is_empty() {
            // keep all checks when no filters provided
            return true;
        }
        let kernel = check.kernel.to_lowercase();
        options
            .selected_kernels
            .iter()
            .any(|selected| selected.trim().to_lowercase() == kernel)
    });
    for check in checks.iter_mut() {
        if let Some(trials) = options.trials {
            check.options.trials = trials;
        }
        if let Some(seed) = options.seed {
            check.options.seed = Some(seed);
        }
    }
}

fn print_check_result(
    check: &CheckConfig,
    outcome: &Outcome,
    elapsed: Duration,
    bar: &ProgressBar,
    results_dir: &Path,
) {
    let (color, status) = match outcome {
        Outcome::Passed(report) => (
            Style::new().green(),
            format!(
                "passed in {elapsed:?} (max abs diff {:e})",
                report.max_abs_diff()
            ),
        ),
        Outcome::Diverged(report) => {
            let first = report.first_divergence().map_or_else(String::new, |(array, first)| {
                format!(
                    ": {array} {:?} in trial {} (seed {})",
                    first.divergence.index, first.trial, first.seed
                )
            });
            (
                Style::new().red(),
                format!(
                    "diverged after {elapsed:?}, {} elements{first}",
                    report.divergent_elements()
                ),
            )
        }
        Outcome::Failed(err) => {
            static PREVIEW_LEN: usize = 75;
            let mut err_preview = err.to_string();
            if err_preview.len() > PREVIEW_LEN {
                let end = (0..=PREVIEW_LEN)
                    .rev()
                    .find(|i| err_preview.is_char_boundary(*i))
                    .unwrap_or(0);
                err_preview = format!("{} ...", &err_preview[..end]);
            }
            (
                Style::new().red(),
                format!("failed after {elapsed:?}: {err_preview}"),
            )
        }
        Outcome::Canceled => (Style::new().yellow(), "canceled".to_string()),
    };
    let report_path = check.report_path.relative_to(results_dir);
    bar.suspend(|| {
        println!(
            "{:>15} {:>14} [ {} vs {} ] {} {}",
            "checking",
            color.apply_to(&check.kernel),
            check.original,
            check.transformed,
            color.apply_to(status),
            style(report_path.display()).dim(),
        );
    });
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let start = Instant::now();

    // load env variables from .env files
    dotenv::dotenv().ok();

    if let Some(num_threads) = polyverify::parallel::init_thread_pool()? {
        println!("worker threads: {num_threads}");
    }

    let options = Options::parse();
    let registry = registry(options.dtype)?;

    if let Command::List(_) = options.command {
        for kernel in registry.iter() {
            let schedules: Vec<String> =
                kernel.schedules().iter().map(ToString::to_string).collect();
            println!("{:<14} {}", style(kernel.name()).bold(), schedules.join(", "));
        }
        return Ok(());
    }

    let materialized = parse_checks(&options, &registry)?;
    let results_dir = materialized.config.results_dir.clone();
    let mut checks = materialized.checks.clone();
    filter_checks(&mut checks, &options);

    if let Command::Expand(ref opts) = options.command {
        if opts.full {
            println!("{materialized:#?}");
        } else {
            print!("{}", serde_yaml::to_string(&checks)?);
        }
        return Ok(());
    }

    let concurrency = options
        .concurrency
        .or(materialized.config.concurrency)
        .unwrap_or_else(num_cpus::get_physical)
        .max(1);
    println!("concurrency: {}", &concurrency);

    let num_checks = checks.len();

    // create progress bar
    let bar = if options.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(num_checks as u64);
        bar.enable_steady_tick(Duration::from_secs_f64(1.0 / 10.0));
        bar.set_style(progress::Style::default().into());
        bar
    };

    let results = run::run_all(
        Arc::new(registry),
        checks,
        concurrency,
        options.fail_fast,
        &bar,
        |check, outcome, elapsed| {
            print_check_result(check, outcome, elapsed, &bar, &results_dir);
        },
    )
    .await;
    bar.finish();

    let finished_at = Local::now();
    let mut summary = Summary::default();
    let mut rows = Vec::with_capacity(results.len());
    for (check, outcome, elapsed) in &results {
        summary.add(outcome);
        rows.push(SummaryRow::new(check, outcome, *elapsed, finished_at));
        match outcome {
            Outcome::Diverged(report) => {
                eprintln!(
                    "============ {} ============",
                    style(format!("{check} diverged")).red()
                );
                eprintln!("{report}\n");
            }
            Outcome::Failed(err) => {
                eprintln!(
                    "============ {} ============",
                    style(format!("{check} failed")).red()
                );
                eprintln!("{err:?}\n");
            }
            Outcome::Passed(_) | Outcome::Canceled => {}
        }
    }
    assert_eq!(num_checks, summary.total());

    let summary_path = results_dir.join("summary.csv");
    run::write_summary(&summary_path, &rows)?;

    let failed_msg = style(format!("{} failed", summary.failed));
    println!(
        "\n\n => ran {} checks in {:?}: {} passed, {} canceled, {}",
        num_checks,
        start.elapsed(),
        summary.passed,
        summary.canceled,
        if summary.failed > 0 {
            failed_msg.red()
        } else {
            failed_msg
        },
    );
    println!("summary written to {}", summary_path.display());

    std::process::exit(summary.exit_code());
}
