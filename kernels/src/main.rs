use clap::{Parser, Subcommand};
use color_eyre::eyre;
use console::style;
use polyverify::{DType, Options as CheckOptions, Real, Report, Schedule};
use polyverify_kernels::Registry;
use std::time::Instant;

#[derive(Debug, Subcommand)]
enum Command {
    /// Check one pair of schedules of a kernel.
    Check {
        kernel: String,
        #[arg(long = "original", default_value = "reference")]
        original: Schedule,
        #[arg(long = "transformed")]
        transformed: Schedule,
        #[arg(long = "trials", default_value = "100")]
        trials: usize,
        #[arg(long = "seed", env = "SEED")]
        seed: Option<u64>,
        #[arg(long = "dtype", default_value = "64")]
        dtype: usize,
    },
    /// Check every legal schedule of a kernel against its reference.
    All {
        kernel: String,
        #[arg(long = "trials", default_value = "10")]
        trials: usize,
        #[arg(long = "seed", env = "SEED")]
        seed: Option<u64>,
        #[arg(long = "dtype", default_value = "64")]
        dtype: usize,
    },
    /// List kernels and their legal schedules.
    List {},
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[clap(subcommand)]
    pub command: Command,
}

fn check<T>(
    kernel: &str,
    pairs: &[(Schedule, Schedule)],
    options: &CheckOptions,
) -> eyre::Result<Vec<Report>>
where
    T: Real + Default,
{
    let registry = Registry::with_default_kernels::<T>();
    let kernel = registry.get(kernel)?;
    pairs
        .iter()
        .map(|(original, transformed)| {
            let report = kernel.check(*original, *transformed, options)?;
            Ok(report)
        })
        .collect()
}

fn legal_pairs(kernel: &str) -> eyre::Result<Vec<(Schedule, Schedule)>> {
    let registry = Registry::with_default_kernels::<f64>();
    let pairs = registry
        .get(kernel)?
        .schedules()
        .into_iter()
        .filter(|schedule| *schedule != Schedule::Reference)
        .map(|schedule| (Schedule::Reference, schedule))
        .collect();
    Ok(pairs)
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    dotenv::dotenv().ok();
    env_logger::init();
    polyverify::parallel::init_thread_pool()?;

    let options = Options::parse();
    let start = Instant::now();

    let reports = match options.command {
        Command::List {} => {
            let registry = Registry::with_default_kernels::<f64>();
            for kernel in registry.iter() {
                let schedules: Vec<String> =
                    kernel.schedules().iter().map(ToString::to_string).collect();
                println!(
                    "{:<14} {}",
                    style(kernel.name()).bold(),
                    schedules.join(", ")
                );
            }
            return Ok(());
        }
        Command::Check {
            kernel,
            original,
            transformed,
            trials,
            seed,
            dtype,
        } => {
            let mut check_options = CheckOptions::default().trials(trials);
            check_options.seed = seed;
            let pairs = [(original, transformed)];
            match DType::from_bits(dtype) {
                Some(DType::F32) => check::<f32>(&kernel, &pairs, &check_options),
                Some(DType::F64) => check::<f64>(&kernel, &pairs, &check_options),
                None => return Err(eyre::eyre!("invalid dtype {dtype:?}")),
            }
        }
        Command::All {
            kernel,
            trials,
            seed,
            dtype,
        } => {
            let mut check_options = CheckOptions::default().trials(trials);
            check_options.seed = seed;
            let pairs = legal_pairs(&kernel)?;
            match DType::from_bits(dtype) {
                Some(DType::F32) => check::<f32>(&kernel, &pairs, &check_options),
                Some(DType::F64) => check::<f64>(&kernel, &pairs, &check_options),
                None => return Err(eyre::eyre!("invalid dtype {dtype:?}")),
            }
        }
    }?;

    let mut failed = false;
    for report in &reports {
        let status = if report.passed() {
            style("PASS").green()
        } else {
            failed = true;
            style("FAIL").red()
        };
        println!("[{status}] {report}");
    }
    eprintln!("completed {} checks in {:?}", reports.len(), start.elapsed());

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
