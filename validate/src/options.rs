use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default, Clone)]
pub struct Run {}

#[derive(Parser, Debug, Default, Clone)]
pub struct List {}

#[derive(Parser, Debug, Default, Clone)]
pub struct Expand {
    #[clap(long = "full", help = "print the full materialized config")]
    pub full: bool,
}

#[derive(Parser, Debug, Clone)]
pub enum Command {
    /// Run the checks.
    Run(Run),
    /// List kernels and their legal schedules.
    List(List),
    /// Print the materialized checks.
    Expand(Expand),
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Run(_) => "run",
                Self::List(_) => "list",
                Self::Expand(_) => "expand",
            }
        )
    }
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    #[clap(short = 'p', long = "path", help = "path to checks yaml file")]
    pub checks_file_path: Option<PathBuf>,

    #[clap(short = 'k', long = "kernel", help = "name of kernel to check")]
    pub selected_kernels: Vec<String>,

    #[clap(long = "seed", env = "SEED", help = "base seed for all checks")]
    pub seed: Option<u64>,

    #[clap(long = "trials", help = "number of trials for all checks")]
    pub trials: Option<usize>,

    #[clap(long = "dtype", default_value = "64", help = "float width of the dense kernels")]
    pub dtype: usize,

    #[clap(long = "fail-fast", help = "fail fast", default_value = "false")]
    pub fail_fast: bool,

    #[clap(
        short = 'c',
        long = "concurrency",
        help = "number of checks to run concurrently"
    )]
    pub concurrency: Option<usize>,

    #[clap(long = "no-progress", help = "hide progress bar")]
    pub no_progress: bool,

    #[clap(subcommand)]
    pub command: Command,
}
