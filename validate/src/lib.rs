#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod materialize;
pub mod paths;
pub mod run;

use indexmap::IndexMap;
use paths::PathExt;
use polyverify::{Schedule, Tolerance};
use polyverify_kernels::Registry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use materialize::{CheckConfig, Materialized};

#[inline]
#[must_use]
pub fn bool_true() -> bool {
    true
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    YAML(#[from] serde_yaml::Error),

    #[error(transparent)]
    JSON(#[from] serde_json::Error),

    #[error(transparent)]
    CSV(#[from] csv::Error),

    #[error(transparent)]
    Check(#[from] polyverify::Error),

    #[error("check worker failed")]
    Join(#[from] tokio::task::JoinError),
}

impl From<utils::fs::Error> for Error {
    fn from(err: utils::fs::Error) -> Self {
        Self::Io(err.into())
    }
}

/// Checks of one kernel.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Check {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Schedule treated as ground truth, `reference` if unset.
    pub original: Option<Schedule>,
    /// Every legal schedule of the kernel if unset.
    pub transformed: Option<Vec<Schedule>>,
    pub trials: Option<usize>,
    pub seed: Option<u64>,
    pub tolerance: Option<Tolerance>,
}

impl Default for Check {
    fn default() -> Self {
        Self {
            enabled: true,
            original: None,
            transformed: None,
            trials: None,
            seed: None,
            tolerance: None,
        }
    }
}

/// Defaults shared by all checks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub results_dir: Option<PathBuf>,
    /// Where to write the materialized check list.
    pub materialize: Option<PathBuf>,
    pub trials: Option<usize>,
    pub seed: Option<u64>,
    pub tolerance: Option<Tolerance>,
    /// Number of checks run concurrently, the number of physical cores if unset.
    pub concurrency: Option<usize>,
}

/// Contents of a `checks.yml` file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Checks {
    #[serde(flatten)]
    pub config: Config,
    #[serde(default)]
    pub checks: IndexMap<String, Check>,
}

impl Checks {
    pub fn from(path: impl AsRef<Path>) -> Result<Self, Error> {
        let reader = utils::fs::open_readable(path.as_ref())?;
        Self::from_reader(reader)
    }

    pub fn from_reader(reader: impl std::io::BufRead) -> Result<Self, Error> {
        let checks = serde_yaml::from_reader(reader)?;
        Ok(checks)
    }

    pub fn from_str(s: impl AsRef<str>) -> Result<Self, Error> {
        let checks = serde_yaml::from_str(s.as_ref())?;
        Ok(checks)
    }

    /// Every legal schedule of every kernel in `registry`.
    #[must_use]
    pub fn all(registry: &Registry) -> Self {
        Self {
            config: Config::default(),
            checks: registry
                .names()
                .map(|name| (name.to_string(), Check::default()))
                .collect(),
        }
    }

    /// Resolve relative paths based on the location of the checks file.
    ///
    /// Note: this will leave absolute paths unchanged.
    pub fn resolve(&mut self, base: impl AsRef<Path>) {
        let base = base.as_ref();
        for path in [
            self.config.results_dir.as_mut(),
            self.config.materialize.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            *path = path.resolve(base);
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = (&String, &Check)> + '_ {
        self.checks.iter().filter(|(_, check)| check.enabled)
    }
}

impl<S> std::ops::Index<S> for Checks
where
    S: AsRef<str>,
{
    type Output = Check;

    fn index(&self, name: S) -> &Self::Output {
        &self.checks[name.as_ref()]
    }
}
