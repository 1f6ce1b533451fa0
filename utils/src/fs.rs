use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    CreateDirs,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Read => "open for reading",
            Self::Write => "open for writing",
            Self::CreateDirs => "create directories",
        })
    }
}

/// Failed file system action on a result or config file.
#[derive(thiserror::Error, Debug)]
#[error("failed to {action} {}", path.display())]
pub struct Error {
    pub action: Action,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl Error {
    fn new(action: Action, path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(err.source.kind(), err)
    }
}

pub fn open_readable(path: impl AsRef<Path>) -> Result<BufReader<File>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(Error::new(Action::Read, path))?;
    Ok(BufReader::new(file))
}

/// Opens `path` for writing, truncating it and creating missing parent directories.
pub fn open_writable(path: impl AsRef<Path>) -> Result<BufWriter<File>, Error> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dirs(parent)?;
    }
    let file = File::create(path).map_err(Error::new(Action::Write, path))?;
    Ok(BufWriter::new(file))
}

pub fn create_dirs(path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(Error::new(Action::CreateDirs, path))
}

/// Lexically removes `.` and `..` components.
///
/// Does not touch the file system, so the result directory of a check may not exist yet.
#[must_use]
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref()
        .components()
        .fold(PathBuf::new(), |mut normalized, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other.as_os_str()),
            }
            normalized
        })
}
