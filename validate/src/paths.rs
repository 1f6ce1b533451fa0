use std::path::{Path, PathBuf};

pub trait PathExt {
    #[must_use]
    fn resolve<P>(&self, base: P) -> PathBuf
    where
        P: AsRef<Path>;

    #[must_use]
    fn relative_to<P>(&self, base: P) -> PathBuf
    where
        P: AsRef<Path>;
}

impl PathExt for Path {
    #[inline]
    fn resolve<P>(&self, base: P) -> PathBuf
    where
        P: AsRef<Path>,
    {
        if self.is_absolute() {
            utils::fs::normalize_path(self)
        } else {
            utils::fs::normalize_path(base.as_ref().join(self))
        }
    }

    #[inline]
    fn relative_to<P>(&self, base: P) -> PathBuf
    where
        P: AsRef<Path>,
    {
        let rel_path = pathdiff::diff_paths(self, base).unwrap_or_else(|| self.to_path_buf());
        utils::fs::normalize_path(rel_path)
    }
}

/// File name component of a schedule, `tiled:8` becomes `tiled8`.
#[must_use]
pub fn schedule_file_stem(schedule: &polyverify::Schedule) -> String {
    schedule.to_string().replace(':', "")
}
