// src/report.rs

//! Outcome of a relocation run

use std::fmt;
use std::path::{Path, PathBuf};

/// A file a stage looked at but did not rewrite, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Files touched and skipped by a relocation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    /// Launcher scripts whose first line was rewritten
    pub scripts: Vec<PathBuf>,
    /// Module caches whose origin paths were rewritten
    pub caches: Vec<PathBuf>,
    /// Convenience symlinks that were recreated
    pub symlinks: Vec<PathBuf>,
    /// Files that could not be read
    pub skipped: Vec<SkippedFile>,
    /// Module caches that could not be parsed or re-encoded
    pub malformed: Vec<SkippedFile>,
}

impl RelocationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of files written
    pub fn touched(&self) -> usize {
        self.scripts.len() + self.caches.len() + self.symlinks.len()
    }

    pub(crate) fn skip(&mut self, path: &Path, reason: impl ToString) {
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }

    pub(crate) fn malformed(&mut self, path: &Path, reason: impl ToString) {
        self.malformed.push(SkippedFile {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }
}

impl fmt::Display for RelocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scripts, {} module caches, {} symlinks updated",
            self.scripts.len(),
            self.caches.len(),
            self.symlinks.len()
        )?;
        if !self.skipped.is_empty() {
            write!(f, "; {} skipped", self.skipped.len())?;
        }
        if !self.malformed.is_empty() {
            write!(f, "; {} malformed", self.malformed.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touched_and_display() {
        let mut report = RelocationReport::new();
        assert_eq!(report.touched(), 0);
        assert_eq!(report.to_string(), "0 scripts, 0 module caches, 0 symlinks updated");

        report.scripts.push(PathBuf::from("/opt/py/bin/pip"));
        report.caches.push(PathBuf::from("/opt/py/lib/python3.11/os.pyc"));
        report.malformed(Path::new("/opt/py/lib/python3.11/bad.pyc"), "truncated");
        assert_eq!(report.touched(), 2);
        assert_eq!(
            report.to_string(),
            "1 scripts, 1 module caches, 0 symlinks updated; 1 malformed"
        );
    }
}
