// src/shebang/mod.rs

//! Launcher script rewriting
//!
//! Only the first line of a script changes. Its line ending and every byte
//! after it are copied through, and the file keeps its permissions. A line
//! that already points at the target interpreter is not rewritten.

mod args;
mod line;

pub use args::OrderedSet;
pub use line::{InterpreterForm, Shebang};

use crate::config::{Platform, RelocateOptions};
use crate::error::{Error, Result};
use crate::filesystem::replace_file;
use crate::report::RelocationReport;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to one script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Rewritten,
    /// Already points at the target interpreter
    Unchanged,
    /// Not a launcher for this runtime
    NotLauncher,
}

/// Rewrites launcher lines to point at one prefix
#[derive(Debug, Clone)]
pub struct ShebangRewriter {
    prefix: String,
    platform: Platform,
    clear_args: bool,
    extra_args: Vec<String>,
}

impl ShebangRewriter {
    pub fn new(prefix: &Path, options: &RelocateOptions) -> Self {
        Self {
            prefix: prefix.to_string_lossy().into_owned(),
            platform: options.platform,
            clear_args: options.clear_args,
            extra_args: options.extra_args.clone(),
        }
    }

    /// New first line for `line`, or `None` when it is not a launcher line
    ///
    /// A line that already launches the target interpreter with the target
    /// arguments is returned as is, whatever its spacing.
    pub fn rewrite_line(&self, line: &str) -> Option<String> {
        let shebang = Shebang::parse(line, self.platform)?;
        let new = shebang.retarget(&self.prefix, self.platform, self.clear_args, &self.extra_args);
        if shebang.same_target(&new) {
            Some(line.to_string())
        } else {
            Some(new.render())
        }
    }

    /// Rewrite the first line of one script in place
    pub fn rewrite_script(&self, path: &Path) -> Result<ScriptOutcome> {
        let bytes = fs::read(path).map_err(|source| Error::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })?;
        let content = std::str::from_utf8(&bytes).map_err(|e| Error::UnreadableFile {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        let (first_line, rest) = split_first_line(content);
        let Some(new_line) = self.rewrite_line(first_line) else {
            return Ok(ScriptOutcome::NotLauncher);
        };
        if new_line == first_line {
            return Ok(ScriptOutcome::Unchanged);
        }

        let mut updated = String::with_capacity(new_line.len() + rest.len());
        updated.push_str(&new_line);
        updated.push_str(rest);
        replace_file(path, updated.as_bytes())?;

        Ok(ScriptOutcome::Rewritten)
    }

    /// Rewrite every launcher script directly inside `dir`
    ///
    /// Entries are visited in name order. Subdirectories and symlinks are not
    /// followed. Files that cannot be read or written are recorded in the
    /// report and skipped.
    pub fn rewrite_scripts(&self, dir: &Path, report: &mut RelocationReport) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    report.skip(&path, e);
                    continue;
                }
            };
            if !file_type.is_file() {
                continue;
            }

            match self.rewrite_script(&path) {
                Ok(ScriptOutcome::Rewritten) => {
                    info!("S: {}", path.display());
                    report.scripts.push(path);
                }
                Ok(ScriptOutcome::Unchanged) => {
                    debug!("Script already relocated: {}", path.display());
                }
                Ok(ScriptOutcome::NotLauncher) => {}
                Err(Error::UnreadableFile { path, source }) => {
                    debug!("Skipping {}: {}", path.display(), source);
                    report.skip(&path, source);
                }
                Err(e) => {
                    warn!("Failed to rewrite {}: {}", path.display(), e);
                    report.skip(&path, e);
                }
            }
        }

        Ok(())
    }
}

/// Split off the first line, keeping its ending with the remainder
fn split_first_line(content: &str) -> (&str, &str) {
    let end = content.find('\n').unwrap_or(content.len());
    let line_end = if content[..end].ends_with('\r') { end - 1 } else { end };
    (&content[..line_end], &content[line_end..])
}
