// src/pycache.rs

//! Module-cache relocation
//!
//! Every `.pyc` / `.pyo` under the library directory records the path of the
//! source it was compiled from, once per code object. After a move those
//! paths point at the old location. This module walks the library tree,
//! decodes each cache with `relocate_marshal`, points all code objects at
//! the source file under the new prefix and writes the cache back. Header
//! bytes are kept as they are, so the interpreter's freshness checks still
//! pass.

use crate::config::{MalformedPolicy, RelocateOptions};
use crate::error::{Error, Result};
use crate::filesystem::{join_with_separator, path::relative_parts, replace_file};
use crate::layout::InstallationLayout;
use crate::report::RelocationReport;
use relocate_marshal::Container;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const CACHE_EXTENSIONS: &[&str] = &["pyc", "pyo"];
const PYCACHE_DIR: &str = "__pycache__";

/// Whether `path` names a module-cache file
pub fn is_cache_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CACHE_EXTENSIONS.contains(&ext))
}

/// Source path components for a cache path relative to the library root
///
/// `pkg/mod.pyc` maps to `pkg/mod.py` and
/// `pkg/__pycache__/mod.cpython-311.pyc` maps to `pkg/mod.py`.
pub fn source_parts(relative: &Path) -> Option<Vec<String>> {
    let mut parts = relative_parts(relative);
    let file_name = parts.pop()?;

    let stem = if parts.last().map(String::as_str) == Some(PYCACHE_DIR) {
        parts.pop();
        file_name.split('.').next()?.to_string()
    } else {
        Path::new(&file_name).file_stem()?.to_string_lossy().into_owned()
    };
    if stem.is_empty() {
        return None;
    }

    parts.push(format!("{}.py", stem));
    Some(parts)
}

/// Point every code object in a cache file at `origin`
///
/// Returns the new file content, or `None` when every code object already
/// records `origin`.
pub fn retarget_container(bytes: &[u8], origin: &str) -> Result<Option<Vec<u8>>> {
    let mut container = Container::parse(bytes)?;
    let changed = container.graph_mut().set_filenames(origin);
    if changed == 0 {
        return Ok(None);
    }
    debug!("Retargeted {} code objects to {}", changed, origin);
    Ok(Some(container.to_bytes()?))
}

/// Rewrites origin paths of module caches under one library directory
#[derive(Debug, Clone)]
pub struct CacheRelocator {
    lib_dir: PathBuf,
    target_lib: String,
    separator: char,
    exclude_dirs: Vec<String>,
    policy: MalformedPolicy,
}

impl CacheRelocator {
    /// Caches found under `lib_dir` get origins under `target_lib`
    pub fn new(
        lib_dir: impl Into<PathBuf>,
        target_lib: impl Into<String>,
        options: &RelocateOptions,
    ) -> Self {
        Self {
            lib_dir: lib_dir.into(),
            target_lib: target_lib.into(),
            separator: options.platform.separator(),
            exclude_dirs: options.exclude_dirs.clone(),
            policy: options.on_malformed,
        }
    }

    /// Relocator for an installation moving to `prefix`
    pub fn for_layout(
        layout: &InstallationLayout,
        prefix: &Path,
        options: &RelocateOptions,
    ) -> Self {
        let lib_relative = layout.lib_relative();
        let target_lib = join_with_separator(
            &prefix.to_string_lossy(),
            lib_relative.iter().map(String::as_str),
            layout.platform().separator(),
        );
        Self::new(layout.lib_dir(), target_lib, options)
    }

    /// New origin path for a cache file under the library directory
    pub fn origin_for(&self, cache: &Path) -> Option<String> {
        let relative = cache.strip_prefix(&self.lib_dir).ok()?;
        let parts = source_parts(relative)?;
        Some(join_with_separator(
            &self.target_lib,
            parts.iter().map(String::as_str),
            self.separator,
        ))
    }

    /// Relocate one cache file; returns whether it was rewritten
    pub fn relocate_cache(&self, path: &Path) -> Result<bool> {
        let Some(origin) = self.origin_for(path) else {
            return Ok(false);
        };

        let bytes = fs::read(path).map_err(|source| Error::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })?;

        let updated = retarget_container(&bytes, &origin).map_err(|e| match e {
            Error::Marshal(inner) => Error::malformed(path, inner),
            other => other,
        })?;

        match updated {
            Some(content) => {
                replace_file(path, &content)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Walk the library directory and relocate every cache file found
    pub fn relocate_caches(&self, report: &mut RelocationReport) -> Result<()> {
        let walker = WalkDir::new(&self.lib_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() > 0 && entry.file_type().is_dir() && self.is_excluded(entry))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(&self.lib_dir).to_path_buf();
                    debug!("Skipping {}: {}", path.display(), e);
                    report.skip(&path, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_cache_file(entry.path()) {
                continue;
            }
            let path = entry.path();

            match self.relocate_cache(path) {
                Ok(true) => {
                    info!("B: {}", path.display());
                    report.caches.push(path.to_path_buf());
                }
                Ok(false) => {}
                Err(Error::MalformedContainer { path, reason }) => match self.policy {
                    MalformedPolicy::Ignore => {
                        debug!("Ignoring malformed module cache {}: {}", path.display(), reason);
                        report.malformed(&path, reason);
                    }
                    MalformedPolicy::Warn => {
                        warn!("Malformed module cache {}: {}", path.display(), reason);
                        report.malformed(&path, reason);
                    }
                    MalformedPolicy::Error => {
                        return Err(Error::MalformedContainer { path, reason });
                    }
                },
                Err(Error::UnreadableFile { path, source }) => {
                    debug!("Skipping {}: {}", path.display(), source);
                    report.skip(&path, source);
                }
                Err(e) => {
                    warn!("Failed to rewrite {}: {}", path.display(), e);
                    report.skip(path, e);
                }
            }
        }

        Ok(())
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| self.exclude_dirs.iter().any(|d| d == name))
    }
}
