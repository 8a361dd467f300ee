// src/filesystem/atomic.rs

//! Atomic file replacement
//!
//! New content is written to a temporary file in the same directory, synced,
//! given the original file's permissions and renamed over it. A crash leaves
//! either the old content or the new content, never a partial file.

use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Replace `path` with `content`, preserving its permission bits
pub fn replace_file(path: &Path, content: &[u8]) -> Result<()> {
    let permissions = fs::metadata(path)?.permissions();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), permissions)?;

    temp.persist(path).map_err(|e| e.error)?;
    debug!("Replaced {} ({} bytes)", path.display(), content.len());
    Ok(())
}
