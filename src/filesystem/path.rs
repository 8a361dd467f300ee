// src/filesystem/path.rs

//! Path helpers
//!
//! Origin paths written into module caches use the separator of the
//! installation's platform, which is not necessarily the host's. These
//! helpers work on strings for that reason.

use crate::error::Result;
use std::path::{Component, Path, PathBuf};

/// Make a path absolute against the current directory without touching the
/// filesystem
///
/// `.` components are dropped. `..` is kept, since popping it lexically would
/// resolve to the wrong directory when the preceding component is a symlink.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Join `base` with relative `parts` using `separator`
///
/// Separators of either kind inside `parts` are rewritten to `separator`, and
/// a trailing separator on `base` is not doubled. Empty parts are skipped.
pub fn join_with_separator<'a, I>(base: &str, parts: I, separator: char) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = base.trim_end_matches(['/', '\\']).to_string();
    if out.is_empty() && base.starts_with(['/', '\\']) {
        out.push(separator);
    }
    for part in parts {
        for piece in part.split(['/', '\\']).filter(|p| !p.is_empty()) {
            if !out.ends_with(separator) {
                out.push(separator);
            }
            out.push_str(piece);
        }
    }
    out
}

/// Components of a relative path as strings, lossily decoded
pub fn relative_parts(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
