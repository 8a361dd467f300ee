// src/symlinks.rs

//! Repair of convenience symlinks under `local/`
//!
//! Some installations carry `local/bin`, `local/lib` and `local/include` as
//! symlinks to their siblings. When those were created with absolute targets
//! they still point at the old location after a move; they are recreated as
//! `../<name>`. A link that cannot be repaired is recorded as skipped and
//! never fails the run.

use crate::report::RelocationReport;
use std::path::Path;

/// Entries under `local/` that are expected to link to `../<name>`
pub const LOCAL_LINKS: &[&str] = &["bin", "lib", "include"];

/// Recreate stale `local/*` symlinks under `base`
#[cfg(unix)]
pub fn repair_local_links(base: &Path, report: &mut RelocationReport) {
    use std::path::PathBuf;
    use tracing::{info, warn};

    let local_dir = base.join("local");
    if !local_dir.is_dir() {
        return;
    }

    for name in LOCAL_LINKS {
        let link = local_dir.join(name);
        let target = PathBuf::from(format!("../{}", name));

        match repair_link(&link, &target) {
            Ok(true) => {
                info!("L: {}", link.display());
                report.symlinks.push(link);
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to repair symlink {}: {}", link.display(), e);
                report.skip(&link, e);
            }
        }
    }
}

/// Symlinks are not repaired on this platform
#[cfg(not(unix))]
pub fn repair_local_links(_base: &Path, _report: &mut RelocationReport) {}

/// Point `link` at `target` if it is a symlink aimed elsewhere
///
/// Missing entries and non-symlinks are left alone. Returns whether the
/// link was recreated.
#[cfg(unix)]
fn repair_link(link: &Path, target: &Path) -> std::io::Result<bool> {
    use std::fs;

    let Ok(metadata) = fs::symlink_metadata(link) else {
        return Ok(false);
    };
    if !metadata.file_type().is_symlink() || fs::read_link(link)? == target {
        return Ok(false);
    }

    fs::remove_file(link)?;
    std::os::unix::fs::symlink(target, link)?;
    Ok(true)
}
