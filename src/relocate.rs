// src/relocate.rs

//! Relocation driver
//!
//! Resolves the layout, then runs the script, module-cache and symlink
//! stages in that order. Layout and prefix problems abort before anything is
//! written; per-file problems are collected in the report.

use crate::config::RelocateOptions;
use crate::error::{Error, Result};
use crate::filesystem::absolutize;
use crate::layout::InstallationLayout;
use crate::pycache::CacheRelocator;
use crate::report::RelocationReport;
use crate::shebang::ShebangRewriter;
use crate::symlinks::repair_local_links;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Relocate the installation at `base` to the prefix in `options`
///
/// When `options.prefix` is unset the installation is relocated to its own
/// absolute path, which is what a user who moved the tree wants.
pub fn relocate(base: &Path, options: &RelocateOptions) -> Result<RelocationReport> {
    let prefix = resolve_prefix(base, options)?;
    let layout = InstallationLayout::resolve(base, options.platform, &options.scripts_dir)?;

    info!(
        "Relocating {} to {}",
        layout.base().display(),
        prefix.display()
    );

    let mut report = RelocationReport::new();

    if options.rewrite_scripts {
        ShebangRewriter::new(&prefix, options).rewrite_scripts(layout.scripts_dir(), &mut report)?;
    } else {
        debug!("Skipping launcher scripts");
    }

    if options.rewrite_caches {
        CacheRelocator::for_layout(&layout, &prefix, options).relocate_caches(&mut report)?;
    } else {
        debug!("Skipping module caches");
    }

    if options.repair_symlinks {
        repair_local_links(layout.base(), &mut report);
    } else {
        debug!("Skipping local symlinks");
    }

    info!("Relocation complete: {}", report);
    Ok(report)
}

fn resolve_prefix(base: &Path, options: &RelocateOptions) -> Result<PathBuf> {
    match &options.prefix {
        Some(prefix) if prefix.is_absolute() => Ok(prefix.clone()),
        Some(prefix) => Err(Error::NonAbsoluteTarget(prefix.clone())),
        None => absolutize(base),
    }
}
