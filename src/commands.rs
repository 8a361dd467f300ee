// src/commands.rs
//! Command handler for the `relocate` binary

use crate::cli::Cli;
use anyhow::{Context, Result};
use prefix_relocate::{relocate, RelocateConfig, RelocateOptions, ScriptsDir};
use tracing::info;

/// Build run options from the config file (if any) and command-line flags
///
/// Flags given on the command line override values from the file.
pub fn build_options(cli: &Cli) -> Result<RelocateOptions> {
    let mut options = match &cli.config {
        Some(path) => RelocateConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .into_options(),
        None => RelocateOptions::new(),
    };

    if cli.clear_args {
        options.clear_args = true;
    }
    if !cli.extra_args.is_empty() {
        options.extra_args = cli.extra_args.clone();
    }
    if let Some(dir) = &cli.scripts_dir {
        options.scripts_dir = ScriptsDir::parse(dir);
    }
    if let Some(prefix) = &cli.prefix {
        options.prefix = Some(prefix.clone());
    }
    for name in &cli.exclude {
        if !options.is_excluded(name) {
            options.exclude_dirs.push(name.clone());
        }
    }
    if let Some(mode) = cli.on_malformed {
        options.on_malformed = mode.into();
    }

    options.rewrite_scripts &= !cli.skip_scripts;
    options.rewrite_caches &= !cli.skip_caches;
    options.repair_symlinks &= !cli.skip_symlinks;

    Ok(options)
}

/// Run a relocation from parsed command-line arguments
pub fn cmd_relocate(cli: &Cli) -> Result<()> {
    let options = build_options(cli)?;
    info!("Relocating installation at: {}", cli.path.display());

    let report = relocate(&cli.path, &options)
        .with_context(|| format!("Failed to relocate {}", cli.path.display()))?;

    if cli.verbose {
        println!("{}", report);
    }
    Ok(())
}
