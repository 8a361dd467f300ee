// src/cli.rs
//! CLI definitions for the `relocate` binary
//!
//! The actual command implementation is in the `commands` module.

use clap::{Parser, ValueEnum};
use prefix_relocate::MalformedPolicy;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relocate")]
#[command(version)]
#[command(about = "Update a Python installation's scripts and module caches to a new prefix", long_about = None)]
pub struct Cli {
    /// Clear all existing interpreter arguments
    #[arg(short, long)]
    pub clear_args: bool,

    /// Path to scripts. Set to "auto" for autodetection
    #[arg(short = 'u', long, value_name = "DIR")]
    pub scripts_dir: Option<String>,

    /// Prefix to write into scripts and caches (default: absolute PATH)
    #[arg(short, long, value_name = "PATH")]
    pub prefix: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Additional directory name to skip while scanning module caches
    #[arg(long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// How to handle module caches that cannot be parsed
    #[arg(long, value_enum, value_name = "MODE")]
    pub on_malformed: Option<MalformedMode>,

    /// Do not rewrite launcher scripts
    #[arg(long)]
    pub skip_scripts: bool,

    /// Do not rewrite module caches
    #[arg(long)]
    pub skip_caches: bool,

    /// Do not repair local/ symlinks
    #[arg(long)]
    pub skip_symlinks: bool,

    /// Show names of updated files
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the Python installation
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Additional arguments to append to the interpreter
    #[arg(value_name = "ARGS", last = true)]
    pub extra_args: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MalformedMode {
    Ignore,
    Warn,
    Error,
}

impl From<MalformedMode> for MalformedPolicy {
    fn from(mode: MalformedMode) -> Self {
        match mode {
            MalformedMode::Ignore => Self::Ignore,
            MalformedMode::Warn => Self::Warn,
            MalformedMode::Error => Self::Error,
        }
    }
}
