// src/lib.rs

//! Prefix relocation for portable Python installations
//!
//! A Python installation built under one prefix records that prefix in two
//! places: the `#!` line of every launcher script and the origin path stored
//! in every compiled module cache. This crate rewrites both so the tree works
//! from wherever it was moved to, without rebuilding anything.
//!
//! # Stages
//!
//! - Layout: find `bin/`, the scripts directory and `lib/pythonX.Y/`
//! - Scripts: rewrite launcher lines to `<prefix>/bin/python...`
//! - Module caches: point code objects at `<prefix>/lib/pythonX.Y/...`
//! - Symlinks: recreate `local/{bin,lib,include}` as relative links
//!
//! ```no_run
//! use prefix_relocate::{relocate, RelocateOptions};
//! use std::path::Path;
//!
//! let options = RelocateOptions::new().with_extra_args(["-E"]);
//! let report = relocate(Path::new("/opt/python"), &options)?;
//! println!("{}", report);
//! # Ok::<(), prefix_relocate::Error>(())
//! ```

pub mod config;
mod error;
pub mod filesystem;
pub mod layout;
pub mod pycache;
mod relocate;
mod report;
pub mod shebang;
pub mod symlinks;

pub use config::{MalformedPolicy, Platform, RelocateConfig, RelocateOptions, ScriptsDir};
pub use error::{Error, Result};
pub use layout::InstallationLayout;
pub use pycache::CacheRelocator;
pub use relocate::relocate;
pub use report::{RelocationReport, SkippedFile};
pub use shebang::{InterpreterForm, OrderedSet, Shebang, ShebangRewriter};
