// src/layout.rs

//! Installation layout resolution
//!
//! Finds the binaries, scripts and library directories of a runtime
//! installation and checks that the interpreter is present. Nothing is
//! written here; a layout that fails to resolve stops the run before any
//! file is touched.

use crate::config::{Platform, ScriptsDir};
use crate::error::{Error, Result};
use crate::filesystem::absolutize;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static LIB_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^python(\d+\.\d+)$").expect("valid regex"));

/// Resolved directories of one installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationLayout {
    base: PathBuf,
    scripts_dir: PathBuf,
    lib_dir: PathBuf,
    version: Option<String>,
    platform: Platform,
}

impl InstallationLayout {
    /// Resolve and validate the layout under `base`
    pub fn resolve(base: &Path, platform: Platform, scripts: &ScriptsDir) -> Result<Self> {
        let base = absolutize(base)?;

        let bin_dir = base.join("bin");
        if !bin_dir.is_dir() {
            return Err(Error::invalid_installation(
                &base,
                format!("missing binaries directory {}", bin_dir.display()),
            ));
        }

        let scripts_dir = match scripts {
            ScriptsDir::Auto => base.join(platform.scripts_dir_name()),
            ScriptsDir::Path(path) => base.join(path),
        };
        if !scripts_dir.is_dir() {
            return Err(Error::invalid_installation(
                &base,
                format!("missing scripts directory {}", scripts_dir.display()),
            ));
        }

        let (lib_dir, version) = match platform {
            Platform::Posix => {
                let lib_parent = base.join("lib");
                let (name, version) = find_versioned_lib(&lib_parent).ok_or_else(|| {
                    Error::invalid_installation(
                        &base,
                        format!("no pythonX.Y directory in {}", lib_parent.display()),
                    )
                })?;
                (lib_parent.join(name), Some(version))
            }
            Platform::Windows => (base.join("Lib"), None),
        };
        if !lib_dir.is_dir() {
            return Err(Error::invalid_installation(
                &base,
                format!("missing library directory {}", lib_dir.display()),
            ));
        }

        let interpreter = bin_dir.join(platform.interpreter());
        if !interpreter.exists() {
            return Err(Error::invalid_installation(
                &base,
                format!("no interpreter in {}", bin_dir.display()),
            ));
        }

        debug!(
            "Resolved layout: base={} scripts={} lib={} version={:?}",
            base.display(),
            scripts_dir.display(),
            lib_dir.display(),
            version
        );

        Ok(Self {
            base,
            scripts_dir,
            lib_dir,
            version,
            platform,
        })
    }

    #[inline]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[inline]
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    #[inline]
    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    /// `X.Y` from the library folder name; `None` on Windows
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    #[inline]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Library directory relative to the base, as path components
    pub fn lib_relative(&self) -> Vec<String> {
        self.lib_dir
            .strip_prefix(&self.base)
            .map(crate::filesystem::path::relative_parts)
            .unwrap_or_default()
    }
}

/// First `pythonX.Y` entry of `lib_parent` by name, with its version
fn find_versioned_lib(lib_parent: &Path) -> Option<(String, String)> {
    let mut names: Vec<String> = fs::read_dir(lib_parent)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();

    names.into_iter().find_map(|name| {
        let version = LIB_VERSION_RE.captures(&name)?.get(1)?.as_str().to_string();
        Some((name, version))
    })
}
