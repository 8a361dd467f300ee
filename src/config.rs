// src/config.rs

//! Relocation options and the optional TOML configuration file
//!
//! `RelocateOptions` is what the engine consumes. It can be built in code
//! with the builder-style setters, or from a `RelocateConfig` loaded from a
//! TOML file and then overridden by command-line flags:
//!
//! ```toml
//! clear_args = false
//! extra_args = ["-E"]
//! scripts_dir = "auto"
//! exclude_dirs = ["__pycache__", "_vendor", "test"]
//! on_malformed = "warn"
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory names skipped by the module-cache walk unless overridden
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &["__pycache__", "_vendor"];

/// Path conventions of the installation being relocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    /// Platform of the running build
    pub const fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Posix }
    }

    /// Interpreter executable name in the binaries directory
    #[inline]
    pub const fn interpreter(&self) -> &'static str {
        match self {
            Self::Posix => "python",
            Self::Windows => "python.exe",
        }
    }

    /// Path component separator
    #[inline]
    pub const fn separator(&self) -> char {
        match self {
            Self::Posix => '/',
            Self::Windows => '\\',
        }
    }

    /// Default scripts directory name under the base
    #[inline]
    pub const fn scripts_dir_name(&self) -> &'static str {
        match self {
            Self::Posix => "bin",
            Self::Windows => "Scripts",
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Where launcher scripts live
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScriptsDir {
    /// `bin` on posix, `Scripts` on Windows
    #[default]
    Auto,
    /// Explicit directory; relative paths are taken from the base
    Path(PathBuf),
}

impl ScriptsDir {
    /// Parse the command-line / config form, where `auto` selects detection
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == "auto" {
            Self::Auto
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

/// How a module-cache file that cannot be parsed is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log at debug level and continue
    Ignore,
    /// Log a warning, count it in the report, and continue
    #[default]
    Warn,
    /// Stop the run with `Error::MalformedContainer`
    Error,
}

impl std::str::FromStr for MalformedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(Error::Config(format!(
                "unknown malformed-cache policy '{}' (expected ignore, warn or error)",
                other
            ))),
        }
    }
}

/// Options for one relocation run
#[derive(Debug, Clone)]
pub struct RelocateOptions {
    /// Prefix written into scripts and caches; defaults to the absolute base
    pub prefix: Option<PathBuf>,
    /// Drop interpreter arguments already present in shebang lines
    pub clear_args: bool,
    /// Arguments appended to every rewritten shebang (de-duplicated)
    pub extra_args: Vec<String>,
    pub scripts_dir: ScriptsDir,
    /// Directory names the module-cache walk does not descend into
    pub exclude_dirs: Vec<String>,
    pub on_malformed: MalformedPolicy,
    pub platform: Platform,
    pub rewrite_scripts: bool,
    pub rewrite_caches: bool,
    pub repair_symlinks: bool,
}

impl Default for RelocateOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            clear_args: false,
            extra_args: Vec::new(),
            scripts_dir: ScriptsDir::Auto,
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            on_malformed: MalformedPolicy::default(),
            platform: Platform::current(),
            rewrite_scripts: true,
            rewrite_caches: true,
            repair_symlinks: true,
        }
    }
}

impl RelocateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_clear_args(mut self, clear_args: bool) -> Self {
        self.clear_args = clear_args;
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scripts_dir(mut self, scripts_dir: ScriptsDir) -> Self {
        self.scripts_dir = scripts_dir;
        self
    }

    pub fn with_exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Enable or disable individual stages
    pub fn with_stages(mut self, scripts: bool, caches: bool, symlinks: bool) -> Self {
        self.rewrite_scripts = scripts;
        self.rewrite_caches = caches;
        self.repair_symlinks = symlinks;
        self
    }

    /// Whether the cache walk should skip a directory with this name
    pub fn is_excluded(&self, dir_name: &str) -> bool {
        self.exclude_dirs.iter().any(|name| name == dir_name)
    }
}

/// On-disk configuration; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelocateConfig {
    #[serde(default)]
    pub prefix: Option<PathBuf>,

    #[serde(default)]
    pub clear_args: bool,

    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default)]
    pub scripts_dir: Option<String>,

    /// Replaces the default exclusion list when present
    #[serde(default)]
    pub exclude_dirs: Option<Vec<String>>,

    #[serde(default)]
    pub on_malformed: MalformedPolicy,

    #[serde(default)]
    pub platform: Option<Platform>,
}

impl RelocateConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: RelocateConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.prefix {
            if !prefix.is_absolute() {
                return Err(Error::Config(format!(
                    "prefix must be absolute, got {}",
                    prefix.display()
                )));
            }
        }
        if let Some(dirs) = &self.exclude_dirs {
            if let Some(bad) = dirs
                .iter()
                .find(|d| d.is_empty() || d.contains(['/', '\\']))
            {
                return Err(Error::Config(format!(
                    "exclude_dirs entries must be plain directory names, got '{}'",
                    bad
                )));
            }
        }
        Ok(())
    }

    /// Convert into run options
    pub fn into_options(self) -> RelocateOptions {
        let defaults = RelocateOptions::default();
        RelocateOptions {
            prefix: self.prefix,
            clear_args: self.clear_args,
            extra_args: self.extra_args,
            scripts_dir: self
                .scripts_dir
                .as_deref()
                .map(ScriptsDir::parse)
                .unwrap_or_default(),
            exclude_dirs: self.exclude_dirs.unwrap_or(defaults.exclude_dirs),
            on_malformed: self.on_malformed,
            platform: self.platform.unwrap_or(defaults.platform),
            ..defaults
        }
    }
}
