// src/error.rs

//! Error types for relocation runs

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while relocating an installation
#[derive(Error, Debug)]
pub enum Error {
    /// Base directory is not a usable runtime installation (fatal)
    #[error("{} does not refer to a Python installation: {reason}", .base.display())]
    InvalidInstallation { base: PathBuf, reason: String },

    /// Requested prefix is not an absolute path (fatal)
    #[error("{} is not an absolute path", .0.display())]
    NonAbsoluteTarget(PathBuf),

    /// File could not be read or decoded; the file is skipped
    #[error("cannot read {}: {source}", .path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Module-cache file could not be parsed or re-encoded
    #[error("malformed module cache {}: {reason}", .path.display())]
    MalformedContainer { path: PathBuf, reason: String },

    /// Codec error not yet attributed to a file
    #[error("marshal error: {0}")]
    Marshal(#[from] relocate_marshal::MarshalError),

    /// Configuration file could not be parsed or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must stop the run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidInstallation { .. } | Self::NonAbsoluteTarget(_) | Self::Config(_)
        )
    }

    pub(crate) fn invalid_installation(base: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInstallation {
            base: base.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedContainer {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
