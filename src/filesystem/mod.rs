// src/filesystem/mod.rs

//! Filesystem helpers shared by the relocation stages
//!
//! - Atomic in-place replacement of files, keeping permissions
//! - Path helpers for building origin paths in a target platform's syntax

pub mod atomic;
pub mod path;

pub use atomic::replace_file;
pub use path::{absolutize, join_with_separator};
