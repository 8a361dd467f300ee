// src/shebang/line.rs

//! Parsing and rendering of `#!` lines
//!
//! Two interpreter forms are recognized:
//!
//! - an absolute path ending in `/bin/python`, `/bin/python3` or
//!   `/bin/python3.11` (`\bin\python.exe` on Windows), optionally quoted
//! - `/usr/bin/env python...`, where `env` is dropped on rewrite
//!
//! Everything else (`#!/bin/sh`, `#!/usr/bin/perl -w`, ...) is not a
//! launcher for this runtime and is left alone.

use crate::config::Platform;
use crate::filesystem::join_with_separator;
use crate::shebang::args::OrderedSet;
use regex::Regex;
use std::sync::LazyLock;

static POSIX_BIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/bin/(python((\d+\.\d+)|(\d+))?)$").expect("valid regex"));
static WINDOWS_BIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\bin\\(python\.exe)$").expect("valid regex"));

const ENV_DISPATCH: &str = "/usr/bin/env python";

/// How the interpreter was named on the original line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterForm {
    /// Absolute path; `exe_name` is the matched file name (`python3.11`)
    Absolute { exe_name: String },
    /// `/usr/bin/env python...`
    EnvDispatch,
}

/// A parsed launcher line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shebang {
    /// Interpreter token without quotes; for `EnvDispatch` this is the
    /// command `env` was asked to run
    pub interpreter: String,
    /// Quote character around the interpreter, if it was quoted
    pub quote: Option<char>,
    pub args: Vec<String>,
    pub form: InterpreterForm,
}

impl Shebang {
    /// Parse a first line (without its line ending)
    ///
    /// Returns `None` when the line is not a launcher line this crate
    /// rewrites.
    pub fn parse(line: &str, platform: Platform) -> Option<Self> {
        let rest = line.strip_prefix("#!")?;
        let first = rest.chars().next()?;

        let (quote, mut tokens) = if first == '"' || first == '\'' {
            let inner = &rest[1..];
            let end = inner.find(first)?;
            let mut tokens = vec![inner[..end].to_string()];
            tokens.extend(inner[end + 1..].split_whitespace().map(str::to_string));
            (Some(first), tokens)
        } else {
            (None, rest.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        };

        if tokens.is_empty() {
            return None;
        }

        let form = if rest.starts_with(ENV_DISPATCH) {
            tokens.remove(0);
            if tokens.is_empty() {
                return None;
            }
            InterpreterForm::EnvDispatch
        } else {
            let re = match platform {
                Platform::Posix => &*POSIX_BIN_RE,
                Platform::Windows => &*WINDOWS_BIN_RE,
            };
            let exe_name = re.captures(&tokens[0])?.get(1)?.as_str().to_string();
            InterpreterForm::Absolute { exe_name }
        };

        let interpreter = tokens.remove(0);
        Some(Self {
            interpreter,
            quote,
            args: tokens,
            form,
        })
    }

    /// Point the line at the interpreter under `prefix`
    ///
    /// With `clear_args` the existing arguments are dropped. `extra_args`
    /// are appended after the kept ones, skipping values already present.
    pub fn retarget(
        &self,
        prefix: &str,
        platform: Platform,
        clear_args: bool,
        extra_args: &[String],
    ) -> Self {
        let exe_name = match &self.form {
            InterpreterForm::Absolute { exe_name } => exe_name.as_str(),
            InterpreterForm::EnvDispatch => platform.interpreter(),
        };
        let interpreter = join_with_separator(prefix, ["bin", exe_name], platform.separator());

        let mut args = OrderedSet::new();
        if !clear_args {
            args.extend(self.args.iter().cloned());
        }
        args.extend(extra_args.iter().cloned());

        let quote = prefix
            .contains(' ')
            .then(|| self.quote.unwrap_or('"'));

        Self {
            interpreter,
            quote,
            args: args.into_vec(),
            form: InterpreterForm::Absolute {
                exe_name: exe_name.to_string(),
            },
        }
    }

    /// Whether both lines launch the same interpreter with the same arguments
    ///
    /// Spacing between tokens and the choice of quote character are ignored.
    pub fn same_target(&self, other: &Self) -> bool {
        self.interpreter == other.interpreter
            && self.quote.is_some() == other.quote.is_some()
            && self.args == other.args
    }

    /// Render as `#!<interpreter> <args...>`
    pub fn render(&self) -> String {
        let mut line = String::from("#!");
        match self.quote {
            Some(q) => {
                line.push(q);
                line.push_str(&self.interpreter);
                line.push(q);
            }
            None => line.push_str(&self.interpreter),
        }
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}
