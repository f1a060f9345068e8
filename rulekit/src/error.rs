//! Load-time error types.
//!
//! Everything here is raised while rules are being built. Evaluation never
//! returns these: runtime failures become diagnostics on a missed verdict.

use std::io;
use std::path::PathBuf;

/// A rule's operator or variable could not be prepared.
///
/// The rule loader must refuse to activate a rule that produced one of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Resource not found: {resource}. Looking at: {}", display_paths(.tried))]
    ResourceNotFound {
        resource: String,
        tried: Vec<PathBuf>,
    },

    #[error("Failed to open file: {resource}. {source}")]
    OpenFailed {
        resource: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid parameter for {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),
}

/// An inspection script was recognized but does not compile.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("line {line}: invalid pattern: {source}")]
    Pattern {
        line: usize,
        #[source]
        source: regex::Error,
    },

    #[error("script is not valid UTF-8")]
    Encoding,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
