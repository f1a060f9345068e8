//! Embedded script runtime seam and the compatibility probe.
//!
//! A [`ScriptRuntime`] is handed to operators at load time through the
//! [`LoadContext`](crate::operators::LoadContext) rather than living in a
//! process-wide singleton, so tests can substitute scripted fakes.

pub mod pattern;

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::error::ScriptError;
use crate::transaction::Transaction;

pub use pattern::PatternScriptRuntime;

/// Bytes read from the start of a file for the header check.
pub const HEADER_PROBE_BYTES: u64 = 256;

/// Files larger than this are never treated as scripts.
pub const MAX_SCRIPT_BYTES: u64 = 1024 * 1024;

/// A compiled script, ready to evaluate values.
///
/// Handles are immutable and shared by every transaction that evaluates the
/// owning operator.
pub trait CompiledScript: Send + Sync + fmt::Debug {
    /// Returns `true` when the value matches.
    fn run(&self, transaction: &Transaction, value: &str) -> bool;
}

pub type ScriptHandle = Box<dyn CompiledScript>;

/// An embedded scripting engine.
pub trait ScriptRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap check on the first [`HEADER_PROBE_BYTES`] of a file.
    fn recognizes(&self, path: &Path, header: &[u8]) -> bool;

    /// Full parse/compile of a recognized file.
    fn compile(&self, path: &Path, source: &str) -> Result<ScriptHandle, ScriptError>;
}

/// Runtime that recognizes nothing: every target runs as a process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScriptRuntime;

impl ScriptRuntime for NoScriptRuntime {
    fn name(&self) -> &str {
        "none"
    }

    fn recognizes(&self, _path: &Path, _header: &[u8]) -> bool {
        false
    }

    fn compile(&self, _path: &Path, _source: &str) -> Result<ScriptHandle, ScriptError> {
        Err(ScriptError::Syntax {
            line: 0,
            reason: "no script runtime configured".to_string(),
        })
    }
}

/// Decide whether `path` is a script `runtime` can run, and compile it.
///
/// Returns `None` on any mismatch: unreadable file, unrecognized header,
/// oversized or non-UTF-8 content, or a compile error. None of these are load
/// failures; the caller falls back to running the file as a program.
pub fn probe(runtime: &dyn ScriptRuntime, path: &Path) -> Option<ScriptHandle> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), err = %e, "script probe: open failed");
            return None;
        }
    };

    let mut bytes = Vec::new();
    if let Err(e) = (&mut file).take(HEADER_PROBE_BYTES).read_to_end(&mut bytes) {
        debug!(path = %path.display(), err = %e, "script probe: header read failed");
        return None;
    }
    if !runtime.recognizes(path, &bytes) {
        debug!(path = %path.display(), runtime = runtime.name(), "script probe: header not recognized");
        return None;
    }

    let budget = MAX_SCRIPT_BYTES + 1 - bytes.len() as u64;
    if let Err(e) = file.take(budget).read_to_end(&mut bytes) {
        debug!(path = %path.display(), err = %e, "script probe: read failed");
        return None;
    }
    if bytes.len() as u64 > MAX_SCRIPT_BYTES {
        debug!(path = %path.display(), "script probe: file too large");
        return None;
    }
    let source = match String::from_utf8(bytes) {
        Ok(source) => source,
        Err(_) => {
            debug!(path = %path.display(), err = %ScriptError::Encoding, "script probe: not a script");
            return None;
        }
    };

    match runtime.compile(path, &source) {
        Ok(handle) => {
            info!(path = %path.display(), runtime = runtime.name(), "script compiled");
            Some(handle)
        }
        Err(e) => {
            info!(path = %path.display(), runtime = runtime.name(), err = %e, "script rejected, falling back to process mode");
            None
        }
    }
}
