//! Per-request state read by variables and annotated by operators.
//!
//! The request model proper (parsing, phases, interventions) lives outside this
//! crate. A [`Transaction`] carries just what the operator/variable seam needs:
//! named collections of key/value pairs and an append-only debug log.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

/// Highest debug-log verbosity. Operators trace execution details at 8 and 9.
pub const MAX_DEBUG_LEVEL: u8 = 9;

/// One line of the transaction debug log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugEntry {
    pub level: u8,
    pub message: String,
}

/// State for one request, owned by whoever drives rule evaluation.
///
/// Operators only receive `&Transaction`; appending to the debug log is
/// internally synchronized so values of one rule may be evaluated in parallel.
#[derive(Debug)]
pub struct Transaction {
    id: String,
    debug_level: u8,
    collections: BTreeMap<String, Vec<(String, String)>>,
    debug_log: Mutex<Vec<DebugEntry>>,
}

impl Transaction {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            debug_level: 0,
            collections: BTreeMap::new(),
            debug_log: Mutex::new(Vec::new()),
        }
    }

    /// Record debug entries up to `level` (clamped to [`MAX_DEBUG_LEVEL`]).
    pub fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level.min(MAX_DEBUG_LEVEL);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn debug_level(&self) -> u8 {
        self.debug_level
    }

    /// Append a value to a collection. Collection names are case-insensitive
    /// and values keep insertion order.
    pub fn add(&mut self, collection: &str, key: impl Into<String>, value: impl Into<String>) {
        self.collections
            .entry(collection.to_ascii_uppercase())
            .or_default()
            .push((key.into(), value.into()));
    }

    /// Builder form of [`Transaction::add`].
    pub fn with_value(
        mut self,
        collection: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.add(collection, key, value);
        self
    }

    /// All pairs of a collection, empty if it was never populated.
    pub fn collection(&self, name: &str) -> &[(String, String)] {
        self.collections
            .get(&name.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn debug_enabled(&self, level: u8) -> bool {
        level <= self.debug_level
    }

    /// Transaction-scoped debug log call.
    ///
    /// Every message is mirrored to `tracing` at debug level; it is kept in the
    /// transaction log only when `level` is within the configured verbosity.
    pub fn debug(&self, level: u8, message: impl Into<String>) {
        let message = message.into();
        debug!(tx = %self.id, level, "{message}");
        if self.debug_enabled(level) {
            self.log().push(DebugEntry { level, message });
        }
    }

    /// Snapshot of the debug log in append order.
    pub fn debug_entries(&self) -> Vec<DebugEntry> {
        self.log().clone()
    }

    fn log(&self) -> MutexGuard<'_, Vec<DebugEntry>> {
        self.debug_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
