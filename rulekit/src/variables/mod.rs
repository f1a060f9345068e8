//! Variable seam: extractors that turn transaction state into named values.
//!
//! Variables are evaluated fresh on every rule check. Some, like the time
//! family, do not depend on the transaction at all, so callers must never
//! cache a variable's output across rules.

pub mod collection;
pub mod time;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ConfigError;
use crate::transaction::Transaction;

pub use collection::CollectionVariable;
pub use time::{Clock, SystemClock, TimeField, TimeVariable};

/// One extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableValue {
    pub name: String,
    pub value: String,
}

impl VariableValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A loaded variable, shared read-only by every transaction.
pub trait Variable: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Extract values in a stable order.
    fn evaluate(&self, transaction: &Transaction) -> Vec<VariableValue>;
}

/// Builds variables from rule-language names such as `TIME_MIN` or `ARGS:id`.
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    clock: Arc<dyn Clock>,
}

impl VariableRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn build(&self, spec: &str) -> Result<Box<dyn Variable>, ConfigError> {
        let (name, key) = match spec.split_once(':') {
            Some((name, key)) => (name, Some(key)),
            None => (spec, None),
        };
        let name = name.trim().to_ascii_uppercase();

        if let Some(field) = TimeField::from_name(&name) {
            if key.is_some() {
                return Err(ConfigError::Invalid {
                    name,
                    reason: "time variables take no selector".to_string(),
                });
            }
            return Ok(Box::new(TimeVariable::new(field, Arc::clone(&self.clock))));
        }

        if collection::is_known(&name) {
            let key = key.map(str::trim).filter(|k| !k.is_empty());
            return Ok(Box::new(CollectionVariable::new(&name, key)));
        }

        Err(ConfigError::UnknownVariable(spec.to_string()))
    }
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
