//! Collection variables such as `ARGS` and `REQUEST_HEADERS:User-Agent`.

use crate::transaction::Transaction;
use crate::variables::{Variable, VariableValue};

/// Collections a rule may name.
pub const KNOWN_COLLECTIONS: &[&str] = &[
    "ARGS",
    "ARGS_GET",
    "ARGS_POST",
    "FILES",
    "REQUEST_COOKIES",
    "REQUEST_HEADERS",
    "RESPONSE_HEADERS",
    "TX",
];

pub fn is_known(name: &str) -> bool {
    KNOWN_COLLECTIONS.contains(&name)
}

/// Every pair of a collection, or only those under one key.
///
/// Keys are compared case-insensitively. Values are named `COLLECTION:key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionVariable {
    collection: String,
    key: Option<String>,
    display: String,
}

impl CollectionVariable {
    pub fn new(collection: &str, key: Option<&str>) -> Self {
        let collection = collection.to_ascii_uppercase();
        let display = match key {
            Some(key) => format!("{collection}:{key}"),
            None => collection.clone(),
        };
        Self {
            collection,
            key: key.map(str::to_string),
            display,
        }
    }
}

impl Variable for CollectionVariable {
    fn name(&self) -> &str {
        &self.display
    }

    fn evaluate(&self, transaction: &Transaction) -> Vec<VariableValue> {
        transaction
            .collection(&self.collection)
            .iter()
            .filter(|(key, _)| {
                self.key
                    .as_deref()
                    .is_none_or(|wanted| key.eq_ignore_ascii_case(wanted))
            })
            .map(|(key, value)| {
                VariableValue::new(format!("{}:{key}", self.collection), value.as_str())
            })
            .collect()
    }
}
