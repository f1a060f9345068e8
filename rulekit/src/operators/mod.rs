//! Operator seam: load-time construction, evaluation, and the name registry.
//!
//! An operator value only exists once its load succeeded, so there is no
//! half-initialized state for the evaluator to trip over. Evaluation is
//! infallible by signature: failures become missed [`Verdict`]s.

pub mod inspect_file;
pub mod pattern;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::verdict::Verdict;
use crate::error::ConfigError;
use crate::io::config::{EngineConfig, InspectSettings};
use crate::io::resolve::ResourceResolver;
use crate::script::{PatternScriptRuntime, ScriptRuntime};
use crate::transaction::Transaction;

pub use inspect_file::InspectFile;

/// A loaded operator, shared read-only by every transaction.
pub trait Operator: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Decide whether one extracted value satisfies the rule condition.
    fn evaluate(&self, transaction: &Transaction, value: &str) -> Verdict;
}

/// Everything an operator may consult while it is being loaded.
#[derive(Clone)]
pub struct LoadContext {
    pub resolver: ResourceResolver,
    pub inspect: InspectSettings,
    pub script_runtime: Arc<dyn ScriptRuntime>,
}

impl LoadContext {
    pub fn new(config: &EngineConfig, script_runtime: Arc<dyn ScriptRuntime>) -> Self {
        Self {
            resolver: ResourceResolver::new(config.search_roots.iter().cloned()),
            inspect: config.inspect.clone(),
            script_runtime,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config, Arc::new(PatternScriptRuntime))
    }
}

impl Default for LoadContext {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("resolver", &self.resolver)
            .field("inspect", &self.inspect)
            .field("script_runtime", &self.script_runtime.name())
            .finish()
    }
}

/// Builds an operator from its rule parameter.
pub type OperatorFactory = fn(&str, &LoadContext) -> Result<Box<dyn Operator>, ConfigError>;

/// Name-keyed catalog of operator factories.
///
/// Names are case-insensitive and may be written with the rule-language `@`
/// prefix (`@inspectFile`).
#[derive(Clone)]
pub struct OperatorRegistry {
    factories: BTreeMap<String, (&'static str, OperatorFactory)>,
}

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with `inspectFile` and the pattern operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(inspect_file::NAME, |param, ctx| {
            Ok(Box::new(InspectFile::load(param, ctx)?))
        });
        pattern::register(&mut registry);
        registry
    }

    /// Add or replace a factory.
    pub fn register(&mut self, name: &'static str, factory: OperatorFactory) {
        self.factories
            .insert(name.to_ascii_lowercase(), (name, factory));
    }

    /// Canonical names of every registered operator, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names
    }

    /// Load an operator for a rule.
    pub fn build(
        &self,
        name: &str,
        param: &str,
        ctx: &LoadContext,
    ) -> Result<Box<dyn Operator>, ConfigError> {
        let key = name.trim_start_matches('@').to_ascii_lowercase();
        let (canonical, factory) = self
            .factories
            .get(&key)
            .ok_or_else(|| ConfigError::UnknownOperator(name.to_string()))?;
        debug!(operator = canonical, param, "loading operator");
        let operator = factory(param, ctx)?;
        info!(operator = canonical, "operator loaded");
        Ok(operator)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Always;

    impl Operator for Always {
        fn name(&self) -> &'static str {
            "always"
        }

        fn evaluate(&self, _transaction: &Transaction, _value: &str) -> Verdict {
            Verdict::hit()
        }
    }

    #[test]
    fn builtins_are_registered() {
        let names = OperatorRegistry::with_builtins().names();
        for expected in ["inspectFile", "rx", "streq", "contains", "unconditionalMatch"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn lookup_ignores_case_and_at_prefix() {
        let registry = OperatorRegistry::with_builtins();
        let op = registry
            .build("@STREQ", "abc", &LoadContext::default())
            .expect("build");
        assert_eq!(op.name(), "streq");
    }

    #[test]
    fn unknown_operator_is_a_config_error() {
        let err = OperatorRegistry::with_builtins()
            .build("@nope", "", &LoadContext::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperator(name) if name == "@nope"));
    }

    #[test]
    fn custom_factories_dispatch_through_the_trait() {
        let mut registry = OperatorRegistry::empty();
        registry.register("always", |_, _| Ok(Box::new(Always)));
        let op = registry
            .build("always", "", &LoadContext::default())
            .expect("build");
        assert!(op.evaluate(&Transaction::new("t1"), "x").is_match());
    }
}
