//! Binds variables to an operator and decides whether a rule matches.
//!
//! This is the thin evaluation boundary the surrounding engine drives; phase
//! sequencing, actions and chaining live elsewhere.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::ConfigError;
use crate::operators::{LoadContext, Operator, OperatorRegistry};
use crate::transaction::Transaction;
use crate::variables::{Variable, VariableRegistry, VariableValue};

const TRACE_LEVEL: u8 = 4;

#[derive(Debug)]
pub struct Rule {
    id: String,
    variables: Vec<Box<dyn Variable>>,
    operator: Box<dyn Operator>,
    negated: bool,
}

/// Result of evaluating one rule against one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub matched: bool,
    /// Extracted values whose verdict (after negation) was a match.
    pub matches: Vec<VariableValue>,
    /// Diagnostics attached to individual verdicts.
    pub diagnostics: Vec<String>,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        variables: Vec<Box<dyn Variable>>,
        operator: Box<dyn Operator>,
    ) -> Self {
        Self {
            id: id.into(),
            variables,
            operator,
            negated: false,
        }
    }

    /// Invert every verdict (`!@op` in rule syntax).
    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    /// Build a rule from names, failing on the first variable or operator
    /// that cannot be loaded.
    pub fn load(
        id: &str,
        variables: &[&str],
        operator: &str,
        param: &str,
        registries: (&VariableRegistry, &OperatorRegistry),
        ctx: &LoadContext,
    ) -> Result<Self, ConfigError> {
        let (variable_registry, operator_registry) = registries;
        let variables = variables
            .iter()
            .map(|spec| variable_registry.build(spec))
            .collect::<Result<Vec<_>, _>>()?;
        let (negated, operator) = match operator.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, operator),
        };
        let operator = operator_registry.build(operator, param, ctx)?;
        let rule = Self::new(id, variables, operator);
        Ok(if negated { rule.negated() } else { rule })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the operator once per extracted value. The rule matches when any
    /// value matches.
    #[instrument(skip_all, fields(rule = %self.id, tx = transaction.id()))]
    pub fn evaluate(&self, transaction: &Transaction) -> RuleOutcome {
        let mut matches = Vec::new();
        let mut diagnostics = Vec::new();

        for variable in &self.variables {
            for extracted in variable.evaluate(transaction) {
                transaction.debug(
                    TRACE_LEVEL,
                    format!(
                        "Executing operator \"{}\" against {}.",
                        self.operator.name(),
                        extracted.name
                    ),
                );
                let verdict = self.operator.evaluate(transaction, &extracted.value);
                if let Some(diagnostic) = verdict.diagnostic {
                    diagnostics.push(diagnostic);
                }
                if verdict.matched != self.negated {
                    transaction.debug(
                        TRACE_LEVEL,
                        format!(
                            "Target value: \"{}\" (Variable: {})",
                            extracted.value, extracted.name
                        ),
                    );
                    matches.push(extracted);
                }
            }
        }

        let matched = !matches.is_empty();
        debug!(matched, values = matches.len(), "rule evaluated");
        RuleOutcome {
            rule_id: self.id.clone(),
            matched,
            matches,
            diagnostics,
        }
    }
}
