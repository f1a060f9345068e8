//! Minimal pattern operators: `rx`, string comparisons, and constants.

use regex::Regex;

use crate::core::verdict::Verdict;
use crate::error::ConfigError;
use crate::operators::{LoadContext, Operator, OperatorRegistry};
use crate::transaction::Transaction;

const TRACE_LEVEL: u8 = 9;

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("rx", |param, _| Ok(Box::new(Rx::load(param)?)));
    registry.register("streq", |param, _| {
        Ok(Box::new(StringCompare::new(StringTest::Equals, param)))
    });
    registry.register("contains", |param, _| {
        Ok(Box::new(StringCompare::new(StringTest::Contains, param)))
    });
    registry.register("beginsWith", |param, _| {
        Ok(Box::new(StringCompare::new(StringTest::BeginsWith, param)))
    });
    registry.register("endsWith", |param, _| {
        Ok(Box::new(StringCompare::new(StringTest::EndsWith, param)))
    });
    registry.register("unconditionalMatch", constant::<true>);
    registry.register("noMatch", constant::<false>);
}

fn constant<const MATCHED: bool>(
    _param: &str,
    _ctx: &LoadContext,
) -> Result<Box<dyn Operator>, ConfigError> {
    Ok(Box::new(Constant { matched: MATCHED }))
}

/// `@rx`: regular-expression search.
#[derive(Debug)]
pub struct Rx {
    regex: Regex,
}

impl Rx {
    pub fn load(param: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(param).map_err(|err| ConfigError::Invalid {
            name: "rx".to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self { regex })
    }
}

impl Operator for Rx {
    fn name(&self) -> &'static str {
        "rx"
    }

    fn evaluate(&self, transaction: &Transaction, value: &str) -> Verdict {
        let Some(found) = self.regex.find(value) else {
            return Verdict::miss();
        };
        transaction.debug(
            TRACE_LEVEL,
            format!("Matched \"{}\" at offset {}.", found.as_str(), found.start()),
        );
        Verdict::hit()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringTest {
    Equals,
    Contains,
    BeginsWith,
    EndsWith,
}

/// `@streq`, `@contains`, `@beginsWith`, `@endsWith`.
#[derive(Debug)]
pub struct StringCompare {
    test: StringTest,
    param: String,
}

impl StringCompare {
    pub fn new(test: StringTest, param: &str) -> Self {
        Self {
            test,
            param: param.to_string(),
        }
    }
}

impl Operator for StringCompare {
    fn name(&self) -> &'static str {
        match self.test {
            StringTest::Equals => "streq",
            StringTest::Contains => "contains",
            StringTest::BeginsWith => "beginsWith",
            StringTest::EndsWith => "endsWith",
        }
    }

    fn evaluate(&self, _transaction: &Transaction, value: &str) -> Verdict {
        let needle = self.param.as_str();
        let matched = match self.test {
            StringTest::Equals => value == needle,
            StringTest::Contains => value.contains(needle),
            StringTest::BeginsWith => value.starts_with(needle),
            StringTest::EndsWith => value.ends_with(needle),
        };
        Verdict::from(matched)
    }
}

/// `@unconditionalMatch` and `@noMatch`.
#[derive(Debug)]
pub struct Constant {
    matched: bool,
}

impl Operator for Constant {
    fn name(&self) -> &'static str {
        if self.matched {
            "unconditionalMatch"
        } else {
            "noMatch"
        }
    }

    fn evaluate(&self, _transaction: &Transaction, _value: &str) -> Verdict {
        Verdict::from(self.matched)
    }
}
