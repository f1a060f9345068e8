//! Match verdicts returned by operators.

use serde::Serialize;

/// Outcome of one operator evaluation.
///
/// A verdict never carries an error. Anything that prevents a definitive
/// answer (missing program, spawn failure, timeout) collapses to a miss with
/// a diagnostic attached, so a broken rule degrades to "no match" instead of
/// failing the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl Verdict {
    pub fn hit() -> Self {
        Self {
            matched: true,
            diagnostic: None,
        }
    }

    pub fn miss() -> Self {
        Self {
            matched: false,
            diagnostic: None,
        }
    }

    /// A miss caused by a failure, with the reason preserved for the debug log.
    pub fn miss_with(diagnostic: impl Into<String>) -> Self {
        Self {
            matched: false,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn is_match(&self) -> bool {
        self.matched
    }
}

impl From<bool> for Verdict {
    fn from(matched: bool) -> Self {
        if matched { Self::hit() } else { Self::miss() }
    }
}
