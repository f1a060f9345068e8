//! Operator/variable extensibility core for a web-application firewall.
//!
//! Rules bind **variables** (extractors producing named values from a
//! transaction) to an **operator** (an evaluator deciding whether one value
//! matches). Both are trait objects chosen by name at rule-load time:
//!
//! - **[`variables`]**: the [`Variable`](variables::Variable) seam, the clock-driven
//!   `TIME_*` family and request collections.
//! - **[`operators`]**: the [`Operator`](operators::Operator) seam and registry,
//!   including `@inspectFile`, which runs an external script or program per value.
//! - **[`script`]**: the embedded script runtime seam and compatibility probe.
//! - **[`core`]**: pure logic (verdicts, the external output protocol).
//! - **[`io`]**: configuration, resource resolution, and bounded child processes.
//!
//! [`rule::Rule`] is the evaluation boundary that drives both seams.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod operators;
pub mod rule;
pub mod script;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod transaction;
pub mod variables;
