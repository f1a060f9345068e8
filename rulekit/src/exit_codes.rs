//! Stable exit codes for rulekit CLI commands.

/// Command succeeded; for `eval`, the value matched.
pub const OK: i32 = 0;
/// Invalid configuration, unknown operator/variable, or a target that failed to load.
pub const INVALID: i32 = 1;
/// `rulekit eval` evaluated the value and it did not match.
pub const NO_MATCH: i32 = 2;
