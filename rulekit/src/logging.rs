//! Process-level tracing for operators and the CLI.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: operator diagnostics via `RUST_LOG`, output to stderr.
//!   Not tied to any request.
//!
//! - **Transaction debug log (`transaction`)**: per-request trace lines recorded by
//!   operators, kept on the transaction for audit/debug output and gated by its
//!   debug level. Every entry is also mirrored here at `debug`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// Useful filter targets:
///
/// - `rulekit::io::process`: spawn, timeout and process-group kills, truncation.
/// - `rulekit::operators::inspect_file`: target resolution and mode at load,
///   per-evaluation spans with `tx`, `target` and `mode` fields.
/// - `rulekit::script`: why a file was or was not accepted as a script.
/// - `rulekit::transaction`: every debug-log line, whatever the transaction level.
///
/// # Example
/// ```bash
/// RUST_LOG=rulekit::io::process=debug,rulekit::operators=info rulekit eval inspectFile ./scan.sh 'id=1'
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
