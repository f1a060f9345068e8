//! `@inspectFile`: hands an extracted value to an external script or program.
//!
//! The target is resolved once, at load. If the configured script runtime
//! recognizes and compiles it, every evaluation runs the compiled script
//! in-process. Otherwise the file is executed as a program for each value.
//!
//! # Output protocol
//!
//! A program receives the value as its trailing argument and reports through
//! the first byte of standard output. **`1` means no match**, any other
//! non-empty output means match, and empty output means no match. See
//! [`crate::core::protocol`].
//!
//! # Trust boundary
//!
//! With the default shell invocation the value is appended to a `sh -c`
//! command line, so values containing shell syntax are interpreted by the
//! shell. This matches how the operator has always behaved. Only point it at
//! programs you control, or select `invocation = "direct"` to pass the value
//! as a single argument without a shell.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{info, instrument};

use crate::core::protocol::{output_matches, shell_command_line};
use crate::core::verdict::Verdict;
use crate::error::ConfigError;
use crate::io::access::check_executable;
use crate::io::config::{InspectSettings, Invocation};
use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::operators::{LoadContext, Operator};
use crate::script::{self, ScriptHandle};
use crate::transaction::Transaction;

pub const NAME: &str = "inspectFile";

const TRACE_LEVEL: u8 = 8;
const DETAIL_LEVEL: u8 = 9;

/// What an `inspectFile` operator runs, fixed at load.
#[derive(Debug)]
pub enum ResolvedTarget {
    Script(ScriptHandle),
    Executable(PathBuf),
}

/// Execution strategy chosen at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Script,
    Process,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Script => f.write_str("script"),
            Mode::Process => f.write_str("process"),
        }
    }
}

#[derive(Debug)]
pub struct InspectFile {
    param: String,
    path: PathBuf,
    target: ResolvedTarget,
    settings: InspectSettings,
}

impl InspectFile {
    /// Resolve, open-check and probe the target named by `param`.
    pub fn load(param: &str, ctx: &LoadContext) -> Result<Self, ConfigError> {
        let param = param.trim();
        if param.is_empty() {
            return Err(ConfigError::Invalid {
                name: NAME.to_string(),
                reason: "missing file path".to_string(),
            });
        }

        let path = ctx.resolver.resolve(param)?;
        ensure_readable(param, &path)?;

        let target = match script::probe(ctx.script_runtime.as_ref(), &path) {
            Some(handle) => ResolvedTarget::Script(handle),
            None => ResolvedTarget::Executable(path.clone()),
        };
        let operator = Self {
            param: param.to_string(),
            path,
            target,
            settings: ctx.inspect.clone(),
        };
        info!(
            target = %operator.path.display(),
            mode = %operator.mode(),
            "inspectFile loaded"
        );
        Ok(operator)
    }

    pub fn mode(&self) -> Mode {
        match self.target {
            ResolvedTarget::Script(_) => Mode::Script,
            ResolvedTarget::Executable(_) => Mode::Process,
        }
    }

    /// Parameter as written in the rule.
    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn resolved_path(&self) -> &Path {
        &self.path
    }

    fn run_process(&self, transaction: &Transaction, path: &Path, value: &str) -> Verdict {
        let shown = path.display().to_string();
        transaction.debug(
            TRACE_LEVEL,
            format!("Executing: {shown}. With parameters: {value}"),
        );

        if let Err(err) = check_executable(path) {
            return failed(transaction, format!("Failed to execute: {shown}. {err}"));
        }

        let cmd = build_command(&self.settings, path, value);
        let output = match run_command_with_timeout(
            cmd,
            self.settings.timeout(),
            self.settings.output_limit_bytes,
        ) {
            Ok(output) => output,
            Err(err) => return failed(transaction, format!("Failed to execute: {shown}. {err}")),
        };

        interpret_output(transaction, &shown, &output, self.settings.timeout_ms)
    }
}

/// Turn a finished run into a verdict, tracing what the program produced.
///
/// A timeout is a miss. A cleanup failure is traced and attached as a
/// diagnostic but leaves the verdict to the output protocol.
fn interpret_output(
    transaction: &Transaction,
    shown: &str,
    output: &CommandOutput,
    timeout_ms: u64,
) -> Verdict {
    if output.timed_out {
        return failed(
            transaction,
            format!("Failed to execute: {shown}. Timed out after {timeout_ms} ms."),
        );
    }

    let cleanup = output
        .cleanup_error
        .as_ref()
        .map(|reason| format!("Failed during the execute of: {shown}. {reason}"));
    if let Some(message) = &cleanup {
        transaction.debug(TRACE_LEVEL, message.as_str());
    }
    if output.stdout_truncated > 0 {
        transaction.debug(
            DETAIL_LEVEL,
            format!("Process output truncated by {} bytes.", output.stdout_truncated),
        );
    }
    if !output.stderr.is_empty() && transaction.debug_enabled(DETAIL_LEVEL) {
        transaction.debug(
            DETAIL_LEVEL,
            format!("Process stderr: {}", String::from_utf8_lossy(&output.stderr)),
        );
    }
    transaction.debug(
        TRACE_LEVEL,
        format!("Process output: {}", String::from_utf8_lossy(&output.stdout)),
    );

    let verdict = Verdict::from(output_matches(&output.stdout));
    match cleanup {
        Some(message) => verdict.with_diagnostic(message),
        None => verdict,
    }
}

impl Operator for InspectFile {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip_all, fields(tx = transaction.id(), target = %self.path.display(), mode = %self.mode()))]
    fn evaluate(&self, transaction: &Transaction, value: &str) -> Verdict {
        match &self.target {
            ResolvedTarget::Script(handle) => Verdict::from(handle.run(transaction, value)),
            ResolvedTarget::Executable(path) => self.run_process(transaction, path, value),
        }
    }
}

/// Open the file to prove it is readable; the handle is closed on return.
fn ensure_readable(resource: &str, path: &Path) -> Result<(), ConfigError> {
    let open_failed = |source: io::Error| ConfigError::OpenFailed {
        resource: resource.to_string(),
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(open_failed)?;
    let metadata = file.metadata().map_err(open_failed)?;
    if metadata.is_dir() {
        return Err(open_failed(io::Error::new(
            io::ErrorKind::IsADirectory,
            "is a directory",
        )));
    }
    Ok(())
}

fn build_command(settings: &InspectSettings, path: &Path, value: &str) -> Command {
    match settings.invocation {
        Invocation::Shell => {
            let mut cmd = Command::new(&settings.shell);
            cmd.arg("-c").arg(shell_command_line(path, value));
            cmd
        }
        Invocation::Direct => {
            let mut cmd = Command::new(path);
            cmd.arg(value);
            cmd
        }
    }
}

fn failed(transaction: &Transaction, message: String) -> Verdict {
    transaction.debug(TRACE_LEVEL, message.as_str());
    Verdict::miss_with(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_param_is_invalid() {
        let err = InspectFile::load("  ", &LoadContext::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn missing_target_fails_load() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("nope.sh");
        let err = InspectFile::load(missing.to_str().expect("utf8"), &LoadContext::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::ResourceNotFound { .. }));
    }

    #[test]
    fn directory_target_fails_open_check() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = InspectFile::load(temp.path().to_str().expect("utf8"), &LoadContext::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::OpenFailed { .. }));
        assert!(err.to_string().starts_with("Failed to open file: "));
    }

    #[test]
    fn script_header_selects_script_mode() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("scan.insp");
        fs::write(&path, "#inspect-script\nmatch contains evil\n").expect("write");

        let op = InspectFile::load(path.to_str().expect("utf8"), &LoadContext::default())
            .expect("load");
        assert_eq!(op.mode(), Mode::Script);
        let tx = Transaction::new("t1");
        assert!(op.evaluate(&tx, "so evil").is_match());
        assert!(!op.evaluate(&tx, "fine").is_match());
    }

    #[test]
    fn plain_file_selects_process_mode() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("scan.sh");
        fs::write(&path, "#!/bin/sh\nprintf 1\n").expect("write");

        let op = InspectFile::load(path.to_str().expect("utf8"), &LoadContext::default())
            .expect("load");
        assert_eq!(op.mode(), Mode::Process);
        assert_eq!(op.resolved_path(), path.as_path());
    }

    #[test]
    fn direct_invocation_passes_value_as_one_argument() {
        let settings = InspectSettings {
            invocation: Invocation::Direct,
            ..InspectSettings::default()
        };
        let cmd = build_command(&settings, Path::new("/opt/scan"), "a; b");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(cmd.get_program(), "/opt/scan");
        assert_eq!(args, vec!["a; b"]);
    }

    #[test]
    fn shell_invocation_appends_value_to_command_line() {
        let cmd = build_command(&InspectSettings::default(), Path::new("/opt/scan"), "a b");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(cmd.get_program(), "/bin/sh");
        assert_eq!(args, vec!["-c", "'/opt/scan' a b"]);
    }

    fn finished(stdout: &[u8], cleanup_error: Option<&str>) -> CommandOutput {
        CommandOutput {
            status: None,
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
            stdout_truncated: 0,
            stderr_truncated: 0,
            timed_out: false,
            cleanup_error: cleanup_error.map(str::to_string),
        }
    }

    #[test]
    fn cleanup_failure_is_traced_and_attached_without_changing_verdict() {
        let tx = Transaction::new("t1").with_debug_level(8);
        let output = finished(b"0 hit", Some("read output: broken pipe"));

        let verdict = interpret_output(&tx, "/opt/scan.sh", &output, 1000);

        let expected = "Failed during the execute of: /opt/scan.sh. read output: broken pipe";
        assert!(verdict.matched);
        assert_eq!(verdict.diagnostic.as_deref(), Some(expected));
        let messages: Vec<String> = tx.debug_entries().into_iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec![expected.to_string(), "Process output: 0 hit".to_string()]
        );
    }

    #[test]
    fn cleanup_failure_with_no_match_output_stays_a_miss() {
        let tx = Transaction::new("t1");
        let output = finished(b"1", Some("wait: interrupted"));
        let verdict = interpret_output(&tx, "/opt/scan.sh", &output, 1000);
        assert!(!verdict.matched);
        assert!(verdict.diagnostic.is_some());
    }

    #[test]
    fn timed_out_run_ignores_partial_output() {
        let tx = Transaction::new("t1");
        let output = CommandOutput {
            timed_out: true,
            ..finished(b"0", None)
        };
        let verdict = interpret_output(&tx, "/opt/scan.sh", &output, 250);
        assert!(!verdict.matched);
        assert_eq!(
            verdict.diagnostic.as_deref(),
            Some("Failed to execute: /opt/scan.sh. Timed out after 250 ms.")
        );
    }
}
