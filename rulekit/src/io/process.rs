//! Running child processes with timeouts, bounded output, and guaranteed reaping.

use std::io::{self, Read};
use std::ops::{Deref, DerefMut};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Extra time granted to output readers after the child has been reaped.
///
/// Readers only outlive the child when a descendant inherited the pipe; past
/// this grace the child's process group is killed, the output is abandoned and
/// the call reports a timeout.
const READER_GRACE: Duration = Duration::from_secs(1);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status, `None` when the child could not be reaped.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    /// Failure while waiting on the child or draining its pipes.
    ///
    /// Output captured before the failure is still returned.
    pub cleanup_error: Option<String>,
}

/// The child could not be started at all.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{0}")]
    Spawn(#[source] io::Error),
    #[error("stdout was not piped")]
    MissingPipe,
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// The child leads its own process group (Unix). On timeout the whole group is killed, so
/// programs it started cannot keep running or hold the output pipes open. The child is
/// reaped on every return path, including unwinding.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let deadline = Instant::now() + timeout;
    debug!("spawning child process");
    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(ProcessError::Spawn(e));
        }
    };
    let mut child = ReapGuard::new(child);

    let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe)?;
    let stderr = child.stderr.take().ok_or(ProcessError::MissingPipe)?;
    let stdout_rx = spawn_reader(stdout, output_limit_bytes);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes);

    let mut timed_out = false;
    let mut cleanup_error = None;
    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => Some(status),
        Ok(None) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
            timed_out = true;
            match child.kill_and_reap() {
                Ok(status) => Some(status),
                Err(e) => {
                    cleanup_error = Some(e.to_string());
                    None
                }
            }
        }
        Err(e) => {
            warn!(err = %e, "wait for command failed, killing");
            cleanup_error = Some(e.to_string());
            child.kill_and_reap().ok()
        }
    };

    let reader_deadline = deadline.max(Instant::now()) + READER_GRACE;
    let stdout = collect(&stdout_rx, reader_deadline);
    let stderr = collect(&stderr_rx, reader_deadline);
    if stdout.abandoned || stderr.abandoned {
        warn!("output pipe still open after child exit, killing process group");
        child.kill_group();
        timed_out = true;
    }
    if cleanup_error.is_none() {
        cleanup_error = stdout
            .error
            .or(stderr.error)
            .map(|e| format!("read output: {e}"));
    }

    if stdout.truncated > 0 || stderr.truncated > 0 {
        warn!(
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.and_then(|s| s.code()), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout: stdout.bytes,
        stderr: stderr.bytes,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
        timed_out,
        cleanup_error,
    })
}

/// Kills and reaps the child unless it was already reaped.
struct ReapGuard {
    child: Child,
    reaped: bool,
}

impl ReapGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let status = self.child.wait_timeout(timeout)?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    fn kill_and_reap(&mut self) -> io::Result<ExitStatus> {
        self.kill_group();
        // kill fails once the child exited on its own; wait still reaps it
        if let Err(e) = self.child.kill() {
            debug!(err = %e, "kill child");
        }
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    /// SIGKILL every process in the child's group, descendants included.
    ///
    /// The group outlives its leader while any member is alive, so this still
    /// reaches descendants after the child itself was reaped.
    #[cfg(unix)]
    fn kill_group(&self) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Ok(pgid) = i32::try_from(self.child.id()) else {
            return;
        };
        if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            debug!(err = %e, "kill process group");
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl Deref for ReapGuard {
    type Target = Child;

    fn deref(&self) -> &Child {
        &self.child
    }
}

impl DerefMut for ReapGuard {
    fn deref_mut(&mut self) -> &mut Child {
        &mut self.child
    }
}

impl Drop for ReapGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill_group();
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[derive(Debug, Default)]
struct StreamOutput {
    bytes: Vec<u8>,
    truncated: usize,
    error: Option<io::Error>,
    abandoned: bool,
}

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<StreamOutput> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(read_stream_limited(reader, limit));
    });
    rx
}

fn collect(rx: &Receiver<StreamOutput>, deadline: Instant) -> StreamOutput {
    let wait = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(wait) {
        Ok(output) => output,
        Err(RecvTimeoutError::Timeout) => StreamOutput {
            abandoned: true,
            ..StreamOutput::default()
        },
        Err(RecvTimeoutError::Disconnected) => StreamOutput {
            error: Some(io::Error::other("output reader thread panicked")),
            ..StreamOutput::default()
        },
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> StreamOutput {
    let mut out = StreamOutput::default();
    let mut chunk = [0u8; 8192];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                out.error = Some(e);
                break;
            }
        };
        let remaining = limit.saturating_sub(out.bytes.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            out.bytes.extend_from_slice(&chunk[..keep]);
            out.truncated += n.saturating_sub(keep);
        } else {
            out.truncated += n;
        }
    }

    out
}
