//! Test-only helpers: executable fixtures, a settable clock, and a scripted
//! script runtime that counts how often it is consulted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, TimeDelta, TimeZone};

use crate::error::ScriptError;
use crate::io::config::{EngineConfig, InspectSettings};
use crate::operators::LoadContext;
use crate::script::{CompiledScript, ScriptHandle, ScriptRuntime};
use crate::transaction::Transaction;
use crate::variables::Clock;

/// Write `body` to `dir/name` with mode 0755.
pub fn write_executable(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
    let path = write_file(dir, name, body)?;
    set_mode(&path, 0o755)?;
    Ok(path)
}

/// Write `body` to `dir/name` with mode 0644.
pub fn write_file(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    set_mode(&path, 0o644)?;
    Ok(path)
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Linux only: reads the process state from `/proc`.
///
/// True once `pid` has exited; a zombie counts as exited.
#[cfg(target_os = "linux")]
pub fn process_exited(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_none_or(|state| state == "Z" || state == "X"),
    }
}

/// Poll [`process_exited`] until it holds or `timeout` passes.
#[cfg(target_os = "linux")]
pub fn wait_for_exit(pid: u32, timeout: std::time::Duration) -> bool {
    use std::thread;
    use std::time::{Duration, Instant};

    let deadline = Instant::now() + timeout;
    loop {
        if process_exited(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Read a pid a fixture script wrote with `echo $! > file`.
pub fn read_pid(path: &Path) -> io::Result<u32> {
    let raw = fs::read_to_string(path)?;
    raw.trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Load context rooted at `root` with a short timeout suitable for tests.
pub fn load_context(root: &Path, inspect: InspectSettings) -> LoadContext {
    let config = EngineConfig {
        search_roots: vec![root.to_path_buf()],
        inspect,
        ..EngineConfig::default()
    };
    LoadContext::from_config(&config)
}

/// Same as [`load_context`] but with a custom script runtime.
pub fn load_context_with_runtime(
    root: &Path,
    inspect: InspectSettings,
    runtime: Arc<dyn ScriptRuntime>,
) -> LoadContext {
    let config = EngineConfig {
        search_roots: vec![root.to_path_buf()],
        inspect,
        ..EngineConfig::default()
    };
    LoadContext::new(&config, runtime)
}

/// Inspect settings with a 5 second timeout.
pub fn quick_settings() -> InspectSettings {
    InspectSettings {
        timeout_ms: 5_000,
        ..InspectSettings::default()
    }
}

/// Clock frozen at a given local time until advanced.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Panics if the local time does not exist (DST gap).
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        let now = Local
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .earliest()
            .expect("valid local time");
        Self::new(now)
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Script runtime that recognizes files ending in `.fake` and answers a
/// fixed verdict, counting probes and runs.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    verdict: bool,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub probes: AtomicUsize,
    pub compiles: AtomicUsize,
    pub runs: AtomicUsize,
}

impl ScriptedRuntime {
    pub fn new(verdict: bool) -> Self {
        Self {
            verdict,
            counters: Arc::default(),
        }
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

impl ScriptRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognizes(&self, path: &Path, _header: &[u8]) -> bool {
        self.counters.probes.fetch_add(1, Ordering::SeqCst);
        path.extension().is_some_and(|ext| ext == "fake")
    }

    fn compile(&self, _path: &Path, source: &str) -> Result<ScriptHandle, ScriptError> {
        self.counters.compiles.fetch_add(1, Ordering::SeqCst);
        if source.contains("syntax error") {
            return Err(ScriptError::Syntax {
                line: 1,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(Box::new(ScriptedScript {
            verdict: self.verdict,
            counters: Arc::clone(&self.counters),
        }))
    }
}

#[derive(Debug)]
struct ScriptedScript {
    verdict: bool,
    counters: Arc<Counters>,
}

impl CompiledScript for ScriptedScript {
    fn run(&self, transaction: &Transaction, value: &str) -> bool {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        transaction.debug(9, format!("scripted run: {value}"));
        self.verdict
    }
}
