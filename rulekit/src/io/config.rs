//! Engine configuration stored as TOML (`rulekit.toml` by default).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::transaction::MAX_DEBUG_LEVEL;

/// Engine configuration (TOML).
///
/// Loaded once at startup; operators and variables copy what they need at
/// load time and never observe later edits. Missing fields default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Base directories that relative operator resources are resolved against.
    pub search_roots: Vec<PathBuf>,

    /// Transaction debug-log verbosity (0-9).
    pub debug_log_level: u8,

    pub inspect: InspectSettings,
}

/// Settings for `@inspectFile` process mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InspectSettings {
    /// Wall-clock budget for spawning the program and draining its output.
    pub timeout_ms: u64,

    /// Keep at most this many bytes of program output; the rest is drained.
    pub output_limit_bytes: usize,

    pub invocation: Invocation,

    /// Shell used for [`Invocation::Shell`].
    pub shell: PathBuf,
}

/// How the external program is started.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Invocation {
    /// `<shell> -c "<target> <value>"`: the value is parsed by the shell.
    #[default]
    Shell,
    /// Exec the target directly with the value as its single argument.
    Direct,
}

impl Default for InspectSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            output_limit_bytes: 1024 * 1024,
            invocation: Invocation::Shell,
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

impl InspectSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(anyhow!("inspect.timeout_ms must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("inspect.output_limit_bytes must be > 0"));
        }
        if self.invocation == Invocation::Shell && self.shell.as_os_str().is_empty() {
            return Err(anyhow!("inspect.shell must be set for shell invocation"));
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.debug_log_level > MAX_DEBUG_LEVEL {
            return Err(anyhow!(
                "debug_log_level must be between 0 and {MAX_DEBUG_LEVEL}"
            ));
        }
        if self
            .search_roots
            .iter()
            .any(|root| root.as_os_str().is_empty())
        {
            return Err(anyhow!("search_roots must not contain empty paths"));
        }
        self.inspect.validate()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
