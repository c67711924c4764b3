//! Orchestrator configuration stored in `orchestrator.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, resolved relative to the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "orchestrator.toml";

/// Run configuration (TOML).
///
/// Missing fields default to values suitable for an unattended overnight run.
/// `workspace` and `manifest` have no meaningful default and must be provided
/// either in the file or on the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Target workspace the worker operates on.
    pub workspace: PathBuf,

    /// Work-manifest file the worker is asked to satisfy.
    pub manifest: PathBuf,

    /// Number of sequence numbers the run may consume.
    pub max_sessions: u32,

    /// Run a checkpoint after every N advances.
    pub checkpoint_interval: u32,

    /// Directory for per-attempt records and the final summary. Disabled when unset.
    pub log_dir: Option<PathBuf>,

    pub worker: WorkerConfig,
    pub checkpoint: CheckpointConfig,
    pub reaper: ReaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Program plus leading arguments (e.g. `["python", "agent.py"]`).
    pub command: Vec<String>,

    /// Working directory for the worker. Defaults to the workspace when unset.
    pub workdir: Option<PathBuf>,

    /// Per-attempt wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Value passed to the worker as `--max-iterations`.
    pub max_iterations: u32,

    /// Truncate captured stdout/stderr beyond this many bytes per stream.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Command to execute in the workspace (e.g. `["npm","run","build"]`).
    pub command: Vec<String>,

    pub timeout_secs: u64,

    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReaperConfig {
    /// Case-insensitive substrings identifying stray helper processes.
    pub signatures: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".to_string(), "autonomous_agent.py".to_string()],
            workdir: None,
            timeout_secs: 10 * 60,
            max_iterations: 20,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            command: vec!["npm".to_string(), "run".to_string(), "build".to_string()],
            timeout_secs: 2 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            signatures: vec![
                "playwright".to_string(),
                "mcp-server".to_string(),
                "chrome".to_string(),
            ],
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::new(),
            manifest: PathBuf::new(),
            max_sessions: 50,
            checkpoint_interval: 5,
            log_dir: None,
            worker: WorkerConfig::default(),
            checkpoint: CheckpointConfig::default(),
            reaper: ReaperConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(anyhow!("max_sessions must be >= 1"));
        }
        if self.checkpoint_interval == 0 {
            return Err(anyhow!("checkpoint_interval must be >= 1"));
        }
        if self.worker.timeout_secs == 0 {
            return Err(anyhow!("worker.timeout_secs must be > 0"));
        }
        if self.worker.output_limit_bytes == 0 {
            return Err(anyhow!("worker.output_limit_bytes must be > 0"));
        }
        if !has_program(&self.worker.command) {
            return Err(anyhow!("worker.command must be a non-empty array"));
        }
        if self.checkpoint.timeout_secs == 0 {
            return Err(anyhow!("checkpoint.timeout_secs must be > 0"));
        }
        if self.checkpoint.output_limit_bytes == 0 {
            return Err(anyhow!("checkpoint.output_limit_bytes must be > 0"));
        }
        if !has_program(&self.checkpoint.command) {
            return Err(anyhow!("checkpoint.command must be a non-empty array"));
        }
        if self.reaper.signatures.iter().any(|sig| sig.trim().is_empty()) {
            return Err(anyhow!("reaper.signatures must not contain blank entries"));
        }
        Ok(())
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.timeout_secs)
    }

    pub fn checkpoint_timeout(&self) -> Duration {
        Duration::from_secs(self.checkpoint.timeout_secs)
    }

    /// Working directory for the worker process.
    pub fn worker_workdir(&self) -> &Path {
        self.worker.workdir.as_deref().unwrap_or(&self.workspace)
    }
}

fn has_program(command: &[String]) -> bool {
    command.first().is_some_and(|program| !program.trim().is_empty())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunConfig::default()`. The result is not
/// validated here: callers apply command-line overrides first.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        return Ok(RunConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunConfig) -> Result<()> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("orchestrator.toml");
        let cfg = RunConfig {
            workspace: PathBuf::from("/work/app"),
            manifest: PathBuf::from("/work/app/features.json"),
            log_dir: Some(PathBuf::from("/tmp/logs")),
            ..RunConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("orchestrator.toml");
        fs::write(
            &path,
            "max_sessions = 3\n\n[reaper]\nsignatures = [\"helper\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_sessions, 3);
        assert_eq!(cfg.checkpoint_interval, 5);
        assert_eq!(cfg.reaper.signatures, vec!["helper"]);
        assert_eq!(cfg.worker, WorkerConfig::default());
    }

    #[test]
    fn validate_rejects_zero_counts() {
        let cfg = RunConfig {
            max_sessions: 0,
            ..RunConfig::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().contains("max_sessions"));

        let cfg = RunConfig {
            checkpoint_interval: 0,
            ..RunConfig::default()
        };
        assert!(
            cfg.validate()
                .unwrap_err()
                .to_string()
                .contains("checkpoint_interval")
        );
    }

    #[test]
    fn validate_rejects_empty_commands_and_blank_signatures() {
        let mut cfg = RunConfig::default();
        cfg.worker.command = Vec::new();
        assert!(cfg.validate().unwrap_err().to_string().contains("worker.command"));

        let mut cfg = RunConfig::default();
        cfg.checkpoint.command = vec![" ".to_string()];
        assert!(
            cfg.validate()
                .unwrap_err()
                .to_string()
                .contains("checkpoint.command")
        );

        let mut cfg = RunConfig::default();
        cfg.reaper.signatures.push(String::new());
        assert!(cfg.validate().unwrap_err().to_string().contains("signatures"));
    }

    #[test]
    fn worker_workdir_falls_back_to_workspace() {
        let mut cfg = RunConfig {
            workspace: PathBuf::from("/work/app"),
            ..RunConfig::default()
        };
        assert_eq!(cfg.worker_workdir(), Path::new("/work/app"));
        cfg.worker.workdir = Some(PathBuf::from("/opt/agent"));
        assert_eq!(cfg.worker_workdir(), Path::new("/opt/agent"));
    }
}
