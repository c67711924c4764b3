//! Test-only collaborators: scripted runners, checkpoints, and a fake process table.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{CheckpointOutcome, ProcessEntry, SessionOutcome};
use crate::io::checkpoint::{CheckpointRequest, CheckpointValidator};
use crate::io::config::RunConfig;
use crate::io::reaper::ProcessTable;
use crate::io::worker::{SessionRequest, SessionRunner};

/// Temporary workspace directory with a manifest file inside it.
pub struct Workspace {
    temp: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let workspace = temp.path().join("workspace");
        fs::create_dir_all(&workspace)
            .with_context(|| format!("create {}", workspace.display()))?;
        fs::write(workspace.join("features.json"), "[]\n").context("write manifest")?;
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn workspace(&self) -> PathBuf {
        self.root().join("workspace")
    }

    pub fn manifest(&self) -> PathBuf {
        self.workspace().join("features.json")
    }

    /// Config pointing at this workspace with defaults for everything else.
    pub fn config(&self) -> RunConfig {
        RunConfig {
            workspace: self.workspace(),
            manifest: self.manifest(),
            ..RunConfig::default()
        }
    }
}

/// One scripted response from [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Outcome(SessionOutcome),
    /// Returned as `Err`, simulating an unexpected runner failure.
    Error(String),
}

/// [`SessionRunner`] that replays queued steps and records every request.
pub struct ScriptedRunner {
    steps: RefCell<VecDeque<ScriptedStep>>,
    fallback: Option<SessionOutcome>,
    requests: RefCell<Vec<SessionRequest>>,
}

impl ScriptedRunner {
    /// Replay `steps` in order; running past the end is an error.
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: RefCell::new(steps.into()),
            fallback: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Return `outcome` for every attempt.
    pub fn repeating(outcome: SessionOutcome) -> Self {
        Self {
            steps: RefCell::new(VecDeque::new()),
            fallback: Some(outcome),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.borrow().clone()
    }
}

impl SessionRunner for ScriptedRunner {
    fn run(&self, request: &SessionRequest) -> Result<SessionOutcome> {
        self.requests.borrow_mut().push(request.clone());
        match self.steps.borrow_mut().pop_front() {
            Some(ScriptedStep::Outcome(outcome)) => Ok(outcome),
            Some(ScriptedStep::Error(message)) => Err(anyhow!(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| anyhow!("scripted runner has no more steps")),
        }
    }
}

/// [`CheckpointValidator`] that replays queued outcomes, then passes.
pub struct ScriptedCheckpoint {
    outcomes: RefCell<VecDeque<CheckpointOutcome>>,
    calls: Cell<u32>,
}

impl ScriptedCheckpoint {
    pub fn new(outcomes: Vec<CheckpointOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            calls: Cell::new(0),
        }
    }

    pub fn passing() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl CheckpointValidator for ScriptedCheckpoint {
    fn validate(&self, _request: &CheckpointRequest) -> Result<CheckpointOutcome> {
        self.calls.set(self.calls.get() + 1);
        Ok(self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(CheckpointOutcome::pass))
    }
}

/// In-memory [`ProcessTable`]. Terminated pids disappear from later listings.
pub struct FakeProcessTable {
    entries: Vec<ProcessEntry>,
    failing: BTreeSet<u32>,
    unavailable: bool,
    list_calls: u32,
    terminate_calls: u32,
    terminated: Vec<u32>,
}

impl FakeProcessTable {
    pub fn new(entries: Vec<ProcessEntry>) -> Self {
        Self {
            entries,
            failing: BTreeSet::new(),
            unavailable: false,
            list_calls: 0,
            terminate_calls: 0,
            terminated: Vec::new(),
        }
    }

    /// A table whose listing always fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(Vec::new())
        }
    }

    /// Make termination of `pid` fail (e.g. permission denied).
    pub fn failing_on(mut self, pid: u32) -> Self {
        self.failing.insert(pid);
        self
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls
    }

    pub fn terminate_calls(&self) -> u32 {
        self.terminate_calls
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.clone()
    }
}

impl ProcessTable for FakeProcessTable {
    fn list(&mut self) -> Result<Vec<ProcessEntry>> {
        self.list_calls += 1;
        if self.unavailable {
            return Err(anyhow!("process table unavailable"));
        }
        Ok(self.entries.clone())
    }

    fn terminate(&mut self, pid: u32) -> Result<()> {
        self.terminate_calls += 1;
        if self.failing.contains(&pid) {
            return Err(anyhow!("permission denied for {pid}"));
        }
        let before = self.entries.len();
        self.entries.retain(|entry| entry.pid != pid);
        if self.entries.len() == before {
            return Err(anyhow!("process {pid} not found"));
        }
        self.terminated.push(pid);
        Ok(())
    }
}
