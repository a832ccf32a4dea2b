//! One traversal of the fixed stage sequence.
//!
//! Every stage runs as its own subprocess. Its outcome is folded into a
//! [`PipelineRun`] and flattened into log records; no stage outcome ever
//! stops the traversal. A run over N stages appends exactly `2N + 2`
//! records: the begin marker, a start and a result line per stage, and the
//! end marker.

use crate::config::{Config, StageConfig};
use crate::log_store::LogStore;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

pub const RUN_STARTED_MARKER: &str = "========== Pipeline execution started ==========";
pub const RUN_COMPLETED_MARKER: &str = "========== Pipeline execution completed";

/// Characters of stderr kept in a failure record.
const STDERR_EXCERPT_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Stage outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StageError {
    #[error("script not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("interpreter '{0}' not found on PATH")]
    InterpreterNotFound(String),

    #[error("{}", describe_failure(.code, .stderr))]
    Failed { code: Option<i32>, stderr: String },

    #[error("timed out after {0} seconds")]
    TimedOut(u64),

    #[error("failed to run: {0}")]
    Spawn(String),
}

fn describe_failure(code: &Option<i32>, stderr: &str) -> String {
    let head = match code {
        Some(c) => format!("failed with exit code {c}"),
        None => "terminated by signal".to_string(),
    };
    if stderr.is_empty() {
        head
    } else {
        format!("{head}: {stderr}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    NotFound,
    TimedOut,
    SpawnFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub name: String,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StageResult {
    fn from_outcome(name: &str, outcome: &Result<(), StageError>) -> Self {
        let (status, exit_code) = match outcome {
            Ok(()) => (StageStatus::Succeeded, Some(0)),
            Err(StageError::NotFound(_) | StageError::InterpreterNotFound(_)) => {
                (StageStatus::NotFound, None)
            }
            Err(StageError::Failed { code, .. }) => (StageStatus::Failed, *code),
            Err(StageError::TimedOut(_)) => (StageStatus::TimedOut, None),
            Err(StageError::Spawn(_)) => (StageStatus::SpawnFailed, None),
        };
        let detail = outcome.as_ref().err().map(ToString::to_string);
        Self {
            name: name.to_string(),
            status,
            exit_code,
            detail,
        }
    }
}

/// Ephemeral record of one traversal; exists only until it is logged.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageResult>,
}

impl PipelineRun {
    pub fn succeeded(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Succeeded)
            .count()
    }
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineRunner {
    stages: Vec<StageConfig>,
    workdir: PathBuf,
    stage_timeout: Duration,
    logs: LogStore,
}

impl PipelineRunner {
    pub fn new(
        stages: Vec<StageConfig>,
        workdir: impl Into<PathBuf>,
        stage_timeout: Duration,
        logs: LogStore,
    ) -> Self {
        Self {
            stages,
            workdir: workdir.into(),
            stage_timeout,
            logs,
        }
    }

    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(
            config.stages.clone(),
            root,
            config.stage_timeout(),
            LogStore::new(config.log_path(root)),
        )
    }

    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    /// Run every stage once, in declared order.
    pub async fn run_once(&self) -> PipelineRun {
        let total = self.stages.len();
        let started_at = Utc::now();
        info!(stages = total, "pipeline run started");
        self.record(RUN_STARTED_MARKER);

        let mut results = Vec::with_capacity(total);
        for (i, stage) in self.stages.iter().enumerate() {
            let step = format!("[{}/{}]", i + 1, total);
            self.record(&format!("{step} Running {}...", stage.name));

            let outcome = execute_stage(stage, &self.workdir, self.stage_timeout).await;
            let line = match &outcome {
                Ok(()) => format!("{step} ✓ {} completed successfully", stage.name),
                Err(e @ (StageError::NotFound(_) | StageError::InterpreterNotFound(_))) => {
                    format!("{step} ERROR: {} not found ({e})", stage.name)
                }
                Err(e) => format!("{step} ✗ {} {e}", stage.name),
            };
            match &outcome {
                Ok(()) => info!(stage = %stage.name, "stage succeeded"),
                Err(e) => warn!(stage = %stage.name, error = %e, "stage did not succeed"),
            }
            self.record(&line);
            results.push(StageResult::from_outcome(&stage.name, &outcome));
        }

        let run = PipelineRun {
            started_at,
            finished_at: Utc::now(),
            stages: results,
        };
        self.record(&format!(
            "{RUN_COMPLETED_MARKER} ({}/{} stages succeeded) ==========",
            run.succeeded(),
            total
        ));
        info!(succeeded = run.succeeded(), stages = total, "pipeline run completed");
        run
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.logs.append(message) {
            error!(error = %e, log = %self.logs.path().display(), "failed to append log record");
        }
    }
}

// ---------------------------------------------------------------------------
// Stage execution
// ---------------------------------------------------------------------------

async fn execute_stage(
    stage: &StageConfig,
    workdir: &Path,
    timeout: Duration,
) -> Result<(), StageError> {
    let script = paths::resolve(workdir, &stage.script);
    if !script.exists() {
        return Err(StageError::NotFound(script));
    }

    let mut cmd = match &stage.interpreter {
        Some(interpreter) => {
            let program = which::which(interpreter)
                .map_err(|_| StageError::InterpreterNotFound(interpreter.clone()))?;
            let mut cmd = Command::new(program);
            cmd.arg(&script);
            cmd
        }
        None => Command::new(&script),
    };
    cmd.current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StageError::NotFound(script.clone()),
        _ => StageError::Spawn(e.to_string()),
    })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => Err(StageError::TimedOut(timeout.as_secs())),
        Ok(Err(e)) => Err(StageError::Spawn(e.to_string())),
        Ok(Ok(output)) if output.status.success() => Ok(()),
        Ok(Ok(output)) => Err(StageError::Failed {
            code: output.status.code(),
            stderr: stderr_excerpt(&output.stderr),
        }),
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .trim()
        .chars()
        .take(STDERR_EXCERPT_CHARS)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
