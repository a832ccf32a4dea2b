//! Single-instance lifecycle control of the background daemon.
//!
//! The only source of truth for "is it running" is the persisted
//! [`ProcessHandle`] re-validated against the OS on every call. All three
//! operations serialize on an exclusive lock over `.cronpipe/daemon.lock`,
//! so concurrent callers (CLI and API, or two API requests) cannot both
//! observe "not running" and spawn a second daemon.

use crate::config::{Config, WarnLevel};
use crate::error::{CronError, Result};
use crate::handle::ProcessHandle;
use crate::io::lock_exclusive;
use crate::paths;
use crate::process::{DaemonLaunch, OsProcessControl, ProcessControl, Termination};
use chrono::{DateTime, Utc};
use nix::fcntl::Flock;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaemonStatus {
    pub is_running: bool,
    pub pid: Option<u32>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
}

impl DaemonStatus {
    fn running(handle: &ProcessHandle) -> Self {
        Self {
            is_running: true,
            pid: Some(handle.pid),
            message: format!("Daemon is running (PID: {})", handle.pid),
            started_at: Some(handle.started_at),
            interval_seconds: Some(handle.interval_seconds),
        }
    }

    fn stopped() -> Self {
        Self {
            is_running: false,
            pid: None,
            message: "Daemon is not running".to_string(),
            started_at: None,
            interval_seconds: None,
        }
    }
}

pub struct Supervisor {
    root: PathBuf,
    launch: DaemonLaunch,
    min_interval: u64,
    grace: Duration,
    /// Error-level config problems; any of these blocks `start`.
    config_errors: Vec<String>,
    control: Box<dyn ProcessControl>,
}

impl Supervisor {
    pub fn new(root: &Path, config: &Config, launch: DaemonLaunch) -> Self {
        Self::with_control(root, config, launch, Box::new(OsProcessControl::default()))
    }

    pub fn with_control(
        root: &Path,
        config: &Config,
        launch: DaemonLaunch,
        control: Box<dyn ProcessControl>,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            launch,
            min_interval: config.min_interval_seconds,
            grace: config.stop_grace(),
            config_errors: config
                .validate(root)
                .into_iter()
                .filter(|w| w.level == WarnLevel::Error)
                .map(|w| w.message)
                .collect(),
            control,
        }
    }

    pub fn min_interval(&self) -> u64 {
        self.min_interval
    }

    /// Spawn the daemon with the given interval.
    pub fn start(&self, interval_seconds: i64) -> Result<ProcessHandle> {
        if interval_seconds < self.min_interval as i64 {
            return Err(CronError::InvalidInterval {
                interval: interval_seconds,
                min: self.min_interval,
            });
        }
        if !self.config_errors.is_empty() {
            return Err(CronError::InvalidConfig(self.config_errors.join("; ")));
        }
        let _lock = self.lock()?;

        if let Some(handle) = self.live_handle()? {
            return Err(CronError::AlreadyRunning { pid: handle.pid });
        }

        let handle = self.control.spawn(&self.launch, interval_seconds as u64)?;
        if let Err(e) = handle.save(&self.root) {
            // An unrecorded daemon could never be stopped through us.
            if let Err(kill_err) = self.control.terminate(&handle, Duration::ZERO) {
                warn!(pid = handle.pid, error = %kill_err, "failed to kill unrecorded daemon");
            }
            return Err(e);
        }
        info!(pid = handle.pid, interval_secs = handle.interval_seconds, "daemon started");
        Ok(handle)
    }

    /// Stop the recorded daemon, escalating to a forced kill after the grace period.
    pub fn stop(&self) -> Result<Termination> {
        let _lock = self.lock()?;

        let handle = self.live_handle()?.ok_or(CronError::NotRunning)?;
        let outcome = self.control.terminate(&handle, self.grace)?;
        ProcessHandle::remove(&self.root)?;
        info!(pid = handle.pid, ?outcome, "daemon stopped");
        Ok(outcome)
    }

    pub fn status(&self) -> Result<DaemonStatus> {
        let _lock = self.lock()?;
        Ok(match self.live_handle()? {
            Some(handle) => DaemonStatus::running(&handle),
            None => DaemonStatus::stopped(),
        })
    }

    fn lock(&self) -> Result<Flock<File>> {
        lock_exclusive(&paths::lock_path(&self.root))
    }

    /// The recorded handle if its process is still alive. Stale or unreadable
    /// handles are removed. Callers must hold the lock.
    fn live_handle(&self) -> Result<Option<ProcessHandle>> {
        let handle = match ProcessHandle::load(&self.root) {
            Ok(Some(h)) => h,
            Ok(None) => return Ok(None),
            Err(CronError::Yaml(e)) => {
                warn!(error = %e, "discarding unreadable daemon handle");
                ProcessHandle::remove(&self.root)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if self.control.is_alive(&handle) {
            return Ok(Some(handle));
        }
        warn!(pid = handle.pid, "removing stale daemon handle");
        ProcessHandle::remove(&self.root)?;
        Ok(None)
    }
}
