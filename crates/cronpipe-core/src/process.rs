//! OS process supervision behind a small interface.
//!
//! [`ProcessControl`] is everything the supervisor needs from the OS:
//! spawn a detached daemon, decide whether a recorded handle still names
//! that daemon, and stop it. [`OsProcessControl`] is the Unix implementation
//! (`sysinfo` for start times, `nix` for signals).

use crate::error::{CronError, Result};
use crate::handle::ProcessHandle;
use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use sysinfo::{ProcessStatus, System};
use tracing::{debug, warn};

/// Recorded and observed start times may differ by rounding.
const START_TIME_TOLERANCE_SECS: i64 = 1;
/// How long to wait for exit after SIGKILL before giving up.
const FORCED_EXIT_WAIT: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// DaemonLaunch
// ---------------------------------------------------------------------------

/// Command line used to start the scheduler loop. The supervisor appends
/// `--interval <seconds>`.
#[derive(Debug, Clone)]
pub struct DaemonLaunch {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    /// File receiving the daemon's stdout and stderr.
    pub output: PathBuf,
}

impl DaemonLaunch {
    pub fn new(program: impl Into<PathBuf>, root: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: root.to_path_buf(),
            output: crate::paths::daemon_output_path(root),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Re-invoke the running executable as `<exe> --root <root> daemon-run`.
    pub fn current_exe(root: &Path) -> Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(exe, root)
            .arg("--root")
            .arg(root.to_string_lossy())
            .arg("daemon-run"))
    }
}

// ---------------------------------------------------------------------------
// ProcessControl
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Needed SIGKILL.
    Forced,
    /// Was already gone when we got to it.
    AlreadyExited,
}

pub trait ProcessControl: Send + Sync {
    /// Start the daemon detached from the caller and return its handle.
    fn spawn(&self, launch: &DaemonLaunch, interval_seconds: u64) -> Result<ProcessHandle>;

    /// True only if `handle.pid` is running and is the process that was spawned.
    fn is_alive(&self, handle: &ProcessHandle) -> bool;

    /// Graceful stop, escalating to a forced kill after `grace`.
    fn terminate(&self, handle: &ProcessHandle, grace: Duration) -> Result<Termination>;
}

// ---------------------------------------------------------------------------
// OsProcessControl
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OsProcessControl {
    /// Pause after spawning before checking the daemon did not die at once.
    pub settle: Duration,
    pub poll_interval: Duration,
}

impl Default for OsProcessControl {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(250),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl OsProcessControl {
    fn wait_for_exit(&self, handle: &ProcessHandle, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_alive(handle) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

impl ProcessControl for OsProcessControl {
    fn spawn(&self, launch: &DaemonLaunch, interval_seconds: u64) -> Result<ProcessHandle> {
        if let Some(parent) = launch.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&launch.output)?;

        let mut child = Command::new(&launch.program)
            .args(&launch.args)
            .arg("--interval")
            .arg(interval_seconds.to_string())
            .current_dir(&launch.workdir)
            .stdin(Stdio::null())
            .stdout(output.try_clone()?)
            .stderr(output)
            .process_group(0)
            .spawn()
            .map_err(|e| {
                CronError::SpawnFailed(format!("'{}': {e}", launch.program.display()))
            })?;
        let pid = child.id();

        std::thread::sleep(self.settle);
        if let Some(status) = child.try_wait()? {
            return Err(CronError::SpawnFailed(format!(
                "daemon exited immediately ({status}); see {}",
                launch.output.display()
            )));
        }

        let started_at = start_time_or_kill(&mut child, process_start_time)?;

        // Reap the child when it exits so it never lingers as a zombie here.
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        debug!(pid, %started_at, "daemon spawned");
        Ok(ProcessHandle {
            pid,
            started_at,
            interval_seconds,
        })
    }

    fn is_alive(&self, handle: &ProcessHandle) -> bool {
        match process_start_time(handle.pid) {
            Some(observed) => {
                let drift = (observed - handle.started_at).num_seconds().abs();
                if drift > START_TIME_TOLERANCE_SECS {
                    debug!(pid = handle.pid, %observed, recorded = %handle.started_at, "pid reused by another process");
                }
                drift <= START_TIME_TOLERANCE_SECS
            }
            None => false,
        }
    }

    fn terminate(&self, handle: &ProcessHandle, grace: Duration) -> Result<Termination> {
        if !self.is_alive(handle) {
            return Ok(Termination::AlreadyExited);
        }
        let pid = Pid::from_raw(handle.pid as i32);

        match signal::kill(pid, Signal::SIGTERM) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(Termination::AlreadyExited),
            Err(e) => {
                return Err(CronError::TerminateFailed {
                    pid: handle.pid,
                    reason: format!("SIGTERM: {e}"),
                })
            }
        }
        if self.wait_for_exit(handle, grace) {
            return Ok(Termination::Graceful);
        }

        warn!(pid = handle.pid, grace_secs = grace.as_secs_f64(), "daemon ignored SIGTERM, sending SIGKILL");
        // The daemon leads its own process group; take any running stage down with it.
        match signal::killpg(pid, Signal::SIGKILL) {
            Ok(()) => {}
            Err(Errno::ESRCH) => match signal::kill(pid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => {
                    return Err(CronError::TerminateFailed {
                        pid: handle.pid,
                        reason: format!("SIGKILL: {e}"),
                    })
                }
            },
            Err(e) => {
                return Err(CronError::TerminateFailed {
                    pid: handle.pid,
                    reason: format!("SIGKILL: {e}"),
                })
            }
        }
        if self.wait_for_exit(handle, FORCED_EXIT_WAIT) {
            Ok(Termination::Forced)
        } else {
            Err(CronError::TerminateFailed {
                pid: handle.pid,
                reason: "still running after SIGKILL".to_string(),
            })
        }
    }
}

/// OS start time of a live, non-zombie process.
pub fn process_start_time(pid: u32) -> Option<DateTime<Utc>> {
    let pid = sysinfo::Pid::from_u32(pid);
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return None;
    }
    let process = sys.process(pid)?;
    if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
        return None;
    }
    DateTime::from_timestamp(process.start_time() as i64, 0)
}

/// Start time of a freshly spawned child. If it cannot be read the child is
/// killed and reaped, since no handle could ever name it.
fn start_time_or_kill(
    child: &mut Child,
    lookup: impl Fn(u32) -> Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>> {
    let pid = child.id();
    if let Some(started_at) = lookup(pid) {
        return Ok(started_at);
    }
    if let Err(e) = child.kill() {
        warn!(pid, error = %e, "failed to kill daemon with unreadable start time");
    }
    let _ = child.wait();
    Err(CronError::SpawnFailed(format!(
        "could not read start time of PID {pid}"
    )))
}
