use crate::error::Result;
use crate::io::{atomic_write, remove_if_exists};
use crate::paths::handle_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ProcessHandle
// ---------------------------------------------------------------------------

/// Persisted identity of the running daemon.
///
/// `started_at` is the start time the OS reported for `pid` when the daemon
/// was spawned. A pid whose current start time differs belongs to some other
/// process that recycled the number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub interval_seconds: u64,
}

impl ProcessHandle {
    /// Read `.cronpipe/daemon.yaml`. `Ok(None)` when no handle is recorded.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = handle_path(root);
        let data = match std::fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let handle: ProcessHandle = serde_yaml::from_str(&data)?;
        Ok(Some(handle))
    }

    /// Atomically write this handle to `.cronpipe/daemon.yaml`.
    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        atomic_write(&handle_path(root), data.as_bytes())
    }

    /// Remove the recorded handle. Silently succeeds if it is gone.
    pub fn remove(root: &Path) -> Result<bool> {
        remove_if_exists(&handle_path(root))
    }
}
