use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STATE_DIR: &str = ".cronpipe";

pub const CONFIG_FILE: &str = ".cronpipe/config.yaml";
pub const HANDLE_FILE: &str = ".cronpipe/daemon.yaml";
pub const LOCK_FILE: &str = ".cronpipe/daemon.lock";
pub const DAEMON_OUTPUT_FILE: &str = ".cronpipe/daemon.out";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn handle_path(root: &Path) -> PathBuf {
    root.join(HANDLE_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

pub fn daemon_output_path(root: &Path) -> PathBuf {
    root.join(DAEMON_OUTPUT_FILE)
}

/// Resolve a configured path against the project root. Absolute paths pass through.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}
