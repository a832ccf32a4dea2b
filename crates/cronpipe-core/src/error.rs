use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("interval must be at least {min} seconds (got {interval})")]
    InvalidInterval { interval: i64, min: u64 },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("daemon is already running (PID: {pid}); stop it first")]
    AlreadyRunning { pid: u32 },

    #[error("daemon is not running")]
    NotRunning,

    #[error("failed to start daemon: {0}")]
    SpawnFailed(String),

    #[error("failed to stop daemon (PID: {pid}): {reason}")]
    TerminateFailed { pid: u32, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl CronError {
    /// Stable machine-readable name for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            CronError::InvalidInterval { .. } | CronError::Validation(_) => "validation",
            CronError::AlreadyRunning { .. } => "already_running",
            CronError::NotRunning => "not_running",
            CronError::SpawnFailed(_) => "spawn_failed",
            CronError::TerminateFailed { .. } => "terminate_failed",
            CronError::InvalidConfig(_) => "invalid_config",
            CronError::Io(_) | CronError::Yaml(_) => "io",
        }
    }
}

impl From<nix::errno::Errno> for CronError {
    fn from(errno: nix::errno::Errno) -> Self {
        CronError::Io(std::io::Error::from(errno))
    }
}

pub type Result<T> = std::result::Result<T, CronError>;
