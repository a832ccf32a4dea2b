use cronpipe_core::config::Config;
use cronpipe_core::log_store::LogStore;
use cronpipe_core::process::DaemonLaunch;
use cronpipe_core::supervisor::Supervisor;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
///
/// Holds no daemon state of its own: every request re-reads the handle and
/// the log file through the core types.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub supervisor: Arc<Supervisor>,
    pub logs: LogStore,
}

impl AppState {
    pub fn new(root: PathBuf, config: Config, launch: DaemonLaunch) -> Self {
        let supervisor = Supervisor::new(&root, &config, launch);
        Self::with_supervisor(root, config, supervisor)
    }

    pub fn with_supervisor(root: PathBuf, config: Config, supervisor: Supervisor) -> Self {
        let logs = LogStore::new(config.log_path(&root));
        Self {
            root,
            config: Arc::new(config),
            supervisor: Arc::new(supervisor),
            logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_store_follows_configured_file() {
        let root = PathBuf::from("/tmp/cronpipe-test");
        let mut config = Config::default();
        config.log_file = PathBuf::from("logs/run.log");
        let state = AppState::new(root.clone(), config, DaemonLaunch::new("true", &root));
        assert_eq!(state.logs.path(), root.join("logs/run.log"));
        assert_eq!(state.supervisor.min_interval(), 10);
    }
}
