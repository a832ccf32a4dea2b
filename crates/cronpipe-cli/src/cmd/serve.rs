use crate::cmd::load_config;
use anyhow::Context;
use cronpipe_core::process::DaemonLaunch;
use cronpipe_server::AppState;
use std::path::Path;

pub fn run(root: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let launch = DaemonLaunch::current_exe(root).context("cannot locate cronpipe executable")?;
    let state = AppState::new(root.to_path_buf(), config, launch);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(cronpipe_server::serve(state, &host, port))
}
