pub mod config;
pub mod daemon;
pub mod init;
pub mod logs;
pub mod run;
pub mod serve;

use anyhow::Context;
use cronpipe_core::config::Config;
use std::path::Path;

pub(crate) fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config")
}
