use crate::cmd::load_config;
use crate::output::print_json;
use anyhow::Context;
use cronpipe_core::config::Config;
use cronpipe_core::process::{DaemonLaunch, Termination};
use cronpipe_core::scheduler;
use cronpipe_core::supervisor::Supervisor;
use std::path::Path;

fn supervisor(root: &Path, config: &Config) -> anyhow::Result<Supervisor> {
    let launch = DaemonLaunch::current_exe(root).context("cannot locate cronpipe executable")?;
    Ok(Supervisor::new(root, config, launch))
}

// ---------------------------------------------------------------------------
// start / stop / status
// ---------------------------------------------------------------------------

pub fn start(root: &Path, interval: Option<i64>, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let interval = interval.unwrap_or(config.default_interval_seconds as i64);
    let handle = supervisor(root, &config)?.start(interval)?;

    if json {
        print_json(&handle)?;
    } else {
        println!(
            "Daemon started (PID: {}, interval: {}s)",
            handle.pid, handle.interval_seconds
        );
        println!("Log: {}", config.log_path(root).display());
    }
    Ok(())
}

pub fn stop(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let outcome = supervisor(root, &config)?.stop()?;

    if json {
        print_json(&serde_json::json!({ "stopped": true, "termination": outcome }))?;
    } else {
        match outcome {
            Termination::Graceful => println!("Daemon stopped."),
            Termination::Forced => println!(
                "Daemon did not exit within {}s and was killed.",
                config.stop_grace_seconds
            ),
            Termination::AlreadyExited => println!("Daemon had already exited."),
        }
    }
    Ok(())
}

pub fn status(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let status = supervisor(root, &config)?.status()?;

    if json {
        print_json(&status)?;
        return Ok(());
    }
    println!("{}", status.message);
    if let (Some(started), Some(interval)) = (status.started_at, status.interval_seconds) {
        println!("  started:  {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  interval: {interval}s");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// daemon-run (the spawned process)
// ---------------------------------------------------------------------------

pub fn daemon_run(root: &Path, interval: i64) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(scheduler::run_daemon(root, &config, interval))?;
    Ok(())
}
