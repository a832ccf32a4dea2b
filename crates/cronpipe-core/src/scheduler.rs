//! The long-running loop executed inside the daemon process.

use crate::config::Config;
use crate::error::{CronError, Result};
use crate::pipeline::PipelineRunner;
use std::path::Path;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    interval: Duration,
}

impl SchedulerConfig {
    /// Reject intervals below `min_seconds`.
    pub fn new(interval_seconds: i64, min_seconds: u64) -> Result<Self> {
        if interval_seconds < min_seconds as i64 {
            return Err(CronError::InvalidInterval {
                interval: interval_seconds,
                min: min_seconds,
            });
        }
        Ok(Self {
            interval: Duration::from_secs(interval_seconds as u64),
        })
    }

    /// Unchecked; sub-second ticks for tests.
    #[cfg(test)]
    pub(crate) fn from_duration(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Sleep, run, repeat until `stop` turns true or its sender goes away.
///
/// The sleep is raced against the stop channel; a run that has already
/// begun is always allowed to finish. Returns the number of completed runs.
pub async fn run(
    runner: &PipelineRunner,
    config: SchedulerConfig,
    mut stop: watch::Receiver<bool>,
) -> u64 {
    let mut runs = 0;
    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }
        if *stop.borrow() {
            break;
        }
        runner.run_once().await;
        runs += 1;
    }
    runs
}

/// A stop channel flipped by SIGTERM or SIGINT.
pub fn stop_on_signals() -> Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        };
        info!(signal = name, "stop requested");
        let _ = tx.send(true);
        // Keep the sender alive so the loop sees `true`, not a closed channel.
        tx.closed().await;
    });
    Ok(rx)
}

/// Daemon entry point: validate, announce, loop until signalled, announce exit.
pub async fn run_daemon(root: &Path, config: &Config, interval_seconds: i64) -> Result<()> {
    let scheduler = SchedulerConfig::new(interval_seconds, config.min_interval_seconds)?;
    let runner = PipelineRunner::from_config(root, config);
    let stop = stop_on_signals()?;
    let pid = std::process::id();

    info!(pid, interval_secs = interval_seconds, root = %root.display(), "daemon started");
    announce(
        &runner,
        &format!("Pipeline daemon started (PID: {pid}, Interval: {interval_seconds}s)"),
    );

    let runs = run(&runner, scheduler, stop).await;

    info!(pid, runs, "daemon stopped");
    announce(&runner, &format!("Pipeline daemon stopped (PID: {pid})"));
    Ok(())
}

fn announce(runner: &PipelineRunner, message: &str) {
    if let Err(e) = runner.logs().append(message) {
        warn!(error = %e, "failed to write daemon lifecycle record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::log_store::LogStore;
    use crate::pipeline::{RUN_COMPLETED_MARKER, RUN_STARTED_MARKER};
    use std::path::PathBuf;
    use std::time::Instant;
    use tempfile::TempDir;

    fn runner(dir: &TempDir, body: &str) -> PipelineRunner {
        std::fs::write(dir.path().join("stage.sh"), body).unwrap();
        PipelineRunner::new(
            vec![StageConfig {
                name: "stage".into(),
                script: PathBuf::from("stage.sh"),
                interpreter: Some("sh".into()),
            }],
            dir.path(),
            Duration::from_secs(10),
            LogStore::new(dir.path().join("pipeline_execution.log")),
        )
    }

    #[test]
    fn interval_below_minimum_is_rejected() {
        let err = SchedulerConfig::new(5, 10).unwrap_err();
        assert!(matches!(err, CronError::InvalidInterval { interval: 5, min: 10 }));
        assert!(SchedulerConfig::new(-1, 10).is_err());
        assert_eq!(
            SchedulerConfig::new(10, 10).unwrap().interval(),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn runs_repeatedly_until_stopped() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, "echo tick >> ticks");
        let (tx, rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            tx.send(true).unwrap();
            tx
        });
        let runs = run(&runner, SchedulerConfig::from_duration(Duration::from_millis(100)), rx).await;
        let _tx = stopper.await.unwrap();

        assert!(runs >= 2, "expected several runs, got {runs}");
        let log = runner.logs().read_all().unwrap();
        assert_eq!(log.lines().count() as u64, runs * 4);
        let ticks = std::fs::read_to_string(dir.path().join("ticks")).unwrap();
        assert_eq!(ticks.lines().count() as u64, runs);
    }

    #[tokio::test]
    async fn stop_interrupts_the_sleep() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, "exit 0");
        let (tx, rx) = watch::channel(false);

        let started = Instant::now();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
            tx
        });
        let runs = run(&runner, SchedulerConfig::from_duration(Duration::from_secs(60)), rx).await;
        let _tx = stopper.await.unwrap();

        assert_eq!(runs, 0);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(runner.logs().read_all().unwrap(), "");
    }

    #[tokio::test]
    async fn in_flight_run_completes_before_exit() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, "sleep 1; touch finished");
        let (tx, rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            // First run starts at ~50ms and is still sleeping at 400ms.
            tokio::time::sleep(Duration::from_millis(400)).await;
            tx.send(true).unwrap();
            tx
        });
        let runs = run(&runner, SchedulerConfig::from_duration(Duration::from_millis(50)), rx).await;
        let _tx = stopper.await.unwrap();

        assert_eq!(runs, 1);
        assert!(dir.path().join("finished").exists());
        let log = runner.logs().read_all().unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert!(lines[0].ends_with(RUN_STARTED_MARKER));
        assert!(lines.last().unwrap().contains(RUN_COMPLETED_MARKER));
    }

    #[tokio::test]
    async fn dropped_sender_ends_the_loop() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, "exit 0");
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let runs = run(&runner, SchedulerConfig::from_duration(Duration::from_secs(60)), rx).await;
        assert_eq!(runs, 0);
    }
}
