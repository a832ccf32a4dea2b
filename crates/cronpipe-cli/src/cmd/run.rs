use crate::cmd::load_config;
use crate::output::{print_json, print_table};
use cronpipe_core::pipeline::{PipelineRunner, StageStatus};
use std::path::Path;

/// Run the pipeline once in the foreground, writing to the same log as the daemon.
pub fn run_once(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let runner = PipelineRunner::from_config(root, &config);
    let rt = tokio::runtime::Runtime::new()?;
    let run = rt.block_on(runner.run_once());

    if json {
        return print_json(&run);
    }

    let rows = run
        .stages
        .iter()
        .map(|s| {
            let status = match s.status {
                StageStatus::Succeeded => "ok",
                StageStatus::Failed => "failed",
                StageStatus::NotFound => "not found",
                StageStatus::TimedOut => "timed out",
                StageStatus::SpawnFailed => "spawn failed",
            };
            vec![
                s.name.clone(),
                status.to_string(),
                s.detail.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["STAGE", "STATUS", "DETAIL"], rows);
    println!(
        "\n{}/{} stages succeeded in {:.1}s",
        run.succeeded(),
        run.stages.len(),
        (run.finished_at - run.started_at).num_milliseconds() as f64 / 1000.0
    );
    Ok(())
}
