use crate::cmd::load_config;
use crate::output::{print_json, print_table};
use clap::Subcommand;
use cronpipe_core::config::WarnLevel;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config, defaults included
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    if json {
        return print_json(&config);
    }

    println!("root:             {}", root.display());
    println!("log file:         {}", config.log_path(root).display());
    println!(
        "interval:         {}s default, {}s minimum",
        config.default_interval_seconds, config.min_interval_seconds
    );
    println!("stage timeout:    {}s", config.stage_timeout_seconds);
    println!("stop grace:       {}s", config.stop_grace_seconds);
    println!("server:           {}:{}", config.server.host, config.server.port);
    println!();

    let rows = config
        .stages
        .iter()
        .enumerate()
        .map(|(i, s)| {
            vec![
                (i + 1).to_string(),
                s.name.clone(),
                s.interpreter.clone().unwrap_or_else(|| "-".to_string()),
                s.script.display().to_string(),
            ]
        })
        .collect();
    print_table(&["#", "STAGE", "INTERPRETER", "SCRIPT"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let warnings = config.validate(root);

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
