use anyhow::Context;
use cronpipe_core::config::Config;
use cronpipe_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing cronpipe in: {}", root.display());

    io::ensure_dir(&paths::state_dir(root)).context("failed to create .cronpipe/")?;

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write default config")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let config = Config::load(root).context("failed to load config")?;
    let missing: Vec<_> = config
        .stages
        .iter()
        .filter(|s| !paths::resolve(root, &s.script).exists())
        .collect();
    if !missing.is_empty() {
        println!("\nStage scripts not found yet:");
        for stage in missing {
            println!("  {}", stage.script.display());
        }
    }

    println!("\nNext: edit {} and run `cronpipe start`", paths::CONFIG_FILE);
    Ok(())
}
