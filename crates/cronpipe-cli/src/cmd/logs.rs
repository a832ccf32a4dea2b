use crate::cmd::load_config;
use crate::output::print_json;
use cronpipe_core::log_store::{last_lines, LogStore};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

const FOLLOW_POLL: Duration = Duration::from_millis(250);
const FOLLOW_BACKLOG: usize = 10;

pub fn show(root: &Path, lines: Option<i64>, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let logs = LogStore::new(config.log_path(root));

    let text = match lines {
        Some(n) if n > 0 => logs.read_last(n as usize)?,
        _ => logs.read_all()?,
    };

    if json {
        print_json(&serde_json::json!({
            "logs": text,
            "line_count": text.lines().count(),
        }))?;
    } else if text.is_empty() {
        eprintln!("No logs available yet ({})", logs.path().display());
    } else {
        print!("{text}");
    }
    Ok(())
}

/// Print the tail of the log, then keep printing whatever gets appended
/// until interrupted. `--lines` sets the backlog; N <= 0 prints the whole log.
pub fn follow(root: &Path, lines: Option<i64>, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let logs = LogStore::new(config.log_path(root));
    let backlog = match lines {
        Some(n) if n > 0 => Some(n as usize),
        Some(_) => None,
        None => Some(FOLLOW_BACKLOG),
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(follow_log(&logs, backlog, json))
}

async fn follow_log(logs: &LogStore, backlog: Option<usize>, json: bool) -> anyhow::Result<()> {
    let (text, mut offset) = logs.read_from(0)?;
    let text = match backlog {
        Some(n) => last_lines(&text, n),
        None => text,
    };
    emit(&text, json)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(FOLLOW_POLL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (text, next) = logs.read_from(offset)?;
                offset = next;
                emit(&text, json)?;
            }
            _ = &mut ctrl_c => return Ok(()),
        }
    }
}

fn emit(text: &str, json: bool) -> anyhow::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let mut out = std::io::stdout().lock();
    if json {
        for line in text.lines() {
            writeln!(out, "{}", serde_json::json!({ "line": line }))?;
        }
    } else {
        out.write_all(text.as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

pub fn clear(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let logs = LogStore::new(config.log_path(root));
    let cleared = logs.clear()?;

    if json {
        print_json(&serde_json::json!({ "cleared": cleared }))?;
    } else if cleared {
        println!("Logs cleared.");
    } else {
        println!("No log file to clear.");
    }
    Ok(())
}
