mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cronpipe",
    about = "Run a fixed pipeline of stage scripts on an interval, as a supervised background daemon",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .cronpipe/)
    #[arg(long, global = true, env = "CRONPIPE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .cronpipe/ and a default config
    Init,

    /// Start the background daemon
    Start {
        /// Seconds between pipeline runs (default: default_interval_seconds from config)
        #[arg(long, allow_negative_numbers = true)]
        interval: Option<i64>,
    },

    /// Stop the background daemon
    Stop,

    /// Show whether the daemon is running
    Status,

    /// Print the execution log
    Logs {
        /// Only the last N lines
        #[arg(long, short = 'n', allow_negative_numbers = true)]
        lines: Option<i64>,
        /// Keep printing new records as they are appended (Ctrl-C to stop)
        #[arg(long, short = 'f')]
        follow: bool,
    },

    /// Empty the execution log
    LogsClear,

    /// Run every stage once in the foreground
    RunOnce,

    /// Serve the HTTP control API
    Serve {
        /// Address to bind (default: server.host from config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Inspect the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Scheduler loop; spawned by `start`
    #[command(hide = true)]
    DaemonRun {
        #[arg(long)]
        interval: i64,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::DaemonRun { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Start { interval } => cmd::daemon::start(&root, interval, cli.json),
        Commands::Stop => cmd::daemon::stop(&root, cli.json),
        Commands::Status => cmd::daemon::status(&root, cli.json),
        Commands::Logs { lines, follow: true } => cmd::logs::follow(&root, lines, cli.json),
        Commands::Logs { lines, follow: false } => cmd::logs::show(&root, lines, cli.json),
        Commands::LogsClear => cmd::logs::clear(&root, cli.json),
        Commands::RunOnce => cmd::run::run_once(&root, cli.json),
        Commands::Serve { host, port } => cmd::serve::run(&root, host, port),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::DaemonRun { interval } => cmd::daemon::daemon_run(&root, interval),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
