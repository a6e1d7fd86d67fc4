use std::path::PathBuf;

use clap::{Parser, Subcommand};

use jiramirror::{Collection, Config, JiraMirror, SyncReport, SyncStatus};

#[derive(Parser)]
#[command(name = "jiramirror", about = "Mirror Jira issues and worklogs locally")]
struct Cli {
    /// Configuration file (default: ~/.config/jiramirror/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize worklogs and issues into the local store
    Sync,
    /// Download issues referenced by local worklogs but missing locally
    Check,
    /// Apply the configured formatting rules to the remote Jira
    Format,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl jiramirror::SyncProgress for StderrProgress {
    fn on_phase_start(&self, phase: &str) {
        eprintln!("Syncing {phase}...");
    }

    fn on_window(&self, collection: Collection, start: u64, width: u64, found: usize) {
        if width > 1 {
            eprintln!("  {} [{start}, {}): {found} found", collection.name(), start + width);
        }
    }

    fn on_phase_complete(&self, report: &SyncReport) {
        eprintln!("  Done: {} items synced", report.items_synced);
    }
}

fn any_failed(reports: &[SyncReport]) -> bool {
    reports.iter().any(|r| r.status != SyncStatus::Success)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::load(cli.config.as_deref())?;
    let mirror = JiraMirror::from_config(config)?;

    match cli.command {
        Commands::Sync => {
            let reports = mirror.sync(&StderrProgress).await?;
            if any_failed(&reports) {
                anyhow::bail!("sync finished with failures");
            }
        }
        Commands::Check => {
            let report = mirror.check(&StderrProgress).await?;
            if report.status != SyncStatus::Success {
                anyhow::bail!("check finished with failures");
            }
        }
        Commands::Format => {
            mirror.format().await?;
        }
    }
    Ok(())
}
