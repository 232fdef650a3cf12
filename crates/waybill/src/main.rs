//! Waybill command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use waybill::context::RunContext;
use waybill::coordinator::DispatchCoordinator;
use waybill::settings::Settings;
use waybill_db::{FolderConfig, WaybillDb};
use waybill_logging::LogConfig;

#[derive(Parser, Debug)]
#[command(name = "waybill", about = "EDI batch dispatcher", version)]
struct Cli {
    /// Settings file (defaults to ~/.waybill/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger database path (overrides the settings file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Echo the full log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one dispatch cycle over all active folders
    Dispatch,
    /// Manage folder configurations
    Folders {
        #[command(subcommand)]
        command: FoldersCommand,
    },
    /// Flag a delivered file for redelivery on the next run
    Resend {
        /// Folder alias the file was delivered for
        alias: String,
        /// Content checksum from the processed-file ledger
        checksum: String,
    },
    /// Show recent dispatch runs
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand, Debug)]
enum FoldersCommand {
    /// Import (upsert) folder configs from a TOML file
    Import { path: PathBuf },
    /// List configured folders
    List,
}

/// Shape of the `folders import` file.
#[derive(Debug, serde::Deserialize)]
struct FolderImportFile {
    #[serde(default)]
    folder: Vec<FolderConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    waybill_logging::init_logging(LogConfig {
        app_name: "waybill",
        verbose: cli.verbose,
    })?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db_path) = &cli.db {
        settings.database_path = db_path.clone();
    }

    let db = WaybillDb::open(&settings.database_path).await?;

    match cli.command {
        Command::Dispatch => {
            let ctx = Arc::new(RunContext::build(settings)?);
            let coordinator = DispatchCoordinator::new(db, ctx);
            let summary = coordinator.run().await?;
            println!("{summary}");
        }
        Command::Folders { command } => match command {
            FoldersCommand::Import { path } => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let import: FolderImportFile = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                let mut imported = 0usize;
                for config in &import.folder {
                    db.upsert_folder_config(config).await?;
                    imported += 1;
                }
                info!(imported, path = %path.display(), "Folder configs imported");
                println!("Imported {imported} folder config(s)");
            }
            FoldersCommand::List => {
                let folders = db.list_folder_configs().await?;
                if folders.is_empty() {
                    println!("No folders configured");
                } else {
                    for folder in folders {
                        println!(
                            "{:<20} {:<7} {:<5} {}",
                            folder.alias,
                            folder.connection_type.as_str(),
                            if folder.enabled { "on" } else { "off" },
                            folder.folder_name
                        );
                    }
                }
            }
        },
        Command::Resend { alias, checksum } => {
            db.set_resend_flag(&alias, &checksum, true).await?;
            println!("Flagged {checksum} in folder '{alias}' for resend");
        }
        Command::Runs { limit } => {
            let runs = db.list_runs(limit).await?;
            for run in runs {
                println!(
                    "#{:<5} {} {:<9} {} processed, {} errors{}",
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.status.as_str(),
                    run.files_processed,
                    run.files_failed,
                    run.error_message
                        .map(|m| format!(" ({m})"))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
