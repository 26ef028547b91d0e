//! `pmr` entry point.
//!
//! Exit codes:
//! - 0: success, partial success, or nothing to do
//! - 1: configuration or usage error
//! - 2: the pass could not obtain metrics or read the ledger; a broken audit chain

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pmr")]
#[command(about = "Post metrics reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass and print its summary line
    Reconcile {
        /// Layered config paths in merge order (base -> env -> local)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Compute write-backs without touching the ledger
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Overrides /ledger/dir
        #[arg(long)]
        ledger_dir: Option<PathBuf>,

        /// Overrides /reconcile/platform
        #[arg(long)]
        platform: Option<String>,
    },

    /// List ledger rows waiting for metrics
    Pending {
        #[arg(long)]
        ledger_dir: PathBuf,

        #[arg(long, default_value = "LinkedIn")]
        platform: String,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Normalize a displayed count ("1.2K", "3,402") to an integer
    Normalize { text: String },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an audit JSONL file
    Verify { path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(commands::EXIT_CONFIG)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(commands::EXIT_CONFIG)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.cmd {
        Commands::Reconcile {
            config_paths,
            dry_run,
            ledger_dir,
            platform,
        } => {
            commands::reconcile::run(commands::reconcile::ReconcileArgs {
                config_paths,
                dry_run,
                ledger_dir,
                platform,
            })
            .await
        }

        Commands::Pending {
            ledger_dir,
            platform,
        } => commands::pending::run(&ledger_dir, &platform).await,

        Commands::ConfigHash { paths } => {
            let loaded = pmr_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(commands::EXIT_OK)
        }

        Commands::Normalize { text } => {
            println!("{}", pmr_sources::normalize_count(&text));
            Ok(commands::EXIT_OK)
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit::verify(&path),
        },
    }
}

/// Logs to stderr; stdout carries only command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
