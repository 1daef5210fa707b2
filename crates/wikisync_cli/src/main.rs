//! WikiSync CLI
//!
//! Command-line interface for synchronizing a markdown docs folder with its
//! companion wiki repository.
//!
//! # Commands
//!
//! - `sync` - Run a full synchronization pass
//! - `diff` - Show the changes a sync would apply, without applying them

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wikisync_core::ConflictStrategy;

/// WikiSync command-line tools.
#[derive(Parser)]
#[command(name = "wikisync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full synchronization pass
    Sync {
        /// Path to the markdown docs folder
        #[arg(long)]
        docs: PathBuf,

        /// Root of the primary remote repository
        #[arg(long)]
        remote: PathBuf,

        /// Root of the companion wiki repository
        #[arg(long)]
        wiki: PathBuf,

        /// Scratch directory for the wiki working copy
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Conflict strategy (primary-wins, secondary-wins, skip, manual)
        #[arg(long, default_value = "primary-wins")]
        strategy: String,

        /// Delete wiki pages whose source document is gone
        #[arg(long)]
        sync_deletes: bool,

        /// Maximum tolerated failures before the run aborts
        #[arg(long, default_value = "5")]
        max_failures: usize,

        /// Abort on the first failed change
        #[arg(long)]
        abort_on_error: bool,

        /// Commit message for wiki changes
        #[arg(short, long, default_value = "Sync documentation")]
        message: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the changes a sync would apply, without applying them
    Diff {
        /// Path to the markdown docs folder
        #[arg(long)]
        docs: PathBuf,

        /// Root of the companion wiki repository
        #[arg(long)]
        wiki: PathBuf,

        /// Include deletes for pages whose source document is gone
        #[arg(long)]
        sync_deletes: bool,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let outcome = match cli.command {
        Commands::Sync {
            docs,
            remote,
            wiki,
            work_dir,
            strategy,
            sync_deletes,
            max_failures,
            abort_on_error,
            message,
            format,
        } => {
            let strategy = match ConflictStrategy::from_name(&strategy) {
                Some(s) => s,
                None => {
                    eprintln!("unknown conflict strategy: {strategy}");
                    return ExitCode::FAILURE;
                }
            };
            commands::sync::run(commands::sync::SyncArgs {
                docs,
                remote,
                wiki,
                work_dir,
                strategy,
                sync_deletes,
                max_failures,
                abort_on_error,
                message,
                format,
            })
        }
        Commands::Diff {
            docs,
            wiki,
            sync_deletes,
        } => commands::diff::run(&docs, &wiki, sync_deletes),
        Commands::Version => {
            println!("WikiSync CLI v{}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
