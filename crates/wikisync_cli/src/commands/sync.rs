//! Sync command implementation.

use std::path::PathBuf;

use tracing::info;
use wikisync_core::ConflictStrategy;
use wikisync_engine::{SyncEngine, SyncOptions};
use wikisync_store::{DirRemoteStore, FsLocalStore};

/// Parsed arguments for the sync command.
pub struct SyncArgs {
    /// Markdown docs folder.
    pub docs: PathBuf,
    /// Primary remote repository root.
    pub remote: PathBuf,
    /// Companion wiki repository root.
    pub wiki: PathBuf,
    /// Scratch directory for the working copy.
    pub work_dir: Option<PathBuf>,
    /// Conflict strategy.
    pub strategy: ConflictStrategy,
    /// Delete wiki pages whose source document is gone.
    pub sync_deletes: bool,
    /// Tolerated failures before the run aborts.
    pub max_failures: usize,
    /// Abort on the first failed change.
    pub abort_on_error: bool,
    /// Commit message for wiki changes.
    pub message: String,
    /// Output format (text, json).
    pub format: String,
}

/// Runs one sync pass and prints the result. Returns whether it committed.
pub fn run(args: SyncArgs) -> Result<bool, Box<dyn std::error::Error>> {
    let work_dir = match args.work_dir {
        Some(dir) => dir,
        None => std::env::temp_dir().join("wikisync"),
    };

    let options = SyncOptions::new(&args.docs, work_dir)
        .with_strategy(args.strategy)
        .with_sync_deletes(args.sync_deletes)
        .with_continue_on_error(!args.abort_on_error)
        .with_max_failures(args.max_failures)
        .with_commit_message(&args.message);

    info!(
        docs = %args.docs.display(),
        wiki = %args.wiki.display(),
        strategy = %args.strategy,
        "starting sync"
    );
    let remote = DirRemoteStore::new(&args.remote, &args.wiki);
    let mut engine = SyncEngine::new(options, FsLocalStore::new(), remote);
    let result = engine.sync();

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("{}", result.summary);
            for error in &result.errors {
                match (&error.change, &error.phase) {
                    (Some(change), _) => println!("  change {change}: {}", error.error),
                    (_, Some(phase)) => println!("  phase {phase}: {}", error.error),
                    _ => println!("  {}", error.error),
                }
            }
            for line in &result.secondary_restoration_advisory {
                println!("  {line}");
            }
        }
    }

    Ok(result.success)
}
