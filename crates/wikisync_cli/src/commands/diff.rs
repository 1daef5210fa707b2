//! Diff command implementation.

use std::path::Path;

use wikisync_engine::detect_changes;
use wikisync_store::{FsLocalStore, LocalStore};

/// Prints the changes a sync would apply. Returns true unconditionally;
/// a non-empty diff is not a failure.
pub fn run(
    docs: &Path,
    wiki: &Path,
    sync_deletes: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let local = FsLocalStore::new();
    let primary = local.list_markdown_files(docs)?;
    let secondary = local.list_markdown_files(wiki)?;

    let changes = detect_changes(&primary, &secondary, docs, sync_deletes);
    if changes.is_empty() {
        println!("in sync, nothing to apply");
        return Ok(true);
    }

    for change in &changes {
        println!("{} {} -> {}", change.kind, change.name, change.target_path);
    }
    println!("{} change(s) pending", changes.len());
    Ok(true)
}
