//! End-to-end runs over a real docs folder and an in-memory remote.

use std::fs;
use std::path::Path;
use std::time::Duration;

use proptest::prelude::*;
use tempfile::TempDir;
use wikisync_core::{ConflictStrategy, FileRecord, RemoteFailure};
use wikisync_engine::{
    detect_changes, BreakerConfig, CircuitState, RetryConfig, SyncEngine, SyncOptions,
};
use wikisync_store::{FsLocalStore, MemoryRemoteStore};

fn write_doc(docs: &Path, rel: &str, content: &str) {
    let path = docs.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn options(docs: &Path, work: &Path) -> SyncOptions {
    SyncOptions::new(docs, work).with_retry(RetryConfig::no_retry())
}

fn engine(
    opts: SyncOptions,
    remote: MemoryRemoteStore,
) -> SyncEngine<FsLocalStore, MemoryRemoteStore> {
    SyncEngine::new(opts, FsLocalStore::new(), remote)
}

#[test]
fn happy_path_creates_and_updates_pages() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "home.md", "# Home v2");
    write_doc(docs.path(), "guides/setup.md", "# Setup");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("home.md", "# Home v1");

    let mut engine = engine(options(docs.path(), work.path()), remote);
    let result = engine.sync();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.changes_applied, 2);
    assert!(result.errors.is_empty());

    let pages = engine.remote().secondary_pages();
    assert_eq!(pages["home.md"], "# Home v2");
    assert_eq!(pages["guides:setup.md"], "# Setup");
    assert_eq!(engine.remote().push_count(), 1);
    assert_eq!(
        engine.remote().commit_messages(),
        vec!["Sync documentation".to_string()]
    );
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
}

#[test]
fn second_run_applies_nothing() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "home.md", "# Home");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("extra.md", "from wiki");

    let mut engine = engine(options(docs.path(), work.path()), remote);

    let first = engine.sync();
    assert!(first.success);
    assert_eq!(first.changes_applied, 2);

    let second = engine.sync();
    assert!(second.success);
    assert_eq!(second.changes_applied, 0, "errors: {:?}", second.errors);
    // No secondary commit happens on a no-op run.
    assert_eq!(engine.remote().commit_messages().len(), 1);
}

#[test]
fn secondary_only_page_is_mirrored_into_docs_and_primary() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("guides:setup.md", "# Setup");

    let mut engine = engine(options(docs.path(), work.path()), remote);
    let result = engine.sync();

    assert!(result.success);
    assert_eq!(result.changes_applied, 1);
    assert_eq!(
        fs::read_to_string(docs.path().join("guides/setup.md")).unwrap(),
        "# Setup"
    );
    assert_eq!(
        engine.remote().primary_file("guides/setup.md").unwrap().content,
        "# Setup"
    );
}

#[test]
fn delete_sync_both_recreates_and_prunes_a_secondary_only_page() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("orphan.md", "orphaned");

    let mut engine = engine(
        options(docs.path(), work.path()).with_sync_deletes(true),
        remote,
    );
    let result = engine.sync();

    assert!(result.success);
    assert_eq!(result.changes_applied, 2);
    // Recreated on the primary side...
    assert!(docs.path().join("orphan.md").exists());
    assert!(engine.remote().primary_file("orphan.md").is_some());
    // ...and pruned from the secondary store.
    assert!(!engine.remote().secondary_pages().contains_key("orphan.md"));
}

#[test]
fn secondary_wins_keeps_the_wiki_content() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "page.md", "primary");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("page.md", "secondary");

    let mut engine = engine(
        options(docs.path(), work.path()).with_strategy(ConflictStrategy::SecondaryWins),
        remote,
    );
    let result = engine.sync();

    assert!(result.success);
    assert_eq!(engine.remote().secondary_pages()["page.md"], "secondary");
}

#[test]
fn skip_strategy_never_writes() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "page.md", "primary");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("page.md", "secondary");

    let mut engine = engine(
        options(docs.path(), work.path()).with_strategy(ConflictStrategy::Skip),
        remote,
    );
    let result = engine.sync();

    // The skip is tolerated under the default failure budget, but nothing
    // was applied so the secondary store is never committed.
    assert!(result.success);
    assert_eq!(result.changes_applied, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(engine.remote().commit_messages().is_empty());
    assert_eq!(engine.remote().secondary_pages()["page.md"], "secondary");
}

#[test]
fn fatal_error_aborts_and_rolls_back_the_primary_side() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "a.md", "v1");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("z.md", "from wiki");
    // The page's re-creation on the primary is rejected as unauthorized,
    // which is fatal and aborts the run.
    remote.push_failure("create_file", RemoteFailure::status(401, "unauthorized"));

    let mut engine = engine(options(docs.path(), work.path()), remote);
    let result = engine.sync();

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.change.as_deref() == Some("z")));
    assert!(result.errors.iter().any(|e| e.phase.as_deref() == Some("apply")));
    // a.md had no remote revision at checkpoint time, so rollback restores
    // it unconditionally.
    assert_eq!(engine.remote().primary_file("a.md").unwrap().content, "v1");
    // The aborted run never commits the secondary store.
    assert!(engine.remote().commit_messages().is_empty());
    assert_eq!(
        result.secondary_restoration_advisory.len(),
        1,
        "advisory: {:?}",
        result.secondary_restoration_advisory
    );
    assert!(result.secondary_restoration_advisory[0].contains("z.md"));
}

#[test]
fn failure_threshold_aborts_the_run() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "a.md", "primary-a");
    write_doc(docs.path(), "b.md", "primary-b");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("a.md", "wiki-a");
    remote.insert_secondary("b.md", "wiki-b");

    let mut engine = engine(
        options(docs.path(), work.path())
            .with_strategy(ConflictStrategy::Skip)
            .with_max_failures(0),
        remote,
    );
    let result = engine.sync();

    assert!(!result.success);
    assert!(result
        .errors
        .iter()
        .any(|e| e.error.contains("failure threshold")));
    assert!(engine.remote().commit_messages().is_empty());
}

#[test]
fn abort_on_first_error_stops_before_later_changes() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "a.md", "primary-a");
    write_doc(docs.path(), "b.md", "primary-b");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("a.md", "wiki-a");
    remote.insert_secondary("b.md", "wiki-b");

    let mut engine = engine(
        options(docs.path(), work.path())
            .with_strategy(ConflictStrategy::Skip)
            .with_continue_on_error(false),
        remote,
    );
    let result = engine.sync();

    assert!(!result.success);
    // Only the first conflict is ever looked at.
    let change_errors: Vec<_> = result.errors.iter().filter(|e| e.change.is_some()).collect();
    assert_eq!(change_errors.len(), 1);
    assert_eq!(change_errors[0].change.as_deref(), Some("a"));
}

#[test]
fn working_copy_is_removed_after_a_failed_run() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "page.md", "primary");

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("page.md", "secondary");

    let mut engine = engine(
        options(docs.path(), work.path())
            .with_strategy(ConflictStrategy::Skip)
            .with_max_failures(0),
        remote,
    );

    let failed = engine.sync();
    assert!(!failed.success);
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
}

#[test]
fn open_breaker_short_circuits_later_remote_creates() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("a.md", "a");
    remote.insert_secondary("b.md", "b");
    remote.push_failure("create_file", RemoteFailure::message("network unreachable"));
    remote.push_failure("create_file", RemoteFailure::message("network unreachable"));

    let mut engine = engine(
        options(docs.path(), work.path())
            .with_breaker(BreakerConfig::new(1, Duration::from_secs(300)))
            .with_max_failures(10),
        remote,
    );
    let result = engine.sync();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.changes_applied, 0);
    assert_eq!(engine.breaker().state(), CircuitState::Open);
    // The second create never reaches the remote.
    assert_eq!(engine.remote().call_count("create_file"), 1);
}

#[test]
fn open_breaker_fails_remaining_local_applies_fast() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("a.md", "a");
    remote.insert_secondary("b.md", "b");
    remote.push_failure("create_file", RemoteFailure::message("network unreachable"));

    // Four changes: two creates toward the primary, then two delete-sync
    // prunes. The first create opens the breaker; everything after must
    // fail fast, including the purely local deletes.
    let mut engine = engine(
        options(docs.path(), work.path())
            .with_sync_deletes(true)
            .with_breaker(BreakerConfig::new(1, Duration::from_secs(300)))
            .with_max_failures(10),
        remote,
    );
    let result = engine.sync();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.changes_applied, 0);
    assert_eq!(result.errors.len(), 4);
    assert!(result
        .errors
        .iter()
        .skip(1)
        .all(|e| e.error.contains("circuit breaker is open")));
    assert_eq!(engine.breaker().state(), CircuitState::Open);
    assert_eq!(engine.remote().call_count("create_file"), 1);
    // Nothing applied, so the wiki is never committed and keeps its pages.
    assert!(engine.remote().commit_messages().is_empty());
    assert_eq!(engine.remote().secondary_pages().len(), 2);
}

#[test]
fn delete_sync_that_empties_the_wiki_still_commits() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let remote = MemoryRemoteStore::new();
    remote.insert_secondary("only.md", "last page");

    let mut engine = engine(
        options(docs.path(), work.path()).with_sync_deletes(true),
        remote,
    );
    let result = engine.sync();

    // Deleting the last page empties the working copy but must not remove
    // it; the commit still reads it back as an empty page set.
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.changes_applied, 2);
    assert!(engine.remote().secondary_pages().is_empty());
    assert_eq!(engine.remote().commit_messages().len(), 1);
    assert!(docs.path().join("only.md").exists());
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
}

#[test]
fn failed_clone_leaves_no_working_copy() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "page.md", "content");

    let remote = MemoryRemoteStore::new();
    remote.push_failure("clone", RemoteFailure::message("network timeout"));

    let mut engine = engine(options(docs.path(), work.path()), remote);
    let result = engine.sync();

    assert!(!result.success);
    assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
}

#[test]
fn transient_clone_failure_is_retried() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_doc(docs.path(), "page.md", "content");

    let remote = MemoryRemoteStore::new();
    remote.push_failure("clone", RemoteFailure::message("network timeout"));

    let retry = RetryConfig::new(3).with_base_delay(Duration::from_millis(1));
    let mut engine = engine(
        options(docs.path(), work.path()).with_retry(retry),
        remote,
    );
    let result = engine.sync();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(engine.remote().call_count("clone"), 2);
}

#[test]
fn cancelled_engine_fails_without_cloning() {
    let docs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let remote = MemoryRemoteStore::new();
    let mut engine = engine(options(docs.path(), work.path()), remote);
    engine.cancel_token().cancel();

    let result = engine.sync();
    assert!(!result.success);
    assert_eq!(engine.remote().call_count("clone"), 0);
}

proptest! {
    #[test]
    fn change_count_is_primary_only_plus_twice_secondary_only(
        primary_only in prop::collection::btree_set("p_[a-z]{1,8}", 0..8),
        secondary_only in prop::collection::btree_set("s_[a-z]{1,8}", 0..8),
    ) {
        let docs = TempDir::new().unwrap();
        let primary: Vec<FileRecord> = primary_only
            .iter()
            .map(|n| FileRecord::new(n.clone(), format!("{n}.md"), "x"))
            .collect();
        let secondary: Vec<FileRecord> = secondary_only
            .iter()
            .map(|n| FileRecord::new(n.clone(), format!("{n}.md"), "y"))
            .collect();

        let changes = detect_changes(&primary, &secondary, docs.path(), true);
        prop_assert_eq!(changes.len(), primary_only.len() + 2 * secondary_only.len());
    }
}
