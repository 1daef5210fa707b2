//! Sync orchestrator: change detection, conflict resolution, and the run
//! loop tying stores, transaction, breaker, and failure accounting together.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use wikisync_core::{Change, ChangeKind, ConflictStrategy, FileRecord, SyncError, SyncResult};
use wikisync_store::{logical_name_to_path, LocalStore, RemoteStore};

use crate::config::SyncOptions;
use crate::failure::PartialFailureHandler;
use crate::retry::{retry_with_backoff, CancelToken};
use crate::transaction::{Transaction, TransactionManager, TransactionStats};
use crate::CircuitBreaker;

/// One recorded error from a run, scoped to a change or a run phase.
#[derive(Debug, Clone, Serialize)]
pub struct RunError {
    /// Logical name of the change that failed, if change-scoped.
    pub change: Option<String>,
    /// Run phase that failed, if phase-scoped.
    pub phase: Option<String>,
    /// Rendered error.
    pub error: String,
}

impl RunError {
    fn for_change(change: &Change, error: &SyncError) -> Self {
        Self {
            change: Some(change.name.clone()),
            phase: None,
            error: error.to_string(),
        }
    }

    fn for_phase(phase: &str, error: &SyncError) -> Self {
        Self {
            change: None,
            phase: Some(phase.to_string()),
            error: error.to_string(),
        }
    }
}

/// The externally observable outcome of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Whether the run committed.
    pub success: bool,
    /// Changes applied before the run ended.
    pub changes_applied: usize,
    /// Change- and phase-scoped errors, in occurrence order.
    pub errors: Vec<RunError>,
    /// One-line human summary.
    pub summary: String,
    /// Secondary-side items a rollback could not restore automatically.
    pub secondary_restoration_advisory: Vec<String>,
}

/// Lifetime counters for an engine instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Runs that committed.
    pub runs_completed: u64,
    /// Total changes applied across runs.
    pub changes_applied: u64,
    /// Updates resolved under the conflict strategy.
    pub conflicts_resolved: u64,
    /// Rendered error that ended the most recent failed run.
    pub last_error: Option<String>,
}

/// Drives sync runs between a docs folder and its companion wiki store.
///
/// One engine owns one circuit breaker and one cancel token; both span
/// runs, so remote trouble in one run keeps the breaker open into the
/// next.
#[derive(Debug)]
pub struct SyncEngine<L: LocalStore, R: RemoteStore> {
    options: SyncOptions,
    local: L,
    remote: R,
    transactions: TransactionManager,
    breaker: CircuitBreaker,
    cancel: CancelToken,
    stats: SyncStats,
}

impl<L: LocalStore, R: RemoteStore> SyncEngine<L, R> {
    /// Creates an engine over the given stores.
    pub fn new(options: SyncOptions, local: L, remote: R) -> Self {
        let breaker = CircuitBreaker::new(options.breaker.clone());
        Self {
            options,
            local,
            remote,
            transactions: TransactionManager::new(),
            breaker,
            cancel: CancelToken::new(),
            stats: SyncStats::default(),
        }
    }

    /// Token observed between changes and retry attempts.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Lifetime run counters.
    #[must_use]
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// The remote store this engine drives.
    #[must_use]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The breaker guarding this engine's remote mutations.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Transaction lifecycle counters.
    #[must_use]
    pub fn transaction_stats(&self) -> TransactionStats {
        self.transactions.stats()
    }

    /// Runs one full synchronization pass.
    ///
    /// Clones the secondary store, checkpoints both sides, detects and
    /// applies changes in detection order, then commits and pushes. On
    /// failure the transaction is rolled back best-effort and the original
    /// error is reported, never the rollback's. The working copy is
    /// removed on every exit path.
    pub fn sync(&mut self) -> RunResult {
        let mut txn = self.transactions.begin();
        let mut errors: Vec<RunError> = Vec::new();
        let mut handler =
            PartialFailureHandler::new(self.options.continue_on_error, self.options.max_failures);
        let mut applied = 0usize;
        let mut working_copy: Option<PathBuf> = None;
        let mut advisory: Vec<String> = Vec::new();

        let outcome = self.run(&mut txn, &mut handler, &mut errors, &mut applied, &mut working_copy);

        let success = match outcome {
            Ok(()) => match self.transactions.commit(txn) {
                Ok(_) => true,
                Err(err) => {
                    errors.push(RunError::for_phase("commit", &err));
                    false
                }
            },
            Err((phase, err)) => {
                warn!(phase, error = %err, "sync run failed");
                errors.push(RunError::for_phase(phase, &err));
                if txn.is_pending() && !txn.checkpoints().is_empty() {
                    match self.transactions.rollback(txn, &self.remote) {
                        Ok(rollback) => {
                            for line in &rollback.failed {
                                warn!("restoration failed: {line}");
                            }
                            advisory = rollback.secondary_restoration_advisory;
                        }
                        Err(rollback_err) => {
                            warn!(error = %rollback_err, "rollback failed");
                        }
                    }
                }
                false
            }
        };

        if let Some(dir) = working_copy {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "working copy cleanup failed");
                }
            }
        }

        let summary = handler.summary();
        self.stats.changes_applied += applied as u64;
        if success {
            self.stats.runs_completed += 1;
        } else {
            self.stats.last_error = errors.last().map(|e| e.error.clone());
        }

        let summary_line = if success {
            format!(
                "synchronized: {applied} change(s) applied, {} failure(s) tolerated",
                summary.failed
            )
        } else {
            format!(
                "sync failed after {applied} change(s) applied, {} failure(s)",
                summary.failed
            )
        };
        info!(success, applied, failures = summary.failed, "sync run finished");

        RunResult {
            success,
            changes_applied: applied,
            errors,
            summary: summary_line,
            secondary_restoration_advisory: advisory,
        }
    }

    fn run(
        &mut self,
        txn: &mut Transaction,
        handler: &mut PartialFailureHandler,
        errors: &mut Vec<RunError>,
        applied: &mut usize,
        working_copy: &mut Option<PathBuf>,
    ) -> Result<(), (&'static str, SyncError)> {
        let clone_dest = self.options.work_dir.join(format!("wiki-{}", txn.id()));
        // Registered before cloning so a half-materialized copy is still
        // cleaned up.
        *working_copy = Some(clone_dest.clone());
        let copy = retry_with_backoff(&self.options.retry, Some(&self.cancel), || {
            self.remote.clone_secondary(&clone_dest)
        })
        .map_err(|e| ("clone", e))?;

        let mut primary = self
            .local
            .list_markdown_files(&self.options.docs_dir)
            .map_err(|e| ("snapshot", e))?;
        // Revisions are needed for rollback; a file the remote does not
        // know yet simply has none, which means "always restore".
        for record in &mut primary {
            match self.remote.get_file(&record.path) {
                Ok(file) => record.revision = Some(file.revision),
                Err(err) => {
                    debug!(path = %record.path, error = %err, "no revision recorded");
                }
            }
        }
        let secondary = self
            .local
            .list_markdown_files(&copy)
            .map_err(|e| ("snapshot", e))?;

        self.transactions
            .checkpoint(txn, primary.clone(), secondary.clone())
            .map_err(|e| ("checkpoint", e))?;

        let changes = detect_changes(
            &primary,
            &secondary,
            &self.options.docs_dir,
            self.options.sync_deletes,
        );
        info!(changes = changes.len(), "change detection complete");

        for change in &changes {
            if self.cancel.is_cancelled() {
                return Err(("apply", SyncError::aborted("sync run cancelled")));
            }
            debug!(kind = %change.kind, name = %change.name, "applying change");

            match self.apply_change(change, &copy) {
                Ok(()) => {
                    self.transactions
                        .record_operation(txn, change.to_operation())
                        .map_err(|e| ("apply", e))?;
                    handler.record_success(change.to_operation());
                    *applied += 1;
                    if change.kind == ChangeKind::Update {
                        self.stats.conflicts_resolved += 1;
                    }
                }
                Err(err) => {
                    errors.push(RunError::for_change(change, &err));
                    if err.is_fatal() {
                        return Err(("apply", err));
                    }
                    handler
                        .record_failure(change.to_operation(), &err)
                        .map_err(|e| ("apply", e))?;
                    if !handler.should_continue() {
                        return Err(("apply", err));
                    }
                }
            }
        }

        if *applied > 0 {
            let message = self.options.commit_message.clone();
            retry_with_backoff(&self.options.retry, Some(&self.cancel), || {
                self.remote.commit_secondary(&copy, &message)
            })
            .map_err(|e| ("commit-secondary", e))?;
            retry_with_backoff(&self.options.retry, Some(&self.cancel), || {
                self.remote.push_secondary(&copy)
            })
            .map_err(|e| ("push", e))?;
        }

        Ok(())
    }

    // Every apply step runs through the breaker, so once it opens the
    // remaining changes fail fast regardless of which store they touch.
    fn apply_change(&self, change: &Change, working_copy: &Path) -> SyncResult<()> {
        self.breaker.execute(|| match change.kind {
            ChangeKind::Create if change.origin == wikisync_core::ChangeOrigin::Secondary => {
                let content = require_content(change)?;
                self.remote
                    .create_file(&change.target_path, content, &self.options.commit_message)?;
                // Mirror into the docs folder so the next run sees the file
                // on disk and does not re-emit it.
                self.local
                    .write(&self.options.docs_dir.join(&change.target_path), content)
            }
            ChangeKind::Create => {
                let content = require_content(change)?;
                self.local
                    .write(&working_copy.join(&change.target_path), content)
            }
            ChangeKind::Update => {
                let content = resolve_conflict(self.options.strategy, change)?;
                self.local
                    .write(&working_copy.join(&change.target_path), &content)
            }
            ChangeKind::Delete => {
                self.local
                    .delete(working_copy, &working_copy.join(&change.target_path))
            }
        })
    }
}

fn require_content(change: &Change) -> SyncResult<&str> {
    change
        .new_content
        .as_deref()
        .ok_or_else(|| SyncError::validation("change carries no content"))
}

fn secondary_page_file(name: &str) -> String {
    format!("{name}.md")
}

fn unix_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Computes the change list between a primary snapshot and a secondary
/// snapshot.
///
/// Phase order is fixed and the output follows it: primary-only creates,
/// then content-differing updates, then secondary-only creates back to the
/// primary, then (with delete-sync) secondary-only deletes. Under
/// delete-sync a secondary-only entry is emitted twice, once as a create
/// toward the primary and once as a delete in the secondary.
#[must_use]
pub fn detect_changes(
    primary: &[FileRecord],
    secondary: &[FileRecord],
    docs_dir: &Path,
    sync_deletes: bool,
) -> Vec<Change> {
    let primary_by_name: BTreeMap<&str, &FileRecord> =
        primary.iter().map(|r| (r.name.as_str(), r)).collect();
    let secondary_by_name: BTreeMap<&str, &FileRecord> =
        secondary.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut changes = Vec::new();

    for (name, record) in &primary_by_name {
        if !secondary_by_name.contains_key(name) {
            changes.push(Change::create_to_secondary(
                *name,
                secondary_page_file(name),
                record.content.clone(),
            ));
        }
    }

    for (name, record) in &primary_by_name {
        if let Some(page) = secondary_by_name.get(name) {
            if record.content != page.content {
                changes.push(Change::update_to_secondary(
                    *name,
                    secondary_page_file(name),
                    record.content.clone(),
                    page.content.clone(),
                    record.modified_at,
                    page.modified_at,
                ));
            }
        }
    }

    for (name, page) in &secondary_by_name {
        if primary_by_name.contains_key(name) {
            continue;
        }
        if !logical_name_to_path(name, Some(docs_dir)).exists() {
            changes.push(Change::create_to_primary(
                *name,
                unix_path(&logical_name_to_path(name, None)),
                page.content.clone(),
            ));
        }
    }

    if sync_deletes {
        for (name, page) in &secondary_by_name {
            if !primary_by_name.contains_key(name) {
                changes.push(Change::delete_in_secondary(
                    *name,
                    secondary_page_file(name),
                    page.content.clone(),
                ));
            }
        }
    }

    changes
}

/// Picks the winning content for an update under the given strategy.
///
/// `Skip` refuses the change outright, so the write never happens and the
/// skip is accounted like any other apply failure. `Manual` has no review
/// channel yet and falls back to the primary side with a warning.
pub fn resolve_conflict(strategy: ConflictStrategy, change: &Change) -> SyncResult<String> {
    let primary_content = require_content(change)?.to_string();
    match strategy {
        ConflictStrategy::PrimaryWins => Ok(primary_content),
        ConflictStrategy::SecondaryWins => {
            Ok(change.old_content.clone().unwrap_or(primary_content))
        }
        ConflictStrategy::Skip => Err(SyncError::ConflictSkipped {
            name: change.name.clone(),
        }),
        ConflictStrategy::Manual => {
            warn!(name = %change.name, "conflict needs manual review, keeping primary content");
            Ok(primary_content)
        }
    }
}
