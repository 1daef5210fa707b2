//! Sync transaction lifecycle: begin → checkpoint → record → commit | rollback.
//!
//! A [`Transaction`] is an owned value. `commit` and `rollback` consume it,
//! so reusing a terminated transaction or nesting two runs over one
//! transaction is a compile error rather than a runtime race.

use std::time::SystemTime;
use tracing::{info, warn};
use wikisync_core::{
    checkpoint_fingerprint, ErrorCategory, FileRecord, RecordedOperation, SyncError, SyncResult,
    TransactionId,
};
use wikisync_store::RemoteStore;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting checkpoints and operations.
    Pending,
    /// Terminated by commit.
    Committed,
    /// Terminated by rollback.
    RolledBack,
}

/// A snapshot of both stores taken at a point in the run.
///
/// The first checkpoint of a transaction is the pre-run baseline and the
/// only one ever used for rollback; later checkpoints are informational.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// When the snapshot was taken.
    pub taken_at: SystemTime,
    /// Primary-side records at snapshot time.
    pub primary: Vec<FileRecord>,
    /// Secondary-side records at snapshot time.
    pub secondary: Vec<FileRecord>,
    /// Content-derived digest identifying the snapshot.
    pub fingerprint: String,
}

/// One sync run's transaction.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    operations: Vec<RecordedOperation>,
    status: TransactionStatus,
    checkpoints: Vec<Checkpoint>,
}

impl Transaction {
    /// Opaque unique identifier.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Applied-operation log, in application order.
    #[must_use]
    pub fn operations(&self) -> &[RecordedOperation] {
        &self.operations
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Recorded checkpoints, oldest first.
    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Whether the transaction is still accepting appends.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    fn require_pending(&self) -> SyncResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(SyncError::TransactionNotPending)
        }
    }
}

/// Result of a rollback.
#[derive(Debug)]
pub struct RollbackOutcome {
    /// The terminated transaction.
    pub transaction: Transaction,
    /// Primary-side files restored to their checkpoint state.
    pub restored: usize,
    /// Paths whose restoration failed, with the rendered error.
    pub failed: Vec<String>,
    /// Secondary-side items that would need manual restoration.
    ///
    /// The manager never mutates the secondary store on rollback; this
    /// advisory is the explicit record of that scope limit.
    pub secondary_restoration_advisory: Vec<String>,
}

/// Lifetime counters for a manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionStats {
    /// Transactions begun.
    pub begun: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions rolled back.
    pub rolled_back: u64,
}

/// Owns the transaction lifecycle for sync runs.
#[derive(Debug, Default)]
pub struct TransactionManager {
    stats: TransactionStats,
}

impl TransactionManager {
    /// Creates a manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> TransactionStats {
        self.stats
    }

    /// Begins a new transaction with a fresh id and empty logs.
    pub fn begin(&mut self) -> Transaction {
        self.stats.begun += 1;
        let txn = Transaction {
            id: TransactionId::new(),
            operations: Vec::new(),
            status: TransactionStatus::Pending,
            checkpoints: Vec::new(),
        };
        info!(id = %txn.id, "transaction started");
        txn
    }

    /// Snapshots both sides into a checkpoint appended to the transaction.
    pub fn checkpoint(
        &self,
        txn: &mut Transaction,
        primary: Vec<FileRecord>,
        secondary: Vec<FileRecord>,
    ) -> SyncResult<Checkpoint> {
        txn.require_pending()?;

        let checkpoint = Checkpoint {
            taken_at: SystemTime::now(),
            fingerprint: checkpoint_fingerprint(&primary, &secondary),
            primary,
            secondary,
        };
        txn.checkpoints.push(checkpoint.clone());
        Ok(checkpoint)
    }

    /// Appends an applied operation to the transaction's log.
    pub fn record_operation(
        &self,
        txn: &mut Transaction,
        operation: RecordedOperation,
    ) -> SyncResult<()> {
        txn.require_pending()?;
        txn.operations.push(operation);
        Ok(())
    }

    /// Commits the transaction. Bookkeeping only: remote state is not
    /// re-verified.
    pub fn commit(&mut self, mut txn: Transaction) -> SyncResult<Transaction> {
        txn.require_pending()?;
        txn.status = TransactionStatus::Committed;
        self.stats.committed += 1;
        info!(id = %txn.id, operations = txn.operations.len(), "transaction committed");
        Ok(txn)
    }

    /// Rolls the transaction back by replaying the first checkpoint's
    /// primary snapshot against the remote store.
    ///
    /// For each recorded primary file: a differing current revision is
    /// overwritten with the checkpoint content under the current revision
    /// token; an absent file is recreated; a matching revision is left
    /// alone. Individual restoration failures are logged and collected but
    /// do not abort the rest. The secondary side is never mutated; its
    /// records become the restoration advisory.
    pub fn rollback(
        &mut self,
        mut txn: Transaction,
        remote: &dyn RemoteStore,
    ) -> SyncResult<RollbackOutcome> {
        txn.require_pending()?;
        let baseline = txn
            .checkpoints
            .first()
            .cloned()
            .ok_or(SyncError::NoCheckpointAvailable)?;

        warn!(id = %txn.id, "rolling back sync transaction");
        let message = format!("Rollback sync transaction {}", txn.id);

        let mut restored = 0usize;
        let mut failed = Vec::new();

        for record in &baseline.primary {
            let outcome = match remote.get_file(&record.path) {
                Ok(current) => {
                    if record.revision.as_deref() == Some(current.revision.as_str()) {
                        continue;
                    }
                    remote.update_file(&record.path, &record.content, &current.revision, &message)
                }
                Err(err) if err.context().category == ErrorCategory::NotFound => {
                    remote.create_file(&record.path, &record.content, &message)
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => restored += 1,
                Err(err) => {
                    warn!(path = %record.path, error = %err, "restoration failed");
                    failed.push(format!("{}: {err}", record.path));
                }
            }
        }

        let advisory: Vec<String> = baseline
            .secondary
            .iter()
            .map(|record| format!("secondary item requires manual restoration: {}", record.path))
            .collect();
        for line in &advisory {
            warn!("{line}");
        }

        txn.status = TransactionStatus::RolledBack;
        self.stats.rolled_back += 1;

        Ok(RollbackOutcome {
            transaction: txn,
            restored,
            failed,
            secondary_restoration_advisory: advisory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikisync_core::{ChangeKind, RemoteFailure};
    use wikisync_store::MemoryRemoteStore;

    fn op(path: &str) -> RecordedOperation {
        RecordedOperation {
            kind: ChangeKind::Create,
            path: path.to_string(),
            new_content: Some("x".into()),
            prior_content: None,
        }
    }

    #[test]
    fn begin_creates_pending_transaction() {
        let mut tm = TransactionManager::new();
        let txn = tm.begin();
        assert!(txn.is_pending());
        assert!(txn.operations().is_empty());
        assert!(txn.checkpoints().is_empty());
        assert_eq!(tm.stats().begun, 1);
    }

    #[test]
    fn transaction_ids_differ_per_begin() {
        let mut tm = TransactionManager::new();
        let a = tm.begin();
        let b = tm.begin();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn commit_terminates_and_refuses_appends() {
        let mut tm = TransactionManager::new();
        let mut txn = tm.begin();
        tm.record_operation(&mut txn, op("a.md")).unwrap();

        let mut committed = tm.commit(txn).unwrap();
        assert_eq!(committed.status(), TransactionStatus::Committed);
        assert_eq!(tm.stats().committed, 1);

        assert!(matches!(
            tm.record_operation(&mut committed, op("b.md")),
            Err(SyncError::TransactionNotPending)
        ));
        assert!(matches!(
            tm.checkpoint(&mut committed, vec![], vec![]),
            Err(SyncError::TransactionNotPending)
        ));
    }

    #[test]
    fn rollback_without_checkpoint_fails() {
        let mut tm = TransactionManager::new();
        let txn = tm.begin();
        let remote = MemoryRemoteStore::new();

        let result = tm.rollback(txn, &remote);
        assert!(matches!(result, Err(SyncError::NoCheckpointAvailable)));
    }

    #[test]
    fn rollback_overwrites_changed_file() {
        let mut tm = TransactionManager::new();
        let remote = MemoryRemoteStore::new();

        remote.insert_primary("docs/f.md", "c1");
        let r1 = remote.primary_file("docs/f.md").unwrap().revision;

        let mut txn = tm.begin();
        let snapshot =
            vec![FileRecord::new("f", "docs/f.md", "c1").with_revision(r1.clone())];
        tm.checkpoint(&mut txn, snapshot, vec![]).unwrap();

        // Remote moves on to a different revision.
        remote.update_file("docs/f.md", "c2", &r1, "drift").unwrap();

        let outcome = tm.rollback(txn, &remote).unwrap();
        assert_eq!(outcome.restored, 1);
        assert_eq!(
            outcome.transaction.status(),
            TransactionStatus::RolledBack
        );
        assert_eq!(remote.primary_file("docs/f.md").unwrap().content, "c1");
    }

    #[test]
    fn rollback_recreates_deleted_file() {
        let mut tm = TransactionManager::new();
        let remote = MemoryRemoteStore::new();

        remote.insert_primary("docs/f.md", "c1");
        let r1 = remote.primary_file("docs/f.md").unwrap().revision;

        let mut txn = tm.begin();
        let snapshot =
            vec![FileRecord::new("f", "docs/f.md", "c1").with_revision(r1.clone())];
        tm.checkpoint(&mut txn, snapshot, vec![]).unwrap();

        remote.delete_file("docs/f.md", &r1, "drift").unwrap();

        let outcome = tm.rollback(txn, &remote).unwrap();
        assert_eq!(outcome.restored, 1);
        assert_eq!(remote.primary_file("docs/f.md").unwrap().content, "c1");
    }

    #[test]
    fn rollback_skips_unchanged_file() {
        let mut tm = TransactionManager::new();
        let remote = MemoryRemoteStore::new();

        remote.insert_primary("docs/f.md", "c1");
        let r1 = remote.primary_file("docs/f.md").unwrap().revision;

        let mut txn = tm.begin();
        let snapshot = vec![FileRecord::new("f", "docs/f.md", "c1").with_revision(r1)];
        tm.checkpoint(&mut txn, snapshot, vec![]).unwrap();

        let outcome = tm.rollback(txn, &remote).unwrap();
        assert_eq!(outcome.restored, 0);
        assert_eq!(remote.call_count("update_file"), 0);
        assert_eq!(remote.call_count("create_file"), 0);
    }

    #[test]
    fn rollback_is_best_effort_per_file() {
        let mut tm = TransactionManager::new();
        let remote = MemoryRemoteStore::new();

        remote.insert_primary("docs/a.md", "a1");
        remote.insert_primary("docs/b.md", "b1");
        let ra = remote.primary_file("docs/a.md").unwrap().revision;
        let rb = remote.primary_file("docs/b.md").unwrap().revision;

        let mut txn = tm.begin();
        let snapshot = vec![
            FileRecord::new("a", "docs/a.md", "a1").with_revision(ra.clone()),
            FileRecord::new("b", "docs/b.md", "b1").with_revision(rb.clone()),
        ];
        tm.checkpoint(&mut txn, snapshot, vec![]).unwrap();

        remote.update_file("docs/a.md", "a2", &ra, "drift").unwrap();
        remote.update_file("docs/b.md", "b2", &rb, "drift").unwrap();
        // First get fails with a transient error; the second file is still
        // restored.
        remote.push_failure("get_file", RemoteFailure::message("network blip"));

        let outcome = tm.rollback(txn, &remote).unwrap();
        assert_eq!(outcome.restored, 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(remote.primary_file("docs/b.md").unwrap().content, "b1");
    }

    #[test]
    fn rollback_reports_secondary_advisory_without_mutating() {
        let mut tm = TransactionManager::new();
        let remote = MemoryRemoteStore::new();
        remote.insert_secondary("home.md", "# Home");

        let mut txn = tm.begin();
        let secondary = vec![FileRecord::new("home", "home.md", "# Home")];
        tm.checkpoint(&mut txn, vec![], secondary).unwrap();

        let outcome = tm.rollback(txn, &remote).unwrap();
        assert_eq!(outcome.secondary_restoration_advisory.len(), 1);
        assert!(outcome.secondary_restoration_advisory[0].contains("home.md"));
        assert_eq!(remote.secondary_pages()["home.md"], "# Home");
        assert_eq!(tm.stats().rolled_back, 1);
    }

    #[test]
    fn first_checkpoint_is_the_rollback_baseline() {
        let mut tm = TransactionManager::new();
        let remote = MemoryRemoteStore::new();

        remote.insert_primary("docs/f.md", "baseline");
        let r1 = remote.primary_file("docs/f.md").unwrap().revision;

        let mut txn = tm.begin();
        tm.checkpoint(
            &mut txn,
            vec![FileRecord::new("f", "docs/f.md", "baseline").with_revision(r1.clone())],
            vec![],
        )
        .unwrap();
        // A later, informational checkpoint with different content.
        tm.checkpoint(
            &mut txn,
            vec![FileRecord::new("f", "docs/f.md", "later").with_revision("other")],
            vec![],
        )
        .unwrap();

        remote.update_file("docs/f.md", "drifted", &r1, "drift").unwrap();

        tm.rollback(txn, &remote).unwrap();
        assert_eq!(
            remote.primary_file("docs/f.md").unwrap().content,
            "baseline"
        );
    }

    #[test]
    fn checkpoint_fingerprints_differ_across_state() {
        let mut tm = TransactionManager::new();
        let mut txn = tm.begin();

        let cp1 = tm
            .checkpoint(&mut txn, vec![FileRecord::new("a", "a.md", "1")], vec![])
            .unwrap();
        let cp2 = tm
            .checkpoint(&mut txn, vec![FileRecord::new("a", "a.md", "2")], vec![])
            .unwrap();
        assert_ne!(cp1.fingerprint, cp2.fingerprint);
    }
}
