//! Core type definitions for WikiSync.

use serde::Serialize;
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Unique identifier for a sync transaction.
///
/// Transaction IDs are opaque and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Allocates a fresh transaction ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the raw UUID value.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// One side of a diff: a single document in either store.
///
/// Two `FileRecord` collections exist per run, one per store, each keyed by
/// the normalized logical name so the two sides can be joined.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Logical name derived from the path (the join key).
    pub name: String,
    /// Concrete path within the owning store.
    pub path: String,
    /// Document text.
    pub content: String,
    /// Revision token (e.g. a remote content hash), if known.
    pub revision: Option<String>,
    /// Last modification time, if known.
    pub modified_at: Option<SystemTime>,
}

impl FileRecord {
    /// Creates a record with no revision or timestamp.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            content: content.into(),
            revision: None,
            modified_at: None,
        }
    }

    /// Sets the revision token.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Sets the modification time.
    #[must_use]
    pub fn with_modified_at(mut self, at: SystemTime) -> Self {
        self.modified_at = Some(at);
        self
    }
}

/// The kind of mutation a change represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    /// The document exists on one side only and should be created.
    Create,
    /// The document exists on both sides with differing content.
    Update,
    /// The document should be removed from the target side.
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Which store a change originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeOrigin {
    /// The folder-based document source.
    Primary,
    /// The companion wiki store.
    Secondary,
}

/// The direction a change is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncDirection {
    /// Applied against the secondary (wiki) store.
    PrimaryToSecondary,
    /// Applied against the primary (folder) store.
    SecondaryToPrimary,
}

/// A single unit of work produced by change detection.
///
/// Immutable once created. The constructors are the only way to build one
/// and fix the origin/direction pairing, so a change can never claim a
/// primary origin while flowing secondary→primary.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Mutation kind.
    pub kind: ChangeKind,
    /// Originating store.
    pub origin: ChangeOrigin,
    /// Apply direction.
    pub direction: SyncDirection,
    /// Logical name joining the two sides.
    pub name: String,
    /// Path to mutate in the target store.
    pub target_path: String,
    /// Content to write (creates and updates).
    pub new_content: Option<String>,
    /// Content currently on the target side (updates).
    pub old_content: Option<String>,
    /// Primary-side modification time, if known.
    pub primary_modified_at: Option<SystemTime>,
    /// Secondary-side modification time, if known.
    pub secondary_modified_at: Option<SystemTime>,
}

impl Change {
    /// A primary-only document to be created in the secondary store.
    pub fn create_to_secondary(
        name: impl Into<String>,
        target_path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: ChangeKind::Create,
            origin: ChangeOrigin::Primary,
            direction: SyncDirection::PrimaryToSecondary,
            name: name.into(),
            target_path: target_path.into(),
            new_content: Some(content.into()),
            old_content: None,
            primary_modified_at: None,
            secondary_modified_at: None,
        }
    }

    /// A document present on both sides with differing content.
    #[allow(clippy::too_many_arguments)]
    pub fn update_to_secondary(
        name: impl Into<String>,
        target_path: impl Into<String>,
        new_content: impl Into<String>,
        old_content: impl Into<String>,
        primary_modified_at: Option<SystemTime>,
        secondary_modified_at: Option<SystemTime>,
    ) -> Self {
        Self {
            kind: ChangeKind::Update,
            origin: ChangeOrigin::Primary,
            direction: SyncDirection::PrimaryToSecondary,
            name: name.into(),
            target_path: target_path.into(),
            new_content: Some(new_content.into()),
            old_content: Some(old_content.into()),
            primary_modified_at,
            secondary_modified_at,
        }
    }

    /// A secondary-only document to be re-created in the primary store.
    pub fn create_to_primary(
        name: impl Into<String>,
        target_path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: ChangeKind::Create,
            origin: ChangeOrigin::Secondary,
            direction: SyncDirection::SecondaryToPrimary,
            name: name.into(),
            target_path: target_path.into(),
            new_content: Some(content.into()),
            old_content: None,
            primary_modified_at: None,
            secondary_modified_at: None,
        }
    }

    /// A document absent from the primary store, to be pruned from the
    /// secondary store. Only emitted when delete-sync is enabled.
    pub fn delete_in_secondary(
        name: impl Into<String>,
        target_path: impl Into<String>,
        old_content: impl Into<String>,
    ) -> Self {
        Self {
            kind: ChangeKind::Delete,
            origin: ChangeOrigin::Primary,
            direction: SyncDirection::PrimaryToSecondary,
            name: name.into(),
            target_path: target_path.into(),
            new_content: None,
            old_content: Some(old_content.into()),
            primary_modified_at: None,
            secondary_modified_at: None,
        }
    }

    /// Converts this change into an audit record of its application.
    #[must_use]
    pub fn to_operation(&self) -> RecordedOperation {
        RecordedOperation {
            kind: self.kind,
            path: self.target_path.clone(),
            new_content: self.new_content.clone(),
            prior_content: self.old_content.clone(),
        }
    }
}

/// A record of an applied change, appended to the active transaction's
/// operation log. Used for audit/rollback bookkeeping only, never replayed
/// forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedOperation {
    /// Mutation kind.
    pub kind: ChangeKind,
    /// Path that was mutated.
    pub path: String,
    /// Content that was written, if any.
    pub new_content: Option<String>,
    /// Content that was replaced, if any.
    pub prior_content: Option<String>,
}

/// Policy selecting the surviving content for an update conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictStrategy {
    /// The primary-side content wins.
    PrimaryWins,
    /// The secondary-side content wins.
    SecondaryWins,
    /// The change is skipped and surfaced as a conflict condition.
    Skip,
    /// Logged for operator attention; primary content applied in the interim.
    Manual,
}

impl ConflictStrategy {
    /// Parses a strategy from its configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "primary-wins" => Some(ConflictStrategy::PrimaryWins),
            "secondary-wins" => Some(ConflictStrategy::SecondaryWins),
            "skip" => Some(ConflictStrategy::Skip),
            "manual" => Some(ConflictStrategy::Manual),
            _ => None,
        }
    }

    /// Returns the configuration name for this strategy.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ConflictStrategy::PrimaryWins => "primary-wins",
            ConflictStrategy::SecondaryWins => "secondary-wins",
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_are_unique() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("txn:"));
    }

    #[test]
    fn change_constructors_fix_direction() {
        let c = Change::create_to_secondary("home", "home.md", "# Home");
        assert_eq!(c.origin, ChangeOrigin::Primary);
        assert_eq!(c.direction, SyncDirection::PrimaryToSecondary);

        let c = Change::create_to_primary("orphan", "docs/orphan.md", "text");
        assert_eq!(c.origin, ChangeOrigin::Secondary);
        assert_eq!(c.direction, SyncDirection::SecondaryToPrimary);

        let c = Change::delete_in_secondary("gone", "gone.md", "old");
        assert_eq!(c.kind, ChangeKind::Delete);
        assert_eq!(c.direction, SyncDirection::PrimaryToSecondary);
    }

    #[test]
    fn update_carries_both_contents() {
        let c = Change::update_to_secondary("a", "a.md", "new", "old", None, None);
        assert_eq!(c.new_content.as_deref(), Some("new"));
        assert_eq!(c.old_content.as_deref(), Some("old"));
        assert_eq!(c.kind, ChangeKind::Update);
    }

    #[test]
    fn change_to_operation() {
        let c = Change::update_to_secondary("a", "a.md", "new", "old", None, None);
        let op = c.to_operation();
        assert_eq!(op.kind, ChangeKind::Update);
        assert_eq!(op.path, "a.md");
        assert_eq!(op.new_content.as_deref(), Some("new"));
        assert_eq!(op.prior_content.as_deref(), Some("old"));
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in [
            ConflictStrategy::PrimaryWins,
            ConflictStrategy::SecondaryWins,
            ConflictStrategy::Skip,
            ConflictStrategy::Manual,
        ] {
            assert_eq!(ConflictStrategy::from_name(strategy.name()), Some(strategy));
        }
        assert_eq!(ConflictStrategy::from_name("newest-wins"), None);
    }

    #[test]
    fn file_record_builder() {
        let r = FileRecord::new("guide", "docs/guide.md", "# Guide").with_revision("abc123");
        assert_eq!(r.name, "guide");
        assert_eq!(r.revision.as_deref(), Some("abc123"));
        assert!(r.modified_at.is_none());
    }
}
