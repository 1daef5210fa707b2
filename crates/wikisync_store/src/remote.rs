//! Remote repository store: the primary repository's file API plus the
//! secondary (wiki) repository's clone/commit/push cycle.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use wikisync_core::{content_revision, RemoteFailure, SyncResult};

/// A file fetched from the remote repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Document text.
    pub content: String,
    /// Revision token guarding concurrent updates.
    pub revision: String,
}

impl RemoteFile {
    /// Creates a file whose revision is derived from its content.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let revision = content_revision(&content);
        Self { content, revision }
    }
}

/// Network-facing contract the sync engine depends on.
///
/// The file operations address the primary repository; the
/// clone/commit/push trio addresses the secondary (wiki) repository.
///
/// # Implementors
///
/// - [`MemoryRemoteStore`] - in-memory, with scripted failures, for tests
/// - [`DirRemoteStore`] - directory-backed, for offline use and the CLI
pub trait RemoteStore: Send + Sync {
    /// Fetches a file; fails with a not-found failure if absent.
    fn get_file(&self, path: &str) -> SyncResult<RemoteFile>;

    /// Creates a file that must not already exist.
    fn create_file(&self, path: &str, content: &str, message: &str) -> SyncResult<()>;

    /// Replaces a file's content; `revision` must match the current token.
    fn update_file(&self, path: &str, content: &str, revision: &str, message: &str)
        -> SyncResult<()>;

    /// Deletes a file; `revision` must match the current token.
    fn delete_file(&self, path: &str, revision: &str, message: &str) -> SyncResult<()>;

    /// Materializes a working copy of the secondary store at `destination`.
    fn clone_secondary(&self, destination: &Path) -> SyncResult<PathBuf>;

    /// Records the working copy's state as a commit on the secondary store.
    fn commit_secondary(&self, working_copy: &Path, message: &str) -> SyncResult<()>;

    /// Publishes committed secondary changes.
    fn push_secondary(&self, working_copy: &Path) -> SyncResult<()>;
}

/// In-memory remote store with scripted failure injection.
///
/// Failures are queued per operation name (`"get_file"`, `"create_file"`,
/// `"update_file"`, `"delete_file"`, `"clone"`, `"commit"`, `"push"`) and
/// consumed one per call, so a test can fail the first N attempts of a
/// specific operation and let later attempts succeed.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    primary: RwLock<BTreeMap<String, RemoteFile>>,
    secondary: RwLock<BTreeMap<String, String>>,
    failures: Mutex<HashMap<String, VecDeque<RemoteFailure>>>,
    calls: Mutex<BTreeMap<String, usize>>,
    commits: Mutex<Vec<String>>,
    pushes: Mutex<usize>,
}

impl MemoryRemoteStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a primary-repository file.
    pub fn insert_primary(&self, path: impl Into<String>, content: impl Into<String>) {
        self.primary
            .write()
            .insert(path.into(), RemoteFile::new(content));
    }

    /// Seeds a secondary (wiki) page, keyed by its flat file name.
    pub fn insert_secondary(&self, file_name: impl Into<String>, content: impl Into<String>) {
        self.secondary.write().insert(file_name.into(), content.into());
    }

    /// Returns a primary file, if present.
    #[must_use]
    pub fn primary_file(&self, path: &str) -> Option<RemoteFile> {
        self.primary.read().get(path).cloned()
    }

    /// Returns the current secondary page map.
    #[must_use]
    pub fn secondary_pages(&self) -> BTreeMap<String, String> {
        self.secondary.read().clone()
    }

    /// Queues a failure for the next call to `operation`.
    pub fn push_failure(&self, operation: &str, failure: RemoteFailure) {
        self.failures
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Number of times `operation` has been invoked.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    /// Commit messages recorded against the secondary store.
    #[must_use]
    pub fn commit_messages(&self) -> Vec<String> {
        self.commits.lock().clone()
    }

    /// Number of pushes to the secondary store.
    #[must_use]
    pub fn push_count(&self) -> usize {
        *self.pushes.lock()
    }

    fn enter(&self, operation: &str) -> SyncResult<()> {
        *self.calls.lock().entry(operation.to_string()).or_insert(0) += 1;
        if let Some(queue) = self.failures.lock().get_mut(operation) {
            if let Some(failure) = queue.pop_front() {
                return Err(failure.into());
            }
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn get_file(&self, path: &str) -> SyncResult<RemoteFile> {
        self.enter("get_file")?;
        self.primary
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteFailure::not_found(path).into())
    }

    fn create_file(&self, path: &str, content: &str, _message: &str) -> SyncResult<()> {
        self.enter("create_file")?;
        let mut primary = self.primary.write();
        if primary.contains_key(path) {
            return Err(RemoteFailure::status(
                422,
                format!("creation conflict: {path} already exists"),
            )
            .into());
        }
        primary.insert(path.to_string(), RemoteFile::new(content));
        Ok(())
    }

    fn update_file(
        &self,
        path: &str,
        content: &str,
        revision: &str,
        _message: &str,
    ) -> SyncResult<()> {
        self.enter("update_file")?;
        let mut primary = self.primary.write();
        match primary.get(path) {
            None => Err(RemoteFailure::not_found(path).into()),
            Some(current) if current.revision != revision => Err(RemoteFailure::status(
                409,
                format!("update conflict: stale revision for {path}"),
            )
            .into()),
            Some(_) => {
                primary.insert(path.to_string(), RemoteFile::new(content));
                Ok(())
            }
        }
    }

    fn delete_file(&self, path: &str, revision: &str, _message: &str) -> SyncResult<()> {
        self.enter("delete_file")?;
        let mut primary = self.primary.write();
        match primary.get(path) {
            None => Err(RemoteFailure::not_found(path).into()),
            Some(current) if current.revision != revision => Err(RemoteFailure::status(
                409,
                format!("delete conflict: stale revision for {path}"),
            )
            .into()),
            Some(_) => {
                primary.remove(path);
                Ok(())
            }
        }
    }

    fn clone_secondary(&self, destination: &Path) -> SyncResult<PathBuf> {
        self.enter("clone")?;
        fs::create_dir_all(destination)?;
        for (file_name, content) in self.secondary.read().iter() {
            fs::write(destination.join(file_name), content)?;
        }
        Ok(destination.to_path_buf())
    }

    fn commit_secondary(&self, working_copy: &Path, message: &str) -> SyncResult<()> {
        self.enter("commit")?;
        let mut pages = BTreeMap::new();
        for entry in fs::read_dir(working_copy)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                pages.insert(name, fs::read_to_string(&path)?);
            }
        }
        *self.secondary.write() = pages;
        self.commits.lock().push(message.to_string());
        Ok(())
    }

    fn push_secondary(&self, _working_copy: &Path) -> SyncResult<()> {
        self.enter("push")?;
        *self.pushes.lock() += 1;
        Ok(())
    }
}

/// Directory-backed remote store.
///
/// The primary repository lives under one root and the secondary (wiki)
/// store under another. Revision tokens are content hashes, so the same
/// stale-revision guard applies as with a real remote. Push is a no-op:
/// commit already persisted the pages.
#[derive(Debug, Clone)]
pub struct DirRemoteStore {
    primary_root: PathBuf,
    secondary_root: PathBuf,
}

impl DirRemoteStore {
    /// Creates a store over the two roots.
    pub fn new(primary_root: impl Into<PathBuf>, secondary_root: impl Into<PathBuf>) -> Self {
        Self {
            primary_root: primary_root.into(),
            secondary_root: secondary_root.into(),
        }
    }

    fn read_current(&self, path: &str) -> SyncResult<Option<RemoteFile>> {
        let full = self.primary_root.join(path);
        match fs::read_to_string(&full) {
            Ok(content) => Ok(Some(RemoteFile::new(content))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn copy_markdown_tree(from: &Path, to: &Path) -> SyncResult<()> {
        fs::create_dir_all(to)?;
        if !from.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            let path = entry.path();
            let target = to.join(entry.file_name());
            if path.is_dir() {
                Self::copy_markdown_tree(&path, &target)?;
            } else if path.extension().is_some_and(|ext| ext == "md") {
                fs::copy(&path, &target)?;
            }
        }
        Ok(())
    }

    fn clear_markdown_tree(dir: &Path) -> SyncResult<()> {
        if !dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::clear_markdown_tree(&path)?;
            } else if path.extension().is_some_and(|ext| ext == "md") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl RemoteStore for DirRemoteStore {
    fn get_file(&self, path: &str) -> SyncResult<RemoteFile> {
        self.read_current(path)?
            .ok_or_else(|| RemoteFailure::not_found(path).into())
    }

    fn create_file(&self, path: &str, content: &str, message: &str) -> SyncResult<()> {
        if self.read_current(path)?.is_some() {
            return Err(RemoteFailure::status(
                422,
                format!("creation conflict: {path} already exists"),
            )
            .into());
        }
        let full = self.primary_root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;
        debug!(path, message, "created primary file");
        Ok(())
    }

    fn update_file(
        &self,
        path: &str,
        content: &str,
        revision: &str,
        message: &str,
    ) -> SyncResult<()> {
        match self.read_current(path)? {
            None => Err(RemoteFailure::not_found(path).into()),
            Some(current) if current.revision != revision => Err(RemoteFailure::status(
                409,
                format!("update conflict: stale revision for {path}"),
            )
            .into()),
            Some(_) => {
                fs::write(self.primary_root.join(path), content)?;
                debug!(path, message, "updated primary file");
                Ok(())
            }
        }
    }

    fn delete_file(&self, path: &str, revision: &str, message: &str) -> SyncResult<()> {
        match self.read_current(path)? {
            None => Err(RemoteFailure::not_found(path).into()),
            Some(current) if current.revision != revision => Err(RemoteFailure::status(
                409,
                format!("delete conflict: stale revision for {path}"),
            )
            .into()),
            Some(_) => {
                fs::remove_file(self.primary_root.join(path))?;
                debug!(path, message, "deleted primary file");
                Ok(())
            }
        }
    }

    fn clone_secondary(&self, destination: &Path) -> SyncResult<PathBuf> {
        Self::copy_markdown_tree(&self.secondary_root, destination)?;
        Ok(destination.to_path_buf())
    }

    fn commit_secondary(&self, working_copy: &Path, message: &str) -> SyncResult<()> {
        Self::clear_markdown_tree(&self.secondary_root)?;
        Self::copy_markdown_tree(working_copy, &self.secondary_root)?;
        debug!(message, "committed secondary working copy");
        Ok(())
    }

    fn push_secondary(&self, working_copy: &Path) -> SyncResult<()> {
        debug!(working_copy = %working_copy.display(), "push is a no-op for a directory remote");
        Ok(())
    }
}
