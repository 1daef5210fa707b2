//! Local file store: markdown files under a folder.
//!
//! Logical names join the two stores: a primary path like
//! `guides/setup.md` and its secondary counterpart share the name
//! `guides:setup`. The transform is deterministic and order-preserving and
//! round-trips for any path with no adjacent separators and no join
//! character inside a component.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use wikisync_core::{FileRecord, SyncResult};

/// The character standing in for path separators inside a logical name.
pub const LOGICAL_JOIN: char = ':';

/// Derives the logical name for a markdown path.
///
/// The path is taken relative to its store root: components are joined with
/// [`LOGICAL_JOIN`] and a trailing `.md` extension is stripped.
#[must_use]
pub fn path_to_logical_name(path: &Path) -> String {
    let mut parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(last) = parts.last_mut() {
        if let Some(stem) = last.strip_suffix(".md") {
            *last = stem.to_string();
        }
    }

    parts.join(&LOGICAL_JOIN.to_string())
}

/// Maps a logical name back to a markdown path, optionally under `base_dir`.
///
/// Inverse of [`path_to_logical_name`].
#[must_use]
pub fn logical_name_to_path(name: &str, base_dir: Option<&Path>) -> PathBuf {
    let mut path = base_dir.map(Path::to_path_buf).unwrap_or_default();
    let mut parts = name.split(LOGICAL_JOIN).peekable();

    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            path.push(format!("{part}.md"));
        } else {
            path.push(part);
        }
    }

    path
}

/// A local markdown file store.
///
/// # Invariants
///
/// - `list_markdown_files` returns an empty list, not an error, for an
///   absent directory
/// - `write` creates missing parent directories
/// - `delete` is idempotent and prunes now-empty parent directories upward
///   until it meets a non-empty ancestor or the store root, which always
///   survives
///
/// # Implementors
///
/// - [`FsLocalStore`] - the std::fs implementation
pub trait LocalStore: Send + Sync {
    /// Lists all markdown files under `dir`, recursively.
    ///
    /// Records carry the store-relative path, the derived logical name, the
    /// file content and the modification time; no revision token.
    fn list_markdown_files(&self, dir: &Path) -> SyncResult<Vec<FileRecord>>;

    /// Writes `content` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, content: &str) -> SyncResult<()>;

    /// Deletes the file at `path` if it exists, then removes emptied parent
    /// directories up to, but not including, `root`.
    fn delete(&self, root: &Path, path: &Path) -> SyncResult<()>;
}

/// Filesystem-backed local store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLocalStore;

impl FsLocalStore {
    /// Creates the store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn collect(dir: &Path, root: &Path, out: &mut Vec<FileRecord>) -> SyncResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect(&path, root, out)?;
            } else if path.extension().is_some_and(|ext| ext == "md") {
                let relative = path.strip_prefix(root).unwrap_or(&path);
                let content = fs::read_to_string(&path)?;
                let modified = entry.metadata().ok().and_then(|m| m.modified().ok());

                let mut record = FileRecord::new(
                    path_to_logical_name(relative),
                    relative.to_string_lossy().replace('\\', "/"),
                    content,
                );
                record.modified_at = modified;
                out.push(record);
            }
        }
        Ok(())
    }
}

impl LocalStore for FsLocalStore {
    fn list_markdown_files(&self, dir: &Path) -> SyncResult<Vec<FileRecord>> {
        if !dir.exists() {
            debug!(dir = %dir.display(), "directory absent, listing nothing");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        Self::collect(dir, dir, &mut records)?;
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn write(&self, path: &Path, content: &str) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn delete(&self, root: &Path, path: &Path) -> SyncResult<()> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        // Prune emptied directories until a non-empty ancestor; the root
        // itself is never removed.
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == root || !dir.starts_with(root) {
                break;
            }
            let empty = match fs::read_dir(dir) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => break,
            };
            if !empty || fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }

        Ok(())
    }
}
