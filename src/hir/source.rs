//! The set of Magik files known to the indexer.
//!
//! Assigns a stable [`FileId`] per path and tracks each file's contents,
//! module and indexing state. Every change of contents bumps the file's
//! version, which the keeper uses to drop results of outdated re-indexes.
//!
//! Contents pushed by an editor mark the file open; an open file is indexed
//! from its buffer and disk reads leave it alone until it is closed.
//!
//!
//! ```text
//! Unindexed --created--> Indexed --changed--> Stale --reindex--> Indexed
//!                            \--deleted--> Removed
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;

use crate::base::FileId;

/// Indexing state of one tracked file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileState {
    /// Known but never indexed.
    Unindexed,
    /// Definitions in the keeper reflect the current contents.
    Indexed,
    /// Contents changed since the last index.
    Stale,
    /// The file was deleted; its definitions are gone.
    Removed,
}

/// Per-file record.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub contents: Option<Arc<str>>,
    pub module: Option<SmolStr>,
    pub timestamp: Option<SystemTime>,
    pub state: FileState,
    /// Bumped by every change of `contents`.
    pub version: u64,
    /// Contents come from an editor buffer rather than disk.
    pub open: bool,
}

#[derive(Debug, Default)]
struct FileSetInner {
    path_to_id: IndexMap<PathBuf, FileId>,
    files: IndexMap<FileId, SourceFile>,
    next_id: u32,
}

/// Path ⇄ [`FileId`] mapping plus per-file contents and state.
///
/// Ids are never reused, even after a file is removed.
#[derive(Debug, Default)]
pub struct FileSet {
    inner: RwLock<FileSetInner>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or assign the id for `path`.
    pub fn file_id(&self, path: &Path) -> FileId {
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.path_to_id.get(path) {
                return id;
            }
        }

        let mut inner = self.inner.write();
        if let Some(&id) = inner.path_to_id.get(path) {
            return id;
        }
        let id = FileId::new(inner.next_id);
        inner.next_id += 1;
        inner.path_to_id.insert(path.to_owned(), id);
        inner.files.insert(
            id,
            SourceFile {
                path: path.to_owned(),
                contents: None,
                module: None,
                timestamp: None,
                state: FileState::Unindexed,
                version: 0,
                open: false,
            },
        );
        id
    }

    /// The id of `path` if it is tracked.
    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.inner.read().path_to_id.get(path).copied()
    }

    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.inner.read().files.get(&file).map(|f| f.path.clone())
    }

    pub fn get(&self, file: FileId) -> Option<SourceFile> {
        self.inner.read().files.get(&file).cloned()
    }

    pub fn contents(&self, file: FileId) -> Option<Arc<str>> {
        self.inner.read().files.get(&file)?.contents.clone()
    }

    pub fn state(&self, file: FileId) -> Option<FileState> {
        self.inner.read().files.get(&file).map(|f| f.state)
    }

    /// Record new contents; an indexed file becomes stale.
    ///
    /// Returns the new version.
    pub fn set_contents(&self, file: FileId, contents: impl Into<Arc<str>>, timestamp: Option<SystemTime>) -> u64 {
        self.update(file, false, |entry| {
            entry.contents = Some(contents.into());
            entry.timestamp = timestamp;
        })
        .unwrap_or_default()
    }

    /// Record contents read from disk, unless the file is open.
    pub fn set_disk_contents(
        &self,
        file: FileId,
        contents: impl Into<Arc<str>>,
        timestamp: Option<SystemTime>,
    ) -> Option<u64> {
        self.update(file, true, |entry| {
            entry.contents = Some(contents.into());
            entry.timestamp = timestamp;
        })
    }

    /// Forget the contents of a file that could not be read, unless it is open.
    pub fn clear_contents(&self, file: FileId) -> Option<u64> {
        self.update(file, true, |entry| {
            entry.contents = None;
            entry.timestamp = None;
        })
    }

    fn update(&self, file: FileId, from_disk: bool, f: impl FnOnce(&mut SourceFile)) -> Option<u64> {
        let mut inner = self.inner.write();
        let entry = inner.files.get_mut(&file)?;
        if from_disk && entry.open {
            return None;
        }
        f(entry);
        entry.version += 1;
        if entry.state == FileState::Indexed {
            entry.state = FileState::Stale;
        }
        Some(entry.version)
    }

    /// Mark `file` indexed, unless its contents moved past `version`.
    pub fn mark_indexed(&self, file: FileId, version: u64) {
        if let Some(entry) = self.inner.write().files.get_mut(&file) {
            if entry.version == version && entry.state != FileState::Removed {
                entry.state = FileState::Indexed;
            }
        }
    }

    pub fn set_open(&self, file: FileId, open: bool) {
        if let Some(entry) = self.inner.write().files.get_mut(&file) {
            entry.open = open;
        }
    }

    pub fn is_open(&self, file: FileId) -> bool {
        self.inner.read().files.get(&file).is_some_and(|f| f.open)
    }

    pub fn set_module(&self, file: FileId, module: Option<SmolStr>) {
        if let Some(entry) = self.inner.write().files.get_mut(&file) {
            entry.module = module;
        }
    }

    pub fn set_state(&self, file: FileId, state: FileState) {
        if let Some(entry) = self.inner.write().files.get_mut(&file) {
            entry.state = state;
        }
    }

    /// Mark `file` removed and drop its contents.
    ///
    /// The path is unmapped, so a re-created file gets a fresh id.
    pub fn remove(&self, file: FileId) -> Option<PathBuf> {
        let mut inner = self.inner.write();
        let entry = inner.files.get_mut(&file)?;
        entry.state = FileState::Removed;
        entry.contents = None;
        let path = entry.path.clone();
        inner.path_to_id.swap_remove(&path);
        Some(path)
    }

    /// Number of files not removed.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .files
            .values()
            .filter(|f| f.state != FileState::Removed)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of files not removed.
    pub fn files(&self) -> Vec<FileId> {
        self.inner
            .read()
            .files
            .iter()
            .filter(|(_, f)| f.state != FileState::Removed)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.files.clear();
        inner.path_to_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ids_are_stable() {
        let files = FileSet::new();

        let a = files.file_id(Path::new("/src/a.magik"));
        let b = files.file_id(Path::new("/src/b.magik"));

        assert_ne!(a, b);
        assert_eq!(files.file_id(Path::new("/src/a.magik")), a);
        assert_eq!(files.path(a).as_deref(), Some(Path::new("/src/a.magik")));
    }

    #[test]
    fn test_new_contents_make_indexed_file_stale() {
        let files = FileSet::new();
        let id = files.file_id(Path::new("/src/a.magik"));
        assert_eq!(files.state(id), Some(FileState::Unindexed));

        files.set_contents(id, "def_mixin(:a)", None);
        assert_eq!(files.state(id), Some(FileState::Unindexed));

        files.set_state(id, FileState::Indexed);
        files.set_contents(id, "def_mixin(:b)", None);
        assert_eq!(files.state(id), Some(FileState::Stale));
        assert_eq!(files.contents(id).as_deref(), Some("def_mixin(:b)"));
    }

    #[test]
    fn test_versions_track_content_changes() {
        let files = FileSet::new();
        let id = files.file_id(Path::new("/src/a.magik"));

        let first = files.set_contents(id, "def_mixin(:a)", None);
        let second = files.set_contents(id, "def_mixin(:a)", None);
        files.mark_indexed(id, first);

        assert!(second > first);
        assert_eq!(files.state(id), Some(FileState::Unindexed));
        files.mark_indexed(id, second);
        assert_eq!(files.state(id), Some(FileState::Indexed));
        assert!(files.clear_contents(id).unwrap() > second);
        assert_eq!(files.state(id), Some(FileState::Stale));
        assert!(files.contents(id).is_none());
    }

    #[test]
    fn test_disk_contents_do_not_replace_open_buffer() {
        let files = FileSet::new();
        let id = files.file_id(Path::new("/src/a.magik"));
        files.set_open(id, true);
        let version = files.set_contents(id, "def_mixin(:buffer)", None);

        assert!(files.set_disk_contents(id, "def_mixin(:disk)", None).is_none());
        assert!(files.clear_contents(id).is_none());
        assert_eq!(files.contents(id).as_deref(), Some("def_mixin(:buffer)"));
        assert_eq!(files.get(id).unwrap().version, version);

        files.set_open(id, false);
        assert!(files.set_disk_contents(id, "def_mixin(:disk)", None).is_some());
        assert_eq!(files.contents(id).as_deref(), Some("def_mixin(:disk)"));
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let files = FileSet::new();
        let a = files.file_id(Path::new("/src/a.magik"));
        files.remove(a);

        let again = files.file_id(Path::new("/src/a.magik"));

        assert_ne!(a, again);
        assert_eq!(files.state(a), Some(FileState::Removed));
        assert_eq!(files.files(), vec![again]);
        assert!(files.lookup(Path::new("/src/b.magik")).is_none());
    }
}
