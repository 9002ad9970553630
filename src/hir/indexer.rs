//! Indexer: keeps the [`DefinitionKeeper`] in step with the workspace.
//!
//! Every file event re-parses one file outside any lock and then swaps
//! that file's partition in a single keeper write. A failed parse still
//! replaces the partition (with nothing) and records a diagnostic. The swap
//! carries the version of the contents that were parsed, so when two
//! re-indexes of one file race, the older result is discarded.
//!
//! Files open in an editor are indexed from their buffer; disk events and
//! full passes do not read them until they are closed.
//!
//! A full index runs the same per-file step for every eligible file in
//! parallel. Each pass owns a [`CancellationToken`]; starting a pass
//! cancels the one before it, which stops at the next file boundary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, info_span, warn};

use super::config::AnalysisConfiguration;
use super::definitions::Definition;
use super::diagnostics::Diagnostic;
use super::error::IndexError;
use super::keeper::{DefinitionKeeper, FileDelta};
use super::parsers::{DefinitionReader, ParseContext};
use super::source::{FileSet, SourceFile};
use crate::base::FileId;
use crate::project::{MODULE_DEF, is_magik_file, module_name_for, read_def_file};
use crate::syntax;

/// Outcome of indexing one file.
#[derive(Clone, Debug)]
pub struct FileOutcome {
    pub file: FileId,
    pub delta: FileDelta,
    /// The file did not parse; its partition is now empty.
    pub parse_error: bool,
    /// Newer contents were indexed first; this result was discarded.
    pub superseded: bool,
}

/// Totals of one full index pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Files read and indexed, including those that failed to parse.
    pub indexed: usize,
    /// Files that could not be read or did not parse.
    pub failed: usize,
    /// Tracked files dropped because they are no longer eligible.
    pub removed: usize,
    /// A newer pass superseded this one before it finished.
    pub cancelled: bool,
}

enum PassStep {
    Indexed { parse_error: bool },
    Unreadable,
    Skipped,
}

/// Incremental indexer over a shared [`DefinitionKeeper`].
pub struct MagikIndexer {
    keeper: Arc<DefinitionKeeper>,
    files: FileSet,
    /// Diagnostics per file with the contents version they describe.
    diagnostics: RwLock<FxHashMap<FileId, (u64, Arc<[Diagnostic]>)>>,
    config: AnalysisConfiguration,
    current_pass: Mutex<Option<CancellationToken>>,
}

impl MagikIndexer {
    pub fn new(keeper: Arc<DefinitionKeeper>) -> Self {
        Self::with_configuration(keeper, AnalysisConfiguration::default())
    }

    pub fn with_configuration(keeper: Arc<DefinitionKeeper>, config: AnalysisConfiguration) -> Self {
        Self {
            keeper,
            files: FileSet::new(),
            diagnostics: RwLock::new(FxHashMap::default()),
            config,
            current_pass: Mutex::new(None),
        }
    }

    pub fn keeper(&self) -> &Arc<DefinitionKeeper> {
        &self.keeper
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn configuration(&self) -> &AnalysisConfiguration {
        &self.config
    }

    /// Diagnostics recorded when `file` was last indexed.
    pub fn diagnostics(&self, file: FileId) -> Arc<[Diagnostic]> {
        self.diagnostics
            .read()
            .get(&file)
            .map(|(_, diagnostics)| diagnostics.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // File events
    // ------------------------------------------------------------------------

    /// A file appeared on disk.
    pub fn file_created(&self, path: &Path) -> Result<FileOutcome, IndexError> {
        let outcome = self.load(path);
        self.after_def_file_event(path);
        outcome
    }

    /// A file changed on disk. Ignored while the file is open.
    pub fn file_changed(&self, path: &Path) -> Result<FileOutcome, IndexError> {
        let outcome = self.load(path);
        self.after_def_file_event(path);
        outcome
    }

    fn after_def_file_event(&self, path: &Path) {
        if path.file_name().is_some_and(|name| name == MODULE_DEF) {
            self.refresh_modules(path);
        }
    }

    /// A file was deleted; returns the definitions it contributed.
    pub fn file_deleted(&self, path: &Path) -> Vec<Definition> {
        let Some(file) = self.files.lookup(path) else {
            return Vec::new();
        };
        let removed = self.keeper.remove_definitions_for_file(file);
        self.files.remove(file);
        self.diagnostics.write().remove(&file);
        debug!(path = %path.display(), removed = removed.len(), "file deleted");
        self.after_def_file_event(path);
        removed
    }

    /// Index editor contents of `path` that may not be saved yet.
    ///
    /// The file counts as open until [`file_closed`](Self::file_closed).
    pub fn update_contents(&self, path: &Path, contents: &str) -> FileOutcome {
        let file = self.files.file_id(path);
        self.files.set_open(file, true);
        self.files.set_contents(file, contents, None);
        if self.files.get(file).is_some_and(|f| f.module.is_none()) {
            self.files.set_module(file, module_name_for(path));
        }
        self.reindex(file)
    }

    /// The editor closed `path`; re-read it from disk.
    pub fn file_closed(&self, path: &Path) -> Result<FileOutcome, IndexError> {
        if let Some(file) = self.files.lookup(path) {
            self.files.set_open(file, false);
        }
        self.load(path)
    }

    fn load(&self, path: &Path) -> Result<FileOutcome, IndexError> {
        let file = self.files.file_id(path);
        if self.files.is_open(file) {
            debug!(path = %path.display(), "open in editor, keeping buffer contents");
            return Ok(self.reindex(file));
        }
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(source) => {
                let error = IndexError::io(path, source);
                warn!(%error, "failed to read file");
                let Some(version) = self.files.clear_contents(file) else {
                    return Ok(self.reindex(file));
                };
                if self.keeper.replace_file_at_version(file, version, Vec::new()).is_some() {
                    self.files.mark_indexed(file, version);
                    self.record_diagnostics(file, version, vec![Diagnostic::from_index_error(file, &error)]);
                }
                return Err(error);
            }
        };
        let timestamp = fs::metadata(path).and_then(|m| m.modified()).ok();
        self.files.set_module(file, module_name_for(path));
        if self.files.set_disk_contents(file, contents, timestamp).is_none() {
            debug!(path = %path.display(), "opened while reading, keeping buffer contents");
        }
        Ok(self.reindex(file))
    }

    /// Re-parse `file` from its stored contents and swap its partition.
    pub fn reindex(&self, file: FileId) -> FileOutcome {
        let _span = debug_span!("index_file", %file).entered();
        let record = self.files.get(file);
        let version = record.as_ref().map_or(0, |r| r.version);
        let contents = record
            .as_ref()
            .and_then(|r| r.contents.clone())
            .unwrap_or_default();

        let def_file = record
            .as_ref()
            .and_then(|r| read_def_file(file, &r.path, &contents, r.timestamp));
        let (definitions, diagnostics, parse_error) = match def_file {
            Some(Ok(definition)) => (vec![definition], Vec::new(), false),
            Some(Err(error)) => {
                debug!(%error, "definition file does not parse");
                (Vec::new(), vec![Diagnostic::from_index_error(file, &error)], true)
            }
            None => self.read_magik(file, record, &contents),
        };

        let Some(delta) = self.keeper.replace_file_at_version(file, version, definitions) else {
            debug!(version, "superseded by newer contents");
            return FileOutcome {
                file,
                delta: FileDelta::default(),
                parse_error,
                superseded: true,
            };
        };
        self.files.mark_indexed(file, version);
        self.record_diagnostics(file, version, diagnostics);
        debug!(added = delta.added.len(), removed = delta.removed.len(), parse_error, "file indexed");

        FileOutcome {
            file,
            delta,
            parse_error,
            superseded: false,
        }
    }

    fn read_magik(
        &self,
        file: FileId,
        record: Option<SourceFile>,
        contents: &str,
    ) -> (Vec<Definition>, Vec<Diagnostic>, bool) {
        let parse = syntax::parse(contents);
        if let Some(error) = parse.errors.first() {
            let error = IndexError::parse(error.message.clone(), error.range);
            debug!(%error, "file does not parse");
            return (Vec::new(), vec![Diagnostic::from_index_error(file, &error)], true);
        }

        let mut cx = ParseContext::new(file, self.config.default_package.clone());
        if let Some(record) = record {
            cx.module = record.module;
            cx.timestamp = record.timestamp;
        }
        let result = DefinitionReader::new(cx).read(&parse.syntax());
        let diagnostics = result
            .problems
            .iter()
            .map(|problem| Diagnostic::from_malformed(file, problem))
            .collect();
        (result.definitions, diagnostics, false)
    }

    /// Re-assign modules of tracked Magik files below a `module.def` that
    /// appeared, changed or went away, re-indexing those that moved.
    fn refresh_modules(&self, module_def: &Path) {
        let Some(dir) = module_def.parent() else {
            return;
        };
        for file in self.files.files() {
            let Some(record) = self.files.get(file) else {
                continue;
            };
            if !is_magik_file(&record.path) || !record.path.starts_with(dir) {
                continue;
            }
            let module = module_name_for(&record.path);
            if module != record.module {
                debug!(path = %record.path.display(), ?module, "module changed");
                self.files.set_module(file, module);
                self.reindex(file);
            }
        }
    }

    fn record_diagnostics(&self, file: FileId, version: u64, diagnostics: Vec<Diagnostic>) {
        let mut all = self.diagnostics.write();
        if all.get(&file).is_some_and(|(recorded, _)| *recorded > version) {
            return;
        }
        all.insert(file, (version, diagnostics.into()));
    }

    // ------------------------------------------------------------------------
    // Full index
    // ------------------------------------------------------------------------

    /// Index every path in `paths` and drop tracked files not among them.
    ///
    /// Supersedes any pass still running. The keeper stays queryable
    /// throughout; readers see each file either before or after its swap.
    pub fn index_workspace(&self, paths: Vec<PathBuf>) -> IndexSummary {
        let token = self.begin_pass();
        self.run_pass(&token, paths)
    }

    /// Run [`index_workspace`](Self::index_workspace) on a background thread.
    ///
    /// The pass is registered before this returns, so a following
    /// [`cancel_indexing`](Self::cancel_indexing) always reaches it.
    pub fn index_in_background(self: &Arc<Self>, paths: Vec<PathBuf>) -> JoinHandle<IndexSummary> {
        let token = self.begin_pass();
        let indexer = Arc::clone(self);
        thread::spawn(move || indexer.run_pass(&token, paths))
    }

    fn run_pass(&self, token: &CancellationToken, paths: Vec<PathBuf>) -> IndexSummary {
        let _span = info_span!("index_workspace", files = paths.len()).entered();

        let steps: Vec<PassStep> = self.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    if token.is_cancelled() {
                        return PassStep::Skipped;
                    }
                    match self.load(path) {
                        Ok(outcome) => PassStep::Indexed {
                            parse_error: outcome.parse_error,
                        },
                        Err(_) => PassStep::Unreadable,
                    }
                })
                .collect()
        });

        let mut summary = IndexSummary::default();
        for step in &steps {
            match step {
                PassStep::Indexed { parse_error } => {
                    summary.indexed += 1;
                    summary.failed += usize::from(*parse_error);
                }
                PassStep::Unreadable => summary.failed += 1,
                PassStep::Skipped => {}
            }
        }

        if token.is_cancelled() {
            summary.cancelled = true;
            info!(indexed = summary.indexed, "index pass superseded");
            return summary;
        }

        let eligible: FxHashSet<&Path> = paths.iter().map(PathBuf::as_path).collect();
        for file in self.files.files() {
            let Some(path) = self.files.path(file) else {
                continue;
            };
            if !eligible.contains(path.as_path()) && !self.files.is_open(file) {
                self.file_deleted(&path);
                summary.removed += 1;
            }
        }

        self.end_pass(token);
        info!(
            indexed = summary.indexed,
            failed = summary.failed,
            removed = summary.removed,
            definitions = self.keeper.len(),
            "workspace indexed"
        );
        summary
    }

    /// Cancel the running full index, if any.
    pub fn cancel_indexing(&self) {
        if let Some(token) = self.current_pass.lock().take() {
            token.cancel();
        }
    }

    /// Forget every file and definition.
    pub fn clear(&self) {
        self.cancel_indexing();
        self.keeper.clear();
        self.files.clear();
        self.diagnostics.write().clear();
        info!("index cleared");
    }

    fn begin_pass(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.current_pass.lock().replace(token.clone()) {
            debug!("superseding running index pass");
            previous.cancel();
        }
        token
    }

    fn end_pass(&self, token: &CancellationToken) {
        let mut current = self.current_pass.lock();
        // A newer pass would have cancelled `token` under this lock.
        if !token.is_cancelled() {
            *current = None;
        }
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        if self.config.max_index_threads == 0 {
            return op();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_index_threads)
            .build()
        {
            Ok(pool) => pool.install(op),
            Err(error) => {
                warn!(%error, "using the global thread pool");
                op()
            }
        }
    }
}

impl std::fmt::Debug for MagikIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagikIndexer")
            .field("files", &self.files.len())
            .field("keeper", &self.keeper)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::diagnostics::codes;
    use crate::hir::source::FileState;

    fn indexer() -> MagikIndexer {
        MagikIndexer::new(Arc::new(DefinitionKeeper::new()))
    }

    #[test]
    fn test_reindexing_unchanged_file_is_idempotent() {
        let indexer = indexer();
        let path = Path::new("/ws/a.magik");

        let first = indexer.update_contents(path, "def_mixin(:a)\n_method a.b _endmethod\n");
        let before = indexer.keeper().get_definitions_in_file(first.file);
        let generation = indexer.keeper().generation();
        let second = indexer.update_contents(path, "def_mixin(:a)\n_method a.b _endmethod\n");

        assert_eq!(before.len(), 2);
        assert!(second.delta.is_empty());
        assert_eq!(indexer.keeper().get_definitions_in_file(second.file), before);
        assert_eq!(indexer.keeper().generation(), generation);
    }

    #[test]
    fn test_parse_error_empties_partition() {
        let indexer = indexer();
        let path = Path::new("/ws/a.magik");
        let outcome = indexer.update_contents(path, "def_mixin(:a)\n");
        assert_eq!(indexer.keeper().get_definitions_in_file(outcome.file).len(), 1);

        let outcome = indexer.update_contents(path, "_method a.b\n  _if x _then\n_endmethod\n");

        assert!(outcome.parse_error);
        assert!(indexer.keeper().get_definitions_in_file(outcome.file).is_empty());
        let diagnostics = indexer.diagnostics(outcome.file);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, Some(codes::PARSE_ERROR));
    }

    #[test]
    fn test_delete_removes_only_that_file() {
        let indexer = indexer();
        let a = indexer.update_contents(Path::new("/ws/a.magik"), "def_mixin(:a)\n").file;
        let b = indexer.update_contents(Path::new("/ws/b.magik"), "def_mixin(:b)\n").file;

        let removed = indexer.file_deleted(Path::new("/ws/a.magik"));

        assert_eq!(removed.len(), 1);
        assert!(indexer.keeper().get_definitions_in_file(a).is_empty());
        assert_eq!(indexer.keeper().get_definitions_in_file(b).len(), 1);
        assert_eq!(indexer.files().state(a), Some(FileState::Removed));
    }

    #[test]
    fn test_newer_pass_cancels_older() {
        let indexer = indexer();
        let older = indexer.begin_pass();
        let newer = indexer.begin_pass();

        assert!(older.is_cancelled());
        assert!(!newer.is_cancelled());

        indexer.end_pass(&older);
        assert!(indexer.current_pass.lock().is_some());
        indexer.end_pass(&newer);
        assert!(indexer.current_pass.lock().is_none());
    }

    #[test]
    fn test_unreadable_file_reports_read_error() {
        let indexer = indexer();
        let path = Path::new("/definitely/not/here.magik");

        assert!(matches!(indexer.file_created(path), Err(IndexError::Io { .. })));
        let file = indexer.files().lookup(path).unwrap();
        assert_eq!(indexer.diagnostics(file)[0].code, Some(codes::READ_ERROR));
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn names_in(indexer: &MagikIndexer, path: &Path) -> Vec<String> {
        let Some(file) = indexer.files().lookup(path) else {
            return Vec::new();
        };
        indexer
            .keeper()
            .get_definitions_in_file(file)
            .iter()
            .map(|d| d.qualified_name().to_string())
            .collect()
    }

    #[test]
    fn test_racing_updates_leave_latest_contents_indexed() {
        let indexer = indexer();
        let path = Path::new("/ws/racy.magik");

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let indexer = &indexer;
                scope.spawn(move || {
                    for round in 0..50 {
                        indexer.update_contents(path, &format!("def_mixin(:m{writer}_{round})\n"));
                    }
                });
            }
        });

        let file = indexer.files().lookup(path).unwrap();
        let contents = indexer.files().contents(file).unwrap();
        let expected = contents.trim_start_matches("def_mixin(:").trim_end_matches(")\n");
        assert_eq!(names_in(&indexer, path), vec![format!("user:{expected}")]);
        assert_eq!(indexer.files().state(file), Some(FileState::Indexed));
    }

    #[test]
    fn test_open_buffer_wins_over_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.magik", "def_mixin(:disk)\n");
        let indexer = indexer();
        indexer.update_contents(&path, "def_mixin(:buffer)\n");

        indexer.file_changed(&path).unwrap();
        let summary = indexer.index_workspace(vec![path.clone()]);

        assert_eq!(summary.indexed, 1);
        assert_eq!(names_in(&indexer, &path), vec!["user:buffer"]);

        indexer.file_closed(&path).unwrap();
        assert_eq!(names_in(&indexer, &path), vec!["user:disk"]);
    }

    #[test]
    fn test_full_pass_keeps_unsaved_buffers() {
        let indexer = indexer();
        let path = Path::new("/ws/unsaved.magik");
        indexer.update_contents(path, "def_mixin(:draft)\n");

        let summary = indexer.index_workspace(Vec::new());

        assert_eq!(summary.removed, 0);
        assert_eq!(names_in(&indexer, path), vec!["user:draft"]);
    }

    #[test]
    fn test_background_pass_indexes_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| write(dir.path(), &format!("f{i}.magik"), &format!("def_mixin(:m{i})\n")))
            .collect();
        let indexer = Arc::new(indexer());

        let summary = indexer.index_in_background(paths).join().unwrap();

        assert_eq!(summary.indexed, 8);
        assert!(!summary.cancelled);
        assert_eq!(indexer.keeper().get_definitions("user:m7").len(), 1);
        assert!(indexer.current_pass.lock().is_none());
    }

    #[test]
    fn test_cancelled_pass_indexes_and_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let kept = write(dir.path(), "kept.magik", "def_mixin(:kept)\n");
        let other = write(dir.path(), "other.magik", "def_mixin(:other)\n");
        let indexer = indexer();
        indexer.file_created(&kept).unwrap();

        let token = indexer.begin_pass();
        indexer.cancel_indexing();
        let summary = indexer.run_pass(&token, vec![other.clone()]);

        assert!(summary.cancelled);
        assert_eq!((summary.indexed, summary.removed), (0, 0));
        assert_eq!(names_in(&indexer, &kept), vec!["user:kept"]);
        assert!(names_in(&indexer, &other).is_empty());
    }

    #[test]
    fn test_superseded_pass_reports_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.magik", "def_mixin(:a)\n");
        let indexer = indexer();

        let older = indexer.begin_pass();
        let newer = indexer.begin_pass();

        assert!(indexer.run_pass(&older, vec![path.clone()]).cancelled);
        let summary = indexer.run_pass(&newer, vec![path]);
        assert!(!summary.cancelled);
        assert_eq!(summary.indexed, 1);
        assert!(indexer.current_pass.lock().is_none());
    }

    #[test]
    fn test_def_files_become_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let product = write(dir.path(), "product.def", "tools layered_product\nversion 1\n");
        fs::create_dir_all(dir.path().join("rope")).unwrap();
        let module = write(dir.path(), "rope/module.def", "rope_module 2\nrequires\n  base\nend\n");
        let indexer = indexer();

        let summary = indexer.index_workspace(vec![product, module.clone()]);

        assert_eq!(summary.indexed, 2);
        let tools = indexer.keeper().product("tools").unwrap();
        assert_eq!(tools.version.as_deref(), Some("1"));
        let rope = indexer.keeper().module("rope_module").unwrap();
        assert_eq!(rope.product.as_deref(), Some("tools"));
        assert_eq!(rope.requires, vec!["base"]);

        indexer.file_deleted(&module);
        assert!(indexer.keeper().module("rope_module").is_none());
    }

    #[test]
    fn test_broken_def_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let module = write(dir.path(), "module.def", "rope_module\ndescription\n  never closed\n");
        let indexer = indexer();

        let outcome = indexer.file_created(&module).unwrap();

        assert!(outcome.parse_error);
        assert_eq!(indexer.diagnostics(outcome.file)[0].code, Some(codes::PARSE_ERROR));
        assert!(indexer.keeper().module("rope_module").is_none());
    }

    #[test]
    fn test_module_def_change_moves_files_to_new_module() {
        let dir = tempfile::tempdir().unwrap();
        let module = write(dir.path(), "module.def", "old_module\n");
        let source = write(dir.path(), "rope.magik", "def_mixin(:rope)\n");
        let indexer = indexer();
        indexer.file_created(&module).unwrap();
        indexer.file_created(&source).unwrap();
        assert_eq!(
            indexer.keeper().get_definitions("user:rope")[0].provenance().module.as_deref(),
            Some("old_module")
        );

        fs::write(&module, "new_module\n").unwrap();
        indexer.file_changed(&module).unwrap();

        assert!(indexer.keeper().module("old_module").is_none());
        assert!(indexer.keeper().module("new_module").is_some());
        assert_eq!(
            indexer.keeper().get_definitions("user:rope")[0].provenance().module.as_deref(),
            Some("new_module")
        );
    }
}
