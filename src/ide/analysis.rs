//! `AnalysisHost` and `Analysis`: the entry points editor tooling uses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use smol_str::SmolStr;

use super::hover::{HoverResult, hover};
use super::inlay_hints::{InlayHint, inlay_hints};
use super::rename::{Resolution, resolve};
use super::symbols::{SymbolInfo, workspace_symbols};
use crate::base::{FileId, LineCol, LineIndex, TextRange, TextSize};
use crate::hir::{
    AnalysisConfiguration, DefinitionKeeper, Diagnostic, FileOutcome, IndexError, IndexSummary, MagikIndexer,
    RenameError, ScopeTree, TextEdit, TypeMap, TypeResolver, check_file, infer_types,
};
use crate::project::WorkspaceLoader;
use crate::syntax::{AstNode, SyntaxKind, SyntaxNode, ast, parse};

/// Owner of the workspace model.
///
/// Mutations go through the host (or its [`MagikIndexer`]); queries go
/// through an [`Analysis`] obtained from [`analysis`](Self::analysis).
pub struct AnalysisHost {
    indexer: Arc<MagikIndexer>,
    resolver: TypeResolver,
}

impl Default for AnalysisHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisHost {
    pub fn new() -> Self {
        Self::with_configuration(AnalysisConfiguration::default())
    }

    pub fn with_configuration(config: AnalysisConfiguration) -> Self {
        let keeper = Arc::new(DefinitionKeeper::new());
        Self {
            indexer: Arc::new(MagikIndexer::with_configuration(keeper.clone(), config)),
            resolver: TypeResolver::new(keeper),
        }
    }

    pub fn indexer(&self) -> &Arc<MagikIndexer> {
        &self.indexer
    }

    pub fn keeper(&self) -> &Arc<DefinitionKeeper> {
        self.indexer.keeper()
    }

    /// Set editor contents for `path` and index them.
    ///
    /// The buffer shadows the file on disk until [`close_file`](Self::close_file).
    pub fn set_file_content(&self, path: impl AsRef<Path>, contents: &str) -> FileOutcome {
        self.indexer.update_contents(path.as_ref(), contents)
    }

    /// Stop tracking the editor buffer of `path` and re-read it from disk.
    pub fn close_file(&self, path: impl AsRef<Path>) -> Result<FileOutcome, IndexError> {
        self.indexer.file_closed(path.as_ref())
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.indexer.file_deleted(path.as_ref());
    }

    pub fn file_id(&self, path: impl AsRef<Path>) -> Option<FileId> {
        self.indexer.files().lookup(path.as_ref())
    }

    pub fn file_path(&self, file: FileId) -> Option<PathBuf> {
        self.indexer.files().path(file)
    }

    /// Index every eligible file below `root`.
    pub fn load_workspace(&self, root: impl AsRef<Path>) -> Result<IndexSummary, String> {
        WorkspaceLoader::new(self.indexer.configuration())?.load_directory_into_host(root, self)
    }

    /// Drop everything, e.g. after a configuration change.
    pub fn clear(&self) {
        self.indexer.clear();
    }

    pub fn analysis(&self) -> Analysis<'_> {
        Analysis { host: self }
    }
}

/// Read-only view over the host for answering queries.
pub struct Analysis<'a> {
    host: &'a AnalysisHost,
}

/// Derived per-file data, rebuilt per request.
pub(crate) struct FileAnalysis {
    pub(crate) root: SyntaxNode,
    pub(crate) line_index: LineIndex,
    pub(crate) scopes: ScopeTree,
    pub(crate) default_package: SmolStr,
}

impl FileAnalysis {
    pub(crate) fn offset(&self, position: LineCol) -> Option<TextSize> {
        self.line_index
            .offset(position)
            .filter(|offset| *offset <= self.root.text_range().end())
    }

    /// Package in effect at `offset`.
    pub(crate) fn package_at(&self, offset: TextSize) -> SmolStr {
        self.root
            .children()
            .filter(|n| n.kind() == SyntaxKind::PACKAGE_SPECIFICATION && n.text_range().end() <= offset)
            .filter_map(|n| ast::PackageSpecification::cast(n).and_then(|p| p.name()))
            .last()
            .map(SmolStr::from)
            .unwrap_or_else(|| self.default_package.clone())
    }

    pub(crate) fn types(&self, resolver: &TypeResolver) -> TypeMap {
        infer_types(resolver, &self.scopes, &self.root, &self.default_package)
    }
}

impl<'a> Analysis<'a> {
    pub fn keeper(&self) -> &'a DefinitionKeeper {
        self.host.keeper()
    }

    pub fn type_resolver(&self) -> &'a TypeResolver {
        &self.host.resolver
    }

    pub fn file_text(&self, file: FileId) -> Option<Arc<str>> {
        self.host.indexer.files().contents(file)
    }

    pub fn line_index(&self, file: FileId) -> Option<LineIndex> {
        self.file_text(file).map(|text| LineIndex::new(&text))
    }

    pub(crate) fn file_analysis(&self, file: FileId) -> Option<FileAnalysis> {
        let text = self.file_text(file)?;
        let root = parse(&text).syntax();
        let default_package = self.host.indexer.configuration().default_package.clone();
        let scopes = ScopeTree::build(&root, &default_package);
        Some(FileAnalysis {
            line_index: LineIndex::new(&text),
            root,
            scopes,
            default_package,
        })
    }

    /// Hover information at `position`.
    pub fn hover(&self, file: FileId, position: LineCol) -> Option<HoverResult> {
        let analysis = self.file_analysis(file)?;
        hover(&analysis, self.type_resolver(), position)
    }

    /// What the identifier at `position` refers to.
    pub fn resolve(&self, file: FileId, position: LineCol) -> Option<Resolution> {
        let analysis = self.file_analysis(file)?;
        resolve(&analysis, self.keeper(), position)
    }

    /// Range and current name of the local variable a rename would change.
    pub fn prepare_rename(&self, file: FileId, position: LineCol) -> Result<(TextRange, SmolStr), RenameError> {
        let analysis = self.rename_target(file)?;
        let offset = analysis
            .offset(position)
            .ok_or_else(|| RenameError::AmbiguousTarget(format!("position {position} is outside the file")))?;
        analysis.scopes.prepare_rename(offset)
    }

    /// Edits renaming the local variable at `position` to `new_name`.
    pub fn rename(&self, file: FileId, position: LineCol, new_name: &str) -> Result<Vec<TextEdit>, RenameError> {
        let analysis = self.rename_target(file)?;
        let offset = analysis
            .offset(position)
            .ok_or_else(|| RenameError::AmbiguousTarget(format!("position {position} is outside the file")))?;
        analysis.scopes.rename(offset, new_name)
    }

    fn rename_target(&self, file: FileId) -> Result<FileAnalysis, RenameError> {
        self.file_analysis(file)
            .ok_or_else(|| RenameError::AmbiguousTarget(format!("unknown file {file}")))
    }

    /// Exemplars, methods and globals whose name contains `query`.
    pub fn workspace_symbols(&self, query: &str) -> Vec<SymbolInfo> {
        workspace_symbols(self.keeper(), query)
    }

    /// Type hints for local variables, optionally limited to a line/column range.
    pub fn inlay_hints(&self, file: FileId, range: Option<(u32, u32, u32, u32)>) -> Vec<InlayHint> {
        match self.file_analysis(file) {
            Some(analysis) => inlay_hints(&analysis, self.type_resolver(), range),
            None => Vec::new(),
        }
    }

    /// Indexing diagnostics plus unresolved-parent checks for `file`.
    pub fn diagnostics(&self, file: FileId) -> Vec<Diagnostic> {
        let mut diagnostics = self.host.indexer.diagnostics(file).to_vec();
        diagnostics.extend(check_file(self.keeper(), file));
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_file_content_indexes_definitions() {
        let host = AnalysisHost::new();
        let outcome = host.set_file_content("/ws/a.magik", "def_slotted_exemplar(:rope, {})\n");

        assert!(!outcome.parse_error);
        assert_eq!(host.file_id("/ws/a.magik"), Some(outcome.file));
        assert_eq!(host.keeper().get_definitions("user:rope").len(), 1);
    }

    #[test]
    fn test_diagnostics_include_parse_errors() {
        let host = AnalysisHost::new();
        let outcome = host.set_file_content("/ws/bad.magik", "_method a.b\n");

        let diagnostics = host.analysis().diagnostics(outcome.file);

        assert!(outcome.parse_error);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_package_at_follows_package_statements() {
        let host = AnalysisHost::new();
        let source = "_method a.b _endmethod\n_package sw\n_method c.d _endmethod\n";
        let outcome = host.set_file_content("/ws/p.magik", source);
        let analysis = host.analysis().file_analysis(outcome.file).unwrap();

        assert_eq!(analysis.package_at(TextSize::from(0)), "user");
        assert_eq!(analysis.package_at(TextSize::of(source)), "sw");
    }

    #[test]
    fn test_rename_outside_file_is_rejected() {
        let host = AnalysisHost::new();
        let outcome = host.set_file_content("/ws/r.magik", "_block _local a _endblock");

        let result = host.analysis().rename(outcome.file, LineCol::new(40, 0), "b");

        assert!(matches!(result, Err(RenameError::AmbiguousTarget(_))));
    }
}
