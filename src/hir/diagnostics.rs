//! Diagnostics — problems found while indexing and checking Magik files.
//!
//! Parse errors, malformed constructs and failed reads are turned into
//! diagnostics at the file boundary; they never abort an index pass.

use std::sync::Arc;

use crate::base::{FileId, LineCol, LineIndex, TextRange};
use super::definitions::Definition;
use super::error::{IndexError, MalformedConstruct};
use super::keeper::DefinitionKeeper;
use super::resolve::{ResolveResult, resolve_type_string};

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }
}

/// A diagnostic message attached to a byte range of a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: FileId,
    pub range: TextRange,
    pub severity: Severity,
    /// Code from [`codes`].
    pub code: Option<&'static str>,
    pub message: Arc<str>,
    pub related: Vec<RelatedInfo>,
}

/// Related information for a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedInfo {
    pub file: FileId,
    pub range: TextRange,
    pub message: Arc<str>,
}

impl Diagnostic {
    pub fn error(file: FileId, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self::new(file, range, Severity::Error, message)
    }

    pub fn warning(file: FileId, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self::new(file, range, Severity::Warning, message)
    }

    fn new(file: FileId, range: TextRange, severity: Severity, message: impl Into<Arc<str>>) -> Self {
        Self {
            file,
            range,
            severity,
            code: None,
            message: message.into(),
            related: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    /// Start and end as line/column, for protocol adapters.
    pub fn line_cols(&self, index: &LineIndex) -> (LineCol, LineCol) {
        index.line_col_range(self.range)
    }

    /// The diagnostic reported for a file that failed to index.
    pub fn from_index_error(file: FileId, error: &IndexError) -> Self {
        match error {
            IndexError::Parse { range, .. } => {
                Diagnostic::error(file, *range, error.to_string()).with_code(codes::PARSE_ERROR)
            }
            IndexError::Io { .. } | IndexError::UnknownFile(_) => {
                Diagnostic::error(file, TextRange::default(), error.to_string()).with_code(codes::READ_ERROR)
            }
        }
    }

    pub fn from_malformed(file: FileId, problem: &MalformedConstruct) -> Self {
        Diagnostic::warning(file, problem.range, problem.to_string()).with_code(codes::MALFORMED_CONSTRUCT)
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Diagnostic codes.
pub mod codes {
    /// The file is not valid Magik.
    pub const PARSE_ERROR: &str = "E0001";
    /// The file could not be read.
    pub const READ_ERROR: &str = "E0002";
    /// A parent type is not defined anywhere.
    pub const UNDEFINED_PARENT: &str = "E0003";
    /// A parent type resolves to several definitions.
    pub const AMBIGUOUS_PARENT: &str = "E0004";

    /// A definition construct has an invalid shape and was skipped.
    pub const MALFORMED_CONSTRUCT: &str = "W0001";
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics during indexing and checking.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostics_for_file(&self, file: FileId) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.file == file).collect()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Take all diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

// ============================================================================
// SEMANTIC CHECKS
// ============================================================================

/// Check that every exemplar parent declared in `file` resolves.
pub fn check_file(keeper: &DefinitionKeeper, file: FileId) -> Vec<Diagnostic> {
    let mut collector = DiagnosticCollector::new();

    for definition in keeper.get_definitions_in_file(file).iter() {
        let Definition::Exemplar(exemplar) = definition else {
            continue;
        };
        let range = definition.location().map(|l| l.range).unwrap_or_default();
        for parent in &exemplar.parents {
            match resolve_type_string(keeper, parent) {
                ResolveResult::Found(_) => {}
                ResolveResult::Ambiguous(candidates) => {
                    let mut diagnostic = Diagnostic::warning(
                        file,
                        range,
                        format!("ambiguous parent '{parent}' of {}", exemplar.type_string),
                    )
                    .with_code(codes::AMBIGUOUS_PARENT);
                    for candidate in candidates {
                        if let Some(location) = candidate.location() {
                            diagnostic = diagnostic.with_related(RelatedInfo {
                                file: location.file,
                                range: location.range,
                                message: Arc::from(format!("candidate: {candidate}")),
                            });
                        }
                    }
                    collector.add(diagnostic);
                }
                ResolveResult::NotFound => collector.add(
                    Diagnostic::error(
                        file,
                        range,
                        format!("undefined parent '{parent}' of {}", exemplar.type_string),
                    )
                    .with_code(codes::UNDEFINED_PARENT),
                ),
            }
        }
    }

    collector.take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::parsers::{DefinitionReader, ParseContext};
    use crate::syntax::parse;

    fn index(keeper: &DefinitionKeeper, file: u32, source: &str) {
        let parse = parse(source);
        let result = DefinitionReader::new(ParseContext::new(FileId::new(file), "user")).read(&parse.syntax());
        keeper.replace_file(FileId::new(file), result.definitions);
    }

    #[test]
    fn test_collector_counts() {
        let mut collector = DiagnosticCollector::new();
        collector.add(Diagnostic::error(FileId::new(0), TextRange::default(), "error 1"));
        collector.add(Diagnostic::error(FileId::new(1), TextRange::default(), "error 2"));
        collector.add(Diagnostic::warning(FileId::new(0), TextRange::default(), "warning 1"));

        assert_eq!(collector.error_count(), 2);
        assert_eq!(collector.warning_count(), 1);
        assert_eq!(collector.diagnostics_for_file(FileId::new(0)).len(), 2);
        assert!(collector.has_errors());
    }

    #[test]
    fn test_severity_to_lsp() {
        assert_eq!(Severity::Error.to_lsp(), 1);
        assert_eq!(Severity::Hint.to_lsp(), 4);
    }

    #[test]
    fn test_parse_error_diagnostic() {
        let error = IndexError::parse("expected expression", TextRange::default());
        let diagnostic = Diagnostic::from_index_error(FileId::new(2), &error);

        assert_eq!(diagnostic.code, Some(codes::PARSE_ERROR));
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(&*diagnostic.message, "parse error: expected expression");
    }

    #[test]
    fn test_undefined_parent() {
        let keeper = DefinitionKeeper::new();
        index(&keeper, 0, "def_slotted_exemplar(:thing, {}, {:missing})");

        let diagnostics = check_file(&keeper, FileId::new(0));

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, Some(codes::UNDEFINED_PARENT));
        assert!(diagnostics[0].message.contains("user:missing"));
    }

    #[test]
    fn test_parent_defined_in_other_file() {
        let keeper = DefinitionKeeper::new();
        index(&keeper, 0, "def_slotted_exemplar(:thing, {}, {:able})");
        index(&keeper, 1, "_package sw\ndef_mixin(:able)");

        assert!(check_file(&keeper, FileId::new(0)).is_empty());
    }
}
