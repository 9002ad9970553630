//! Inlay hints — inferred types of local variables.
//!
//! A hint is placed after each declaring occurrence of a `_local`, a
//! multiple assignment target or a `_for` iterator whose type the local
//! type reasoner could infer.

use super::analysis::FileAnalysis;
use crate::base::LineCol;
use crate::hir::scope::DeclarationKind;
use crate::hir::{TypeResolver, TypeString};
use crate::syntax::ast::{AstNode, Identifier};

/// Kind of inlay hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlayHintKind {
    /// Type annotation hint (e.g., `: sw:integer`)
    Type,
}

/// An inlay hint to display in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlayHint {
    /// Line where the hint should appear (0-indexed)
    pub line: u32,
    /// Column where the hint should appear (0-indexed)
    pub col: u32,
    /// The text to display
    pub label: String,
    /// The kind of hint
    pub kind: InlayHintKind,
    /// Whether to add padding before the hint
    pub padding_left: bool,
    /// Whether to add padding after the hint
    pub padding_right: bool,
}

/// Get inlay hints for a file.
///
/// `range` optionally limits the hints to declarations lying within
/// (start_line, start_col, end_line, end_col).
pub(crate) fn inlay_hints(
    analysis: &FileAnalysis,
    resolver: &TypeResolver,
    range: Option<(u32, u32, u32, u32)>,
) -> Vec<InlayHint> {
    let types = analysis.types(resolver);
    let mut hints = Vec::new();

    for identifier in analysis.root.descendants().filter_map(Identifier::cast) {
        let name_range = identifier.name_range();
        let Some(id) = analysis.scopes.declaration_at(name_range) else {
            continue;
        };
        let declaration = analysis.scopes.declaration(id);
        if !matches!(declaration.kind, DeclarationKind::Local | DeclarationKind::LoopIterator) {
            continue;
        }

        let (start, end) = analysis.line_index.line_col_range(name_range);
        if range.is_some_and(|range| !within(range, start, end)) {
            continue;
        }

        let result = types.get(identifier.syntax());
        if result.is_undefined() {
            continue;
        }
        let type_string = result.get(0, &TypeString::SW_UNSET);
        if type_string.is_undefined() {
            continue;
        }

        hints.push(InlayHint {
            line: end.line,
            col: end.col,
            label: format!(": {type_string}"),
            kind: InlayHintKind::Type,
            padding_left: false,
            padding_right: true,
        });
    }

    hints
}

fn within((start_line, start_col, end_line, end_col): (u32, u32, u32, u32), start: LineCol, end: LineCol) -> bool {
    !(start.line < start_line
        || end.line > end_line
        || (start.line == start_line && start.col < start_col)
        || (end.line == end_line && end.col > end_col))
}
