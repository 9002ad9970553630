//! Single-pass definition extraction over one file's syntax tree.

use smol_str::SmolStr;
use tracing::{trace, warn};

use super::{Construct, ParseContext};
use crate::hir::definitions::Definition;
use crate::hir::error::MalformedConstruct;
use crate::syntax::ast::{self, AstNode, PackageSpecification};
use crate::syntax::{SyntaxKind, SyntaxNode};

/// Definitions and skipped constructs of one file.
#[derive(Debug, Default)]
pub struct ReadResult {
    pub definitions: Vec<Definition>,
    pub problems: Vec<MalformedConstruct>,
}

/// Walks a file in source order, tracking the current `_package` and
/// dispatching recognized constructs to their parsers.
pub struct DefinitionReader {
    cx: ParseContext,
}

impl DefinitionReader {
    /// `cx.package` is the package in effect before the first `_package`.
    pub fn new(cx: ParseContext) -> Self {
        Self { cx }
    }

    pub fn read(mut self, root: &SyntaxNode) -> ReadResult {
        let mut result = ReadResult::default();

        for node in root.descendants() {
            if node.kind() == SyntaxKind::PACKAGE_SPECIFICATION && ast::is_top_level_statement(&node) {
                if let Some(name) = PackageSpecification::cast(node.clone()).and_then(|p| p.name()) {
                    self.cx.package = SmolStr::from(name);
                }
                continue;
            }

            let Some(construct) = Construct::recognize(&node) else {
                continue;
            };
            match construct.parse(&node, &self.cx) {
                Ok(definitions) => {
                    trace!(
                        construct = construct.name(),
                        count = definitions.len(),
                        "read definitions"
                    );
                    result.definitions.extend(definitions);
                }
                Err(problem) => {
                    warn!(file = %self.cx.file, %problem, "skipping malformed construct");
                    result.problems.push(problem);
                }
            }
        }

        result
    }
}
