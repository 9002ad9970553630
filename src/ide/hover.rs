//! Hover — type and definition information for the token under the cursor.

use std::sync::Arc;

use super::analysis::FileAnalysis;
use crate::base::{LineCol, TextRange};
use crate::hir::{ExpressionResultString, MethodDefinition, TypeResolver, TypeString};
use crate::syntax::ast::{self, AstNode, Identifier, MethodInvocation};
use crate::syntax::{SyntaxKind, SyntaxToken};

/// Result of a hover request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverResult {
    /// Markdown content to display
    pub contents: String,
    /// Range of the hovered token
    pub range: TextRange,
}

impl HoverResult {
    fn new(contents: String, token: &SyntaxToken) -> Self {
        Self {
            contents,
            range: token.text_range(),
        }
    }
}

/// Hover information at `position` in the analysed file.
///
/// Covers method definition names, exemplar names of method definitions,
/// identifiers (their inferred type) and invoked methods.
pub(crate) fn hover(analysis: &FileAnalysis, resolver: &TypeResolver, position: LineCol) -> Option<HoverResult> {
    let offset = analysis.offset(position)?;
    let token = analysis
        .root
        .token_at_offset(offset)
        .find(|t| t.kind() == SyntaxKind::IDENT)?;
    let parent = token.parent()?;
    let package = analysis.package_at(offset);

    match parent.kind() {
        SyntaxKind::METHOD_NAME => {
            let method = ast::MethodDefinition::cast(parent.parent()?)?;
            let exemplar = method.exemplar_name()?;
            let name = method.method_name()?;
            let owner = resolver.get_type_by_name(&exemplar, &package).type_string().clone();
            let contents = match resolver.get_method(&owner, &name) {
                Some(definition) => method_markdown(&definition),
                None => format!("`{owner}.{name}`"),
            };
            Some(HoverResult::new(contents, &token))
        }
        SyntaxKind::EXEMPLAR_NAME => {
            let name = ast::significant_text(&parent);
            let owner = resolver.get_type_by_name(&name, &package).type_string().clone();
            Some(HoverResult::new(type_markdown(resolver, &owner), &token))
        }
        SyntaxKind::METHOD_INVOCATION => {
            let invocation = MethodInvocation::cast(parent)?;
            let name = invocation.method_name()?;
            let types = analysis.types(resolver);
            let receiver = invocation
                .receiver()
                .map(|r| types.get(&r).get(0, &TypeString::SW_UNSET))
                .unwrap_or(TypeString::UNDEFINED);
            let contents = match resolver.get_method(&receiver, &name) {
                Some(definition) => method_markdown(&definition),
                None => format!("Unknown method {name} on type {receiver}"),
            };
            Some(HoverResult::new(contents, &token))
        }
        SyntaxKind::IDENTIFIER => {
            let identifier = Identifier::cast(parent)?;
            let types = analysis.types(resolver);
            let result = types.get(identifier.syntax());
            Some(HoverResult::new(result_markdown(resolver, &result), &token))
        }
        _ => None,
    }
}

fn method_markdown(method: &Arc<MethodDefinition>) -> String {
    let parameters: Vec<String> = method
        .parameters
        .iter()
        .map(|p| match p.type_string.is_undefined() {
            true => p.name.to_string(),
            false => format!("{} {{{}}}", p.name, p.type_string),
        })
        .collect();

    let mut out = format!("`{}`", method.signature());
    if !parameters.is_empty() {
        out.push_str(&format!("\n\nParameters: {}", parameters.join(", ")));
    }
    out.push_str(&format!("\n\nReturns: {}", display_result(&method.return_types)));
    if method.is_iter() {
        out.push_str(&format!("\n\nLoops: {}", display_result(&method.loop_types)));
    }
    if let Some(doc) = method.provenance.doc.as_deref() {
        out.push_str("\n\n---\n\n");
        out.push_str(doc);
    }
    out
}

fn type_markdown(resolver: &TypeResolver, type_string: &TypeString) -> String {
    let resolved = resolver.get_type(type_string);
    let mut out = format!("`{type_string}`");
    if let Some(exemplar) = resolved.exemplar() {
        out.push_str(&format!(" ({})", exemplar.kind.as_str()));
        let parents = resolver.get_parents(type_string);
        if !parents.is_empty() {
            let names: Vec<String> = parents.iter().map(TypeString::to_string).collect();
            out.push_str(&format!("\n\nParents: {}", names.join(", ")));
        }
        if let Some(doc) = exemplar.provenance.doc.as_deref() {
            out.push_str("\n\n---\n\n");
            out.push_str(doc);
        }
    }
    out
}

fn result_markdown(resolver: &TypeResolver, result: &ExpressionResultString) -> String {
    if result.is_undefined() {
        return format!("`{}`", TypeString::UNDEFINED);
    }
    let first = result.get(0, &TypeString::SW_UNSET);
    if result.len() == 1 && !first.is_undefined() && !first.is_combined() {
        return type_markdown(resolver, &first);
    }
    format!("`{}`", display_result(result))
}

fn display_result(result: &ExpressionResultString) -> String {
    if result.is_undefined() {
        TypeString::UNDEFINED.to_string()
    } else {
        result.type_names(", ")
    }
}
