//! Doc comment (`##`) extraction.
//!
//! Doc comments are trivia, so they sit inside whichever node was open when
//! the parser reached them. For method definitions that is the header or the
//! start of the body; for other statements it is anywhere in the statement.

use rowan::WalkEvent;

use super::syntax_kind::SyntaxKind;
use super::{SyntaxNode, SyntaxToken};

/// Doc comment tokens belonging to `node`.
///
/// Comments inside nested procedures and methods belong to those and are
/// skipped. For a method definition only the comments before the first
/// statement of its body count.
pub fn doc_comment_tokens(node: &SyntaxNode) -> Vec<SyntaxToken> {
    let is_method = node.kind() == SyntaxKind::METHOD_DEFINITION;
    let mut tokens = Vec::new();
    let mut in_body = false;

    let mut walk = node.preorder_with_tokens();
    while let Some(event) = walk.next() {
        let WalkEvent::Enter(element) = event else {
            continue;
        };
        match element {
            rowan::NodeOrToken::Node(child) => {
                if child != *node
                    && matches!(
                        child.kind(),
                        SyntaxKind::PROC_DEFINITION | SyntaxKind::METHOD_DEFINITION
                    )
                {
                    walk.skip_subtree();
                } else if is_method && child.kind() == SyntaxKind::BODY {
                    in_body = true;
                }
            }
            rowan::NodeOrToken::Token(token) => {
                if token.kind() == SyntaxKind::DOC_COMMENT {
                    tokens.push(token);
                } else if is_method && in_body && !token.kind().is_trivia() {
                    break;
                }
            }
        }
    }
    tokens
}

/// Doc comment lines of `node`, with the `##` marker and one space removed.
pub fn doc_lines(node: &SyntaxNode) -> Vec<String> {
    doc_comment_tokens(node)
        .iter()
        .map(|token| {
            let text = token.text().trim_start_matches("##");
            text.strip_prefix(' ').unwrap_or(text).trim_end().to_string()
        })
        .collect()
}

/// Human-readable documentation of `node`: doc lines without `@` type annotations.
pub fn doc_text(node: &SyntaxNode) -> Option<String> {
    let lines: Vec<_> = doc_lines(node)
        .into_iter()
        .filter(|line| !line.trim_start().starts_with('@'))
        .collect();
    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn first_of(source: &str, kind: SyntaxKind) -> SyntaxNode {
        parse(source)
            .syntax()
            .descendants()
            .find(|n| n.kind() == kind)
            .unwrap()
    }

    #[test]
    fn test_method_doc_stops_at_first_statement() {
        let source = "_method a.b\n  ## Does b.\n  ## @return {sw:integer}\n  _local x << 1\n  ## not doc\n  >> x\n_endmethod\n";
        let method = first_of(source, SyntaxKind::METHOD_DEFINITION);

        assert_eq!(doc_lines(&method), vec!["Does b.", "@return {sw:integer}"]);
        assert_eq!(doc_text(&method).as_deref(), Some("Does b."));
    }

    #[test]
    fn test_method_doc_with_empty_body() {
        let source = "_method a.b\n  ## Only doc.\n_endmethod\n";
        let method = first_of(source, SyntaxKind::METHOD_DEFINITION);

        assert_eq!(doc_text(&method).as_deref(), Some("Only doc."));
    }

    #[test]
    fn test_statement_doc_inside_invocation() {
        let source = "def_slotted_exemplar(:test,\n  ## Test exemplar.\n  ## @slot {sw:integer} slot_a\n  {{:slot_a, _unset}})\n";
        let statement = first_of(source, SyntaxKind::EXPRESSION_STATEMENT);

        assert_eq!(doc_lines(&statement).len(), 2);
        assert_eq!(doc_text(&statement).as_deref(), Some("Test exemplar."));
    }

    #[test]
    fn test_nested_proc_doc_is_skipped() {
        let source = "_global g << _proc()\n  ## Proc doc.\n_endproc\n";
        let statement = first_of(source, SyntaxKind::VARIABLE_DEFINITION_STATEMENT);
        let proc_node = first_of(source, SyntaxKind::PROC_DEFINITION);

        assert!(doc_text(&statement).is_none());
        assert_eq!(doc_text(&proc_node).as_deref(), Some("Proc doc."));
    }
}
