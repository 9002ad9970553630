//! `exemplar.define_slot_access(:slot, :read|:write [, :public])`

use super::{Accessors, ParseContext, TopLevelInvocation, accepted, top_level_invocation};
use crate::hir::definitions::Definition;
use crate::hir::error::MalformedConstruct;
use crate::hir::typing::{TypeDoc, TypeString};
use crate::syntax::SyntaxNode;
use crate::syntax::ast;

pub(super) const DEFINE_SLOT_ACCESS: &str = "define_slot_access";

struct Shape {
    invocation: TopLevelInvocation,
    slot: String,
    writable: bool,
    public: bool,
}

fn shape(node: &SyntaxNode) -> Option<Shape> {
    let invocation = top_level_invocation(node, "define_slot_access()")?;
    let slot = invocation.arguments.symbol(0)?;
    let writable = match invocation.arguments.symbol(1)?.as_str() {
        "read" | "readable" => false,
        "write" | "writable" => true,
        _ => return None,
    };
    // The third argument is either `:public` or a boolean "private?" flag.
    let public = match invocation.arguments.expression(2) {
        Some(flag) => {
            ast::as_symbol(&flag).as_deref() == Some("public") || ast::significant_text(&flag) == "_false"
        }
        None => false,
    };
    Some(Shape {
        invocation,
        slot,
        writable,
        public,
    })
}

pub(super) fn matches(node: &SyntaxNode) -> bool {
    shape(node).is_some()
}

pub(super) fn parse(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node), DEFINE_SLOT_ACCESS) else {
        return Ok(Vec::new());
    };
    let statement = &shape.invocation.statement;
    let doc = TypeDoc::of_node(statement, &cx.package);
    let provenance = cx.provenance(statement, statement);
    let exemplar = cx.type_of(&shape.invocation.receiver);
    let value_type = doc.type_string.clone().unwrap_or(TypeString::Undefined);
    let accessors = Accessors {
        provenance: &provenance,
        exemplar: &exemplar,
        name: &shape.slot,
        value_type: &value_type,
    };

    let private = !shape.public;
    Ok(if shape.writable {
        accessors.triple(private, private)
    } else {
        vec![accessors.getter(private)]
    })
}

#[cfg(test)]
mod tests {
    use crate::hir::parsers::test_support::{methods, read};

    #[test]
    fn test_read_access_is_private_by_default() {
        let result = read("test_exemplar.define_slot_access(:slot_a, :read)");
        let methods = methods(&result);

        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "slot_a");
        assert!(methods[0].is_private());
    }

    #[test]
    fn test_public_write_access() {
        let result = read("test_exemplar.define_slot_access(:slot_a, :write, :public)");
        let methods = methods(&result);

        let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["slot_a", "slot_a<<", "slot_a<<<"]);
        assert!(methods.iter().all(|m| !m.is_private()));
        assert_eq!(methods[0].signature(), "user:test_exemplar.slot_a");
    }
}
