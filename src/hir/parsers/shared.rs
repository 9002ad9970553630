//! Shared variables and constants.
//!
//! ```text
//! exemplar.define_shared_variable(:name, value, :flavour)
//! exemplar.define_shared_constant(:name, value, :flavour)
//! ```
//!
//! A shared variable yields a getter, a setter (`name<<`) and a boot
//! setter (`name<<<`). The getter is public for `:readonly` and `:public`;
//! the setters only for `:public`. A shared constant yields only a getter,
//! public for `:public`.

use super::{Accessors, ParseContext, TopLevelInvocation, accepted, top_level_invocation};
use crate::hir::definitions::Definition;
use crate::hir::error::MalformedConstruct;
use crate::hir::typing::{TypeDoc, TypeString};
use crate::syntax::SyntaxNode;

pub(super) const DEFINE_SHARED_VARIABLE: &str = "define_shared_variable";
pub(super) const DEFINE_SHARED_CONSTANT: &str = "define_shared_constant";

struct Shape {
    invocation: TopLevelInvocation,
    name: String,
    flavour: String,
}

fn shape(node: &SyntaxNode, method_name: &str) -> Option<Shape> {
    let invocation = top_level_invocation(node, method_name)?;
    let name = invocation.arguments.symbol(0)?;
    let flavour = invocation.arguments.symbol(2)?;
    Some(Shape {
        invocation,
        name,
        flavour,
    })
}

fn variable_shape(node: &SyntaxNode) -> Option<Shape> {
    shape(node, "define_shared_variable()")
}

fn constant_shape(node: &SyntaxNode) -> Option<Shape> {
    shape(node, "define_shared_constant()")
}

pub(super) fn matches_variable(node: &SyntaxNode) -> bool {
    variable_shape(node).is_some()
}

pub(super) fn matches_constant(node: &SyntaxNode) -> bool {
    constant_shape(node).is_some()
}

/// Declared type: `@type`, else the first `@return`.
fn declared_type(doc: &TypeDoc) -> TypeString {
    doc.type_string
        .clone()
        .or_else(|| doc.returns.first().cloned())
        .unwrap_or(TypeString::Undefined)
}

fn accessors_of(shape: &Shape, cx: &ParseContext, build: impl FnOnce(&Accessors<'_>) -> Vec<Definition>) -> Vec<Definition> {
    let statement = &shape.invocation.statement;
    let doc = TypeDoc::of_node(statement, &cx.package);
    let provenance = cx.provenance(statement, statement);
    let exemplar = cx.type_of(&shape.invocation.receiver);
    let value_type = declared_type(&doc);
    build(&Accessors {
        provenance: &provenance,
        exemplar: &exemplar,
        name: &shape.name,
        value_type: &value_type,
    })
}

pub(super) fn parse_variable(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(variable_shape(node), DEFINE_SHARED_VARIABLE) else {
        return Ok(Vec::new());
    };
    let getter_private = !matches!(shape.flavour.as_str(), "readonly" | "public");
    let setter_private = shape.flavour != "public";
    Ok(accessors_of(&shape, cx, |accessors| {
        accessors.triple(getter_private, setter_private)
    }))
}

pub(super) fn parse_constant(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(constant_shape(node), DEFINE_SHARED_CONSTANT) else {
        return Ok(Vec::new());
    };
    let private = shape.flavour != "public";
    Ok(accessors_of(&shape, cx, |accessors| vec![accessors.getter(private)]))
}
