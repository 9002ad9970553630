//! `condition.define_condition(:name, :parent, {:data ...})`

use smol_str::SmolStr;

use super::{ParseContext, TopLevelInvocation, accepted, top_level_invocation};
use crate::hir::definitions::{ConditionDefinition, Definition};
use crate::hir::error::MalformedConstruct;
use crate::syntax::SyntaxNode;
use crate::syntax::ast;

pub(super) const DEFINE_CONDITION: &str = "define_condition";

struct Shape {
    invocation: TopLevelInvocation,
    name: String,
    parent: Option<String>,
    data_names: Vec<String>,
}

fn shape(node: &SyntaxNode) -> Option<Shape> {
    let invocation = top_level_invocation(node, "define_condition()")?;
    if !matches!(invocation.receiver.as_str(), "condition" | "sw:condition") {
        return None;
    }
    let name = invocation.arguments.symbol(0)?;
    let parent = invocation.arguments.symbol(1);
    let data_names = match invocation.arguments.simple_vector(2) {
        Some(vector) => vector.items().iter().map(ast::as_symbol).collect::<Option<Vec<_>>>()?,
        None => Vec::new(),
    };
    Some(Shape {
        invocation,
        name,
        parent,
        data_names,
    })
}

pub(super) fn matches(node: &SyntaxNode) -> bool {
    shape(node).is_some()
}

pub(super) fn parse(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node), DEFINE_CONDITION) else {
        return Ok(Vec::new());
    };
    let statement = &shape.invocation.statement;
    let definition = ConditionDefinition {
        provenance: cx.provenance(statement, statement),
        name: shape.name.into(),
        parent: shape.parent.map(SmolStr::from),
        data_names: shape.data_names.into_iter().map(SmolStr::from).collect(),
    };
    Ok(vec![definition.into()])
}
