//! `define_binary_operator_case(:op, lhs, rhs, _proc(a, b) ... _endproc)`

use super::{ParseContext, accepted, statement_of};
use crate::hir::definitions::{BinaryOperatorDefinition, Definition};
use crate::hir::error::MalformedConstruct;
use crate::hir::typing::{TypeDoc, TypeString};
use crate::syntax::ast::{AstNode, Identifier, ProcDefinition, ProcedureInvocation};
use crate::syntax::SyntaxNode;

pub(super) const DEFINE_BINARY_OPERATOR_CASE: &str = "define_binary_operator_case";

struct Shape {
    operator: String,
    lhs: String,
    rhs: String,
    procedure: ProcDefinition,
}

fn shape(node: &SyntaxNode) -> Option<Shape> {
    let invocation = ProcedureInvocation::cast(node.clone())?;
    if !invocation.is_invocation_of(DEFINE_BINARY_OPERATOR_CASE) {
        return None;
    }
    let arguments = invocation.arguments()?;
    Some(Shape {
        operator: arguments.symbol(0)?,
        lhs: Identifier::cast(arguments.expression(1)?)?.name(),
        rhs: Identifier::cast(arguments.expression(2)?)?.name(),
        procedure: ProcDefinition::cast(arguments.expression(3)?)?,
    })
}

pub(super) fn matches(node: &SyntaxNode) -> bool {
    shape(node).is_some()
}

pub(super) fn parse(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node), DEFINE_BINARY_OPERATOR_CASE) else {
        return Ok(Vec::new());
    };
    let doc = TypeDoc::of_node(shape.procedure.syntax(), &cx.package);
    let statement = statement_of(node);
    let definition = BinaryOperatorDefinition {
        provenance: cx.provenance(&statement, shape.procedure.syntax()),
        package: cx.package.clone(),
        operator: shape.operator.into(),
        lhs: cx.type_of(&shape.lhs),
        rhs: cx.type_of(&shape.rhs),
        result: doc.returns.first().cloned().unwrap_or(TypeString::Undefined),
    };
    Ok(vec![definition.into()])
}
