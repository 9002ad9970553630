//! Top-level `_global name << value`.
//!
//! A global bound to a `_proc` becomes a procedure definition, anything
//! else a global definition.

use std::collections::BTreeSet;

use super::method::{parameter_definition, returns_value};
use super::{ParseContext, accepted};
use crate::hir::definitions::{Definition, GlobalDefinition, MethodModifier, ProcedureDefinition};
use crate::hir::error::MalformedConstruct;
use crate::hir::reasoner::literal_type;
use crate::hir::typing::{ExpressionResultString, TypeDoc, TypeString};
use crate::syntax::SyntaxNode;
use crate::syntax::ast::{self, AstNode, ProcDefinition, VariableDefinitionStatement};

const GLOBAL: &str = "_global";

struct Shape {
    statement: VariableDefinitionStatement,
}

fn shape(node: &SyntaxNode) -> Option<Shape> {
    let statement = VariableDefinitionStatement::cast(node.clone())?;
    if !statement.is_global() || !ast::is_top_level_statement(node) {
        return None;
    }
    Some(Shape { statement })
}

pub(super) fn matches(node: &SyntaxNode) -> bool {
    shape(node).is_some()
}

pub(super) fn parse(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node), GLOBAL) else {
        return Ok(Vec::new());
    };
    let doc = TypeDoc::of_node(node, &cx.package);
    let constant = shape.statement.is_constant();
    let mut definitions = Vec::new();

    for definition in shape.statement.definitions() {
        let Some(identifier) = definition.identifier() else {
            continue;
        };
        let type_string = cx.type_of(&identifier.name());
        let value = definition.value();

        if let Some(procedure) = value.clone().and_then(ProcDefinition::cast) {
            definitions.push(procedure_definition(node, &procedure, type_string, cx).into());
            continue;
        }

        let value_type = doc
            .type_string
            .clone()
            .or_else(|| value.as_ref().and_then(literal_type))
            .unwrap_or(TypeString::Undefined);
        definitions.push(
            GlobalDefinition {
                provenance: cx.provenance(node, node),
                type_string,
                value_type,
                constant,
            }
            .into(),
        );
    }

    if let Some(multiple) = shape.statement.multiple_definition() {
        for identifier in multiple.identifiers() {
            definitions.push(
                GlobalDefinition {
                    provenance: cx.provenance(node, node),
                    type_string: cx.type_of(&identifier.name()),
                    value_type: TypeString::Undefined,
                    constant,
                }
                .into(),
            );
        }
    }

    Ok(definitions)
}

fn procedure_definition(
    statement: &SyntaxNode,
    procedure: &ProcDefinition,
    type_string: TypeString,
    cx: &ParseContext,
) -> ProcedureDefinition {
    let doc = TypeDoc::of_node(procedure.syntax(), &cx.package);
    let mut modifiers = BTreeSet::new();
    if procedure.is_iter() {
        modifiers.insert(MethodModifier::Iter);
    }
    let return_types = doc.return_result().unwrap_or_else(|| {
        if procedure.body().as_ref().is_some_and(returns_value) {
            ExpressionResultString::undefined()
        } else {
            ExpressionResultString::empty()
        }
    });
    let loop_types = doc.loop_result().unwrap_or_else(|| {
        if procedure.is_iter() {
            ExpressionResultString::undefined()
        } else {
            ExpressionResultString::empty()
        }
    });

    ProcedureDefinition {
        provenance: cx.provenance(statement, procedure.syntax()),
        type_string,
        modifiers,
        parameters: procedure
            .parameters()
            .iter()
            .filter_map(|p| parameter_definition(p, &doc))
            .collect(),
        return_types,
        loop_types,
    }
}
