//! `_method exemplar.name(params) ... _endmethod`

use std::collections::BTreeSet;

use rowan::WalkEvent;
use smol_str::SmolStr;

use super::{ParseContext, accepted};
use crate::hir::definitions::{Definition, MethodDefinition, MethodModifier, ParameterDefinition};
use crate::hir::error::MalformedConstruct;
use crate::hir::typing::{ExpressionResultString, TypeDoc};
use crate::syntax::ast::{self, AstNode, Identifier, MethodInvocation, Parameter};
use crate::syntax::{SyntaxKind, SyntaxNode};

const METHOD: &str = "_method";

struct Shape {
    method: ast::MethodDefinition,
    exemplar: String,
    name: String,
}

fn shape(node: &SyntaxNode) -> Option<Shape> {
    let method = ast::MethodDefinition::cast(node.clone())?;
    let exemplar = method.exemplar_name()?;
    let name = method.method_name()?;
    Some(Shape { method, exemplar, name })
}

pub(super) fn matches(node: &SyntaxNode) -> bool {
    shape(node).is_some()
}

pub(super) fn parse(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node), METHOD) else {
        return Ok(Vec::new());
    };
    let method = &shape.method;
    let doc = TypeDoc::of_node(node, &cx.package);

    let mut modifiers = BTreeSet::new();
    if method.is_private() {
        modifiers.insert(MethodModifier::Private);
    }
    if method.is_abstract() {
        modifiers.insert(MethodModifier::Abstract);
    }
    if method.is_iter() {
        modifiers.insert(MethodModifier::Iter);
    }

    let parameters = method
        .parameters()
        .iter()
        .filter_map(|p| parameter_definition(p, &doc))
        .collect();
    let assignment_parameter = method
        .assignment_parameter()
        .and_then(|p| parameter_definition(&p, &doc));

    let body = method.body();
    let return_types = doc.return_result().unwrap_or_else(|| {
        if method.is_abstract() || body.as_ref().is_some_and(returns_value) {
            ExpressionResultString::undefined()
        } else {
            ExpressionResultString::empty()
        }
    });
    let loop_types = doc.loop_result().unwrap_or_else(|| {
        if method.is_iter() {
            ExpressionResultString::undefined()
        } else {
            ExpressionResultString::empty()
        }
    });

    let definition = MethodDefinition {
        provenance: cx.provenance(node, node),
        exemplar: cx.type_of(&shape.exemplar),
        name: shape.name.into(),
        modifiers,
        parameters,
        assignment_parameter,
        conditions: body.as_ref().map(raised_conditions).unwrap_or_default(),
        return_types,
        loop_types,
    };
    Ok(vec![definition.into()])
}

pub(super) fn parameter_definition(parameter: &Parameter, doc: &TypeDoc) -> Option<ParameterDefinition> {
    let token = parameter.name_token()?;
    let name = token.text();
    Some(ParameterDefinition {
        name: name.into(),
        modifier: parameter.modifier(),
        type_string: doc.parameter_type(name),
        range: Some(token.text_range()),
    })
}

/// Nodes under `body` that belong to it, not to nested procedures.
fn own_nodes(body: &SyntaxNode) -> Vec<SyntaxNode> {
    let mut nodes = Vec::new();
    let mut walk = body.preorder();
    while let Some(event) = walk.next() {
        if let WalkEvent::Enter(node) = event {
            if node.kind() == SyntaxKind::PROC_DEFINITION {
                walk.skip_subtree();
                continue;
            }
            nodes.push(node);
        }
    }
    nodes
}

/// Whether the body returns a value, via `_return x` or a top-level `>> x`.
pub(super) fn returns_value(body: &SyntaxNode) -> bool {
    own_nodes(body).iter().any(|node| match node.kind() {
        SyntaxKind::RETURN_STATEMENT => ast::expressions(node).next().is_some(),
        SyntaxKind::EMIT_STATEMENT => node.parent().as_ref() == Some(body),
        _ => false,
    })
}

/// Conditions raised with `condition.raise(:name, ...)`.
pub(super) fn raised_conditions(body: &SyntaxNode) -> BTreeSet<SmolStr> {
    own_nodes(body)
        .into_iter()
        .filter_map(MethodInvocation::cast)
        .filter(|invocation| invocation.method_name().as_deref() == Some("raise()"))
        .filter(|invocation| {
            invocation
                .receiver()
                .and_then(Identifier::cast)
                .is_some_and(|r| matches!(r.name().as_str(), "condition" | "sw:condition"))
        })
        .filter_map(|invocation| invocation.arguments()?.symbol(0))
        .map(SmolStr::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::hir::definitions::ParameterModifier;
    use crate::hir::parsers::test_support::{methods, read};
    use crate::hir::typing::{ExpressionResultString, TypeString};

    #[test]
    fn test_method_with_documented_types() {
        let source = "\
_package sw
_private _method rope.add(item, _optional position)
    ## Add item.
    ## @param {sw:integer} item
    ## @return {_self}
    >> _self
_endmethod
";
        let result = read(source);
        let method = &methods(&result)[0];

        assert_eq!(method.signature(), "sw:rope.add()");
        assert!(method.is_private());
        assert_eq!(method.parameters.len(), 2);
        assert_eq!(method.parameters[0].type_string, TypeString::SW_INTEGER);
        assert_eq!(method.parameters[1].modifier, ParameterModifier::Optional);
        assert!(method.parameters[1].type_string.is_undefined());
        assert_eq!(method.return_types, ExpressionResultString::single(TypeString::SELF));
        assert_eq!(result.definitions[0].doc(), Some("Add item."));
    }

    #[test]
    fn test_undocumented_return_types() {
        let source = "\
_method thing.valued >> 1 _endmethod
_method thing.plain show(1) _endmethod
_abstract _method thing.abstract() _endmethod
_iter _method thing.items() _endmethod
";
        let result = read(source);
        let methods = methods(&result);

        assert!(methods[0].return_types.is_undefined());
        assert!(methods[1].return_types.is_empty());
        assert!(methods[2].return_types.is_undefined());
        assert!(methods[3].loop_types.is_undefined());
        assert!(methods[1].loop_types.is_empty());
    }

    #[test]
    fn test_nested_proc_return_does_not_count() {
        let source = "_method thing.make_proc _local p << _proc() >> 1 _endproc _endmethod";
        let result = read(source);

        assert!(methods(&result)[0].return_types.is_empty());
    }

    #[test]
    fn test_raised_conditions() {
        let source = "\
_method thing.check(x)
    _if x _is _unset
    _then
        condition.raise(:unset_value, :value, x)
    _endif
_endmethod
";
        let result = read(source);
        let conditions: Vec<_> = methods(&result)[0].conditions.iter().cloned().collect();

        assert_eq!(conditions, vec!["unset_value"]);
    }

    #[test]
    fn test_assignment_method() {
        let result = read("_method thing.value << new_value\n## @param {sw:integer} new_value\n_endmethod");
        let method = &methods(&result)[0];

        assert_eq!(method.name, "value<<");
        let parameter = method.assignment_parameter.as_ref().unwrap();
        assert_eq!(parameter.name, "new_value");
        assert_eq!(parameter.type_string, TypeString::SW_INTEGER);
    }
}
