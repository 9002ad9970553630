//! Exemplar-defining procedures.
//!
//! ```text
//! def_slotted_exemplar(:name, {{:slot, value [, :flavour]} ...} [, parents])
//! def_indexed_exemplar(:name, element_class [, parents])
//! def_mixin(:name [, parents])
//! def_enumeration(:name, ...)
//! ```
//!
//! Slots flavoured `:readable` get a public getter; `:writable` and
//! `:public` slots get getter, setter and boot setter.

use super::{Accessors, ParseContext, accepted, parent_types, statement_of};
use crate::hir::definitions::{Definition, ExemplarDefinition, ExemplarKind, SlotDefinition};
use crate::hir::error::MalformedConstruct;
use crate::hir::typing::{TypeDoc, TypeString};
use crate::syntax::SyntaxNode;
use crate::syntax::ast::{self, Arguments, AstNode, ProcedureInvocation, SimpleVector};

pub(super) const DEF_SLOTTED_EXEMPLAR: &str = "def_slotted_exemplar";
pub(super) const DEF_INDEXED_EXEMPLAR: &str = "def_indexed_exemplar";
pub(super) const DEF_MIXIN: &str = "def_mixin";
pub(super) const DEF_ENUMERATION: &str = "def_enumeration";

struct Shape {
    name: String,
    arguments: Arguments,
}

fn shape(node: &SyntaxNode, procedure: &str) -> Option<Shape> {
    let invocation = ProcedureInvocation::cast(node.clone())?;
    if !invocation.is_invocation_of(procedure) {
        return None;
    }
    let arguments = invocation.arguments()?;
    let name = arguments.symbol(0)?;
    Some(Shape { name, arguments })
}

fn slotted_shape(node: &SyntaxNode) -> Option<(Shape, SimpleVector)> {
    let shape = shape(node, DEF_SLOTTED_EXEMPLAR)?;
    let slots = shape.arguments.simple_vector(1)?;
    Some((shape, slots))
}

pub(super) fn matches_slotted(node: &SyntaxNode) -> bool {
    slotted_shape(node).is_some()
}

pub(super) fn matches_indexed(node: &SyntaxNode) -> bool {
    shape(node, DEF_INDEXED_EXEMPLAR).is_some()
}

pub(super) fn matches_mixin(node: &SyntaxNode) -> bool {
    shape(node, DEF_MIXIN).is_some()
}

pub(super) fn matches_enumeration(node: &SyntaxNode) -> bool {
    shape(node, DEF_ENUMERATION).is_some()
}

fn exemplar(
    node: &SyntaxNode,
    cx: &ParseContext,
    kind: ExemplarKind,
    name: &str,
    slots: Vec<SlotDefinition>,
    parents: Vec<TypeString>,
) -> ExemplarDefinition {
    let statement = statement_of(node);
    ExemplarDefinition {
        provenance: cx.provenance(&statement, &statement),
        kind,
        type_string: cx.type_of(name),
        slots,
        parents,
    }
}

pub(super) fn parse_slotted(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some((shape, slot_vector)) = accepted(slotted_shape(node), DEF_SLOTTED_EXEMPLAR) else {
        return Ok(Vec::new());
    };
    let statement = statement_of(node);
    let doc = TypeDoc::of_node(&statement, &cx.package);

    let mut slots = Vec::new();
    let mut flavours = Vec::new();
    for item in slot_vector.items() {
        let entry = SimpleVector::cast(item.clone())
            .map(|v| v.items())
            .ok_or_else(|| {
                MalformedConstruct::new(DEF_SLOTTED_EXEMPLAR, "slot is not a vector", ast::significant_range(&item))
            })?;
        let name = entry.first().and_then(ast::as_symbol).ok_or_else(|| {
            MalformedConstruct::new(
                DEF_SLOTTED_EXEMPLAR,
                "slot name is not a symbol",
                ast::significant_range(&item),
            )
        })?;
        flavours.push(entry.get(2).and_then(ast::as_symbol));
        slots.push(SlotDefinition {
            type_string: doc.slot_type(&name),
            name: name.into(),
        });
    }
    let parents = parent_types(shape.arguments.expression(2), cx, DEF_SLOTTED_EXEMPLAR)?;

    let definition = exemplar(node, cx, ExemplarKind::Slotted, &shape.name, slots, parents);
    let mut definitions = Vec::new();
    for (slot, flavour) in definition.slots.iter().zip(&flavours) {
        let accessors = Accessors {
            provenance: &definition.provenance,
            exemplar: &definition.type_string,
            name: &slot.name,
            value_type: &slot.type_string,
        };
        match flavour.as_deref() {
            Some("readable") => definitions.push(accessors.getter(false)),
            Some("writable" | "public") => definitions.extend(accessors.triple(false, false)),
            _ => {}
        }
    }
    definitions.insert(0, definition.into());
    Ok(definitions)
}

pub(super) fn parse_indexed(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node, DEF_INDEXED_EXEMPLAR), DEF_INDEXED_EXEMPLAR) else {
        return Ok(Vec::new());
    };
    let parents = parent_types(shape.arguments.expression(2), cx, DEF_INDEXED_EXEMPLAR)?;
    let definition = exemplar(node, cx, ExemplarKind::Indexed, &shape.name, Vec::new(), parents);
    Ok(vec![definition.into()])
}

pub(super) fn parse_mixin(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node, DEF_MIXIN), DEF_MIXIN) else {
        return Ok(Vec::new());
    };
    let parents = parent_types(shape.arguments.expression(1), cx, DEF_MIXIN)?;
    let definition = exemplar(node, cx, ExemplarKind::Mixin, &shape.name, Vec::new(), parents);
    Ok(vec![definition.into()])
}

/// Enumerations are slotted exemplars inheriting `sw:enumeration_value`.
pub(super) fn parse_enumeration(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node, DEF_ENUMERATION), DEF_ENUMERATION) else {
        return Ok(Vec::new());
    };
    let definition = exemplar(
        node,
        cx,
        ExemplarKind::Slotted,
        &shape.name,
        Vec::new(),
        vec![TypeString::SW_ENUMERATION_VALUE],
    );
    Ok(vec![definition.into()])
}

#[cfg(test)]
mod tests {
    use crate::hir::definitions::ExemplarKind;
    use crate::hir::parsers::test_support::{methods, read};
    use crate::hir::typing::TypeString;

    #[test]
    fn test_slotted_exemplar_with_slots_and_parents() {
        let source = "\
def_slotted_exemplar(:test_exemplar,
    ## A test exemplar.
    ## @slot {sw:integer} slot_a
    {
        {:slot_a, _unset},
        {:slot_b, _unset, :readable},
        {:slot_c, _unset, :writable}
    },
    {:mixin_a, :sw:mixin_b})
";
        let result = read(source);
        let exemplar = result.definitions[0].as_exemplar().unwrap();

        assert_eq!(exemplar.kind, ExemplarKind::Slotted);
        assert_eq!(exemplar.type_string, TypeString::simple("user", "test_exemplar"));
        assert_eq!(exemplar.slots.len(), 3);
        assert_eq!(exemplar.slots[0].type_string, TypeString::SW_INTEGER);
        assert_eq!(
            exemplar.parents,
            vec![TypeString::simple("user", "mixin_a"), TypeString::simple("sw", "mixin_b")]
        );
        assert_eq!(result.definitions[0].doc(), Some("A test exemplar."));

        let names: Vec<_> = methods(&result).iter().map(|m| m.name.to_string()).collect();
        assert_eq!(names, vec!["slot_b", "slot_c", "slot_c<<", "slot_c<<<"]);
        assert!(methods(&result).iter().all(|m| !m.is_private()));
    }

    #[test]
    fn test_malformed_slot_is_reported() {
        let result = read("def_slotted_exemplar(:broken, {:not_a_vector})");

        assert!(result.definitions.is_empty());
        assert_eq!(result.problems.len(), 1);
        assert_eq!(result.problems[0].construct, "def_slotted_exemplar");
    }

    #[test]
    fn test_indexed_exemplar_and_mixin() {
        let result = read("def_indexed_exemplar(:rope_like, _unset, :sw:rope)\ndef_mixin(:able)\n");

        let indexed = result.definitions[0].as_exemplar().unwrap();
        assert_eq!(indexed.kind, ExemplarKind::Indexed);
        assert_eq!(indexed.parents, vec![TypeString::simple("sw", "rope")]);

        let mixin = result.definitions[1].as_exemplar().unwrap();
        assert_eq!(mixin.kind, ExemplarKind::Mixin);
        assert!(mixin.parents.is_empty());
    }

    #[test]
    fn test_enumeration_inherits_enumeration_value() {
        let result = read("def_enumeration(:colour, _unset, :red, :green)");
        let exemplar = result.definitions[0].as_exemplar().unwrap();

        assert_eq!(exemplar.kind, ExemplarKind::Slotted);
        assert_eq!(exemplar.parents, vec![TypeString::SW_ENUMERATION_VALUE]);
    }
}
