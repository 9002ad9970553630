//! Definition parsers — one per recognized construct.
//!
//! Every construct pairs a predicate (`matches`) with an extraction
//! (`parse`). Both go through the same shape function, so a node the
//! predicate accepts can always be destructured by the parser. Constructs
//! are tried in a fixed priority order per dispatch point; the first match
//! wins and a node matches at most one construct.
//!
//! Dispatch points:
//!
//! | Node                            | Constructs                                   |
//! |---------------------------------|----------------------------------------------|
//! | `METHOD_DEFINITION`             | `_method`                                    |
//! | `VARIABLE_DEFINITION_STATEMENT` | `_global`                                    |
//! | `PROCEDURE_INVOCATION`          | `def_package`, `def_enumeration`, `def_slotted_exemplar`, `def_indexed_exemplar`, `def_mixin`, `define_binary_operator_case` |
//! | `METHOD_INVOCATION`             | `define_slot_access`, `define_shared_variable`, `define_shared_constant`, `define_condition` |

mod condition;
mod exemplar;
mod global;
mod method;
mod operator;
mod package;
mod reader;
mod shared;
mod slot_access;

use std::collections::BTreeSet;
use std::time::SystemTime;

use smol_str::SmolStr;

use super::definitions::{
    Definition, Location, MethodDefinition, MethodModifier, ParameterDefinition, ParameterModifier,
    Provenance,
};
use super::error::MalformedConstruct;
use super::typing::{ExpressionResultString, TypeString};
use crate::base::FileId;
use crate::syntax::ast::{self, AstNode, Identifier, MethodInvocation};
use crate::syntax::{SyntaxKind, SyntaxNode, doc};

pub use reader::{DefinitionReader, ReadResult};

/// Suffix of setter methods.
pub const CHEVRON_SUFFIX: &str = "<<";
/// Suffix of the synthesized boot setter of shared variables and slots.
pub const BOOT_CHEVRON_SUFFIX: &str = "<<<";

// ============================================================================
// PARSE CONTEXT
// ============================================================================

/// Per-file information attached to every parsed definition.
#[derive(Clone, Debug)]
pub struct ParseContext {
    pub file: FileId,
    /// Package in effect at the node being parsed.
    pub package: SmolStr,
    pub module: Option<SmolStr>,
    pub timestamp: Option<SystemTime>,
}

impl ParseContext {
    pub fn new(file: FileId, package: impl Into<SmolStr>) -> Self {
        Self {
            file,
            package: package.into(),
            module: None,
            timestamp: None,
        }
    }

    /// Provenance for a definition spanning `node`, documented by `doc_node`.
    pub(crate) fn provenance(&self, node: &SyntaxNode, doc_node: &SyntaxNode) -> Provenance {
        Provenance {
            location: Some(Location::new(self.file, ast::significant_range(node))),
            module: self.module.clone(),
            timestamp: self.timestamp,
            doc: doc::doc_text(doc_node).map(Into::into),
        }
    }

    pub(crate) fn type_of(&self, identifier: &str) -> TypeString {
        TypeString::of_identifier(identifier, &self.package)
    }
}

// ============================================================================
// CONSTRUCTS
// ============================================================================

/// A construct the reader recognizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Construct {
    MethodDefinition,
    GlobalDefinition,
    DefPackage,
    DefEnumeration,
    DefSlottedExemplar,
    DefIndexedExemplar,
    DefMixin,
    DefineBinaryOperatorCase,
    DefineSlotAccess,
    DefineSharedVariable,
    DefineSharedConstant,
    DefineCondition,
}

const METHOD_DEFINITION_CONSTRUCTS: &[Construct] = &[Construct::MethodDefinition];
const VARIABLE_DEFINITION_CONSTRUCTS: &[Construct] = &[Construct::GlobalDefinition];
const PROCEDURE_INVOCATION_CONSTRUCTS: &[Construct] = &[
    Construct::DefPackage,
    Construct::DefEnumeration,
    Construct::DefSlottedExemplar,
    Construct::DefIndexedExemplar,
    Construct::DefMixin,
    Construct::DefineBinaryOperatorCase,
];
const METHOD_INVOCATION_CONSTRUCTS: &[Construct] = &[
    Construct::DefineSlotAccess,
    Construct::DefineSharedVariable,
    Construct::DefineSharedConstant,
    Construct::DefineCondition,
];

impl Construct {
    /// Constructs to try, in priority order, for a node of `kind`.
    pub fn candidates(kind: SyntaxKind) -> &'static [Construct] {
        match kind {
            SyntaxKind::METHOD_DEFINITION => METHOD_DEFINITION_CONSTRUCTS,
            SyntaxKind::VARIABLE_DEFINITION_STATEMENT => VARIABLE_DEFINITION_CONSTRUCTS,
            SyntaxKind::PROCEDURE_INVOCATION => PROCEDURE_INVOCATION_CONSTRUCTS,
            SyntaxKind::METHOD_INVOCATION => METHOD_INVOCATION_CONSTRUCTS,
            _ => &[],
        }
    }

    /// The first construct accepting `node`.
    pub fn recognize(node: &SyntaxNode) -> Option<Construct> {
        Self::candidates(node.kind())
            .iter()
            .copied()
            .find(|construct| construct.matches(node))
    }

    pub fn name(self) -> &'static str {
        match self {
            Construct::MethodDefinition => "_method",
            Construct::GlobalDefinition => "_global",
            Construct::DefPackage => package::DEF_PACKAGE,
            Construct::DefEnumeration => exemplar::DEF_ENUMERATION,
            Construct::DefSlottedExemplar => exemplar::DEF_SLOTTED_EXEMPLAR,
            Construct::DefIndexedExemplar => exemplar::DEF_INDEXED_EXEMPLAR,
            Construct::DefMixin => exemplar::DEF_MIXIN,
            Construct::DefineBinaryOperatorCase => operator::DEFINE_BINARY_OPERATOR_CASE,
            Construct::DefineSlotAccess => slot_access::DEFINE_SLOT_ACCESS,
            Construct::DefineSharedVariable => shared::DEFINE_SHARED_VARIABLE,
            Construct::DefineSharedConstant => shared::DEFINE_SHARED_CONSTANT,
            Construct::DefineCondition => condition::DEFINE_CONDITION,
        }
    }

    pub fn matches(self, node: &SyntaxNode) -> bool {
        match self {
            Construct::MethodDefinition => method::matches(node),
            Construct::GlobalDefinition => global::matches(node),
            Construct::DefPackage => package::matches(node),
            Construct::DefEnumeration => exemplar::matches_enumeration(node),
            Construct::DefSlottedExemplar => exemplar::matches_slotted(node),
            Construct::DefIndexedExemplar => exemplar::matches_indexed(node),
            Construct::DefMixin => exemplar::matches_mixin(node),
            Construct::DefineBinaryOperatorCase => operator::matches(node),
            Construct::DefineSlotAccess => slot_access::matches(node),
            Construct::DefineSharedVariable => shared::matches_variable(node),
            Construct::DefineSharedConstant => shared::matches_constant(node),
            Construct::DefineCondition => condition::matches(node),
        }
    }

    /// Extract the definitions of an accepted node.
    pub fn parse(
        self,
        node: &SyntaxNode,
        cx: &ParseContext,
    ) -> Result<Vec<Definition>, MalformedConstruct> {
        match self {
            Construct::MethodDefinition => method::parse(node, cx),
            Construct::GlobalDefinition => global::parse(node, cx),
            Construct::DefPackage => package::parse(node, cx),
            Construct::DefEnumeration => exemplar::parse_enumeration(node, cx),
            Construct::DefSlottedExemplar => exemplar::parse_slotted(node, cx),
            Construct::DefIndexedExemplar => exemplar::parse_indexed(node, cx),
            Construct::DefMixin => exemplar::parse_mixin(node, cx),
            Construct::DefineBinaryOperatorCase => operator::parse(node, cx),
            Construct::DefineSlotAccess => slot_access::parse(node, cx),
            Construct::DefineSharedVariable => shared::parse_variable(node, cx),
            Construct::DefineSharedConstant => shared::parse_constant(node, cx),
            Construct::DefineCondition => condition::parse(node, cx),
        }
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Re-extract a shape the predicate accepted.
///
/// A `None` here means predicate and parser disagree, which is a defect.
fn accepted<T>(shape: Option<T>, construct: &'static str) -> Option<T> {
    debug_assert!(
        shape.is_some(),
        "{construct}: predicate accepted a node its parser cannot destructure"
    );
    shape
}

/// A top-level `receiver.name(args)` statement with an identifier receiver.
struct TopLevelInvocation {
    receiver: String,
    arguments: ast::Arguments,
    statement: SyntaxNode,
}

fn top_level_invocation(node: &SyntaxNode, method_name: &str) -> Option<TopLevelInvocation> {
    let invocation = MethodInvocation::cast(node.clone())?;
    if invocation.method_name()? != method_name {
        return None;
    }
    let statement = node.parent()?;
    if statement.kind() != SyntaxKind::EXPRESSION_STATEMENT || !ast::is_top_level_statement(&statement) {
        return None;
    }
    let receiver = Identifier::cast(invocation.receiver()?)?.name();
    let arguments = invocation.arguments()?;
    Some(TopLevelInvocation {
        receiver,
        arguments,
        statement,
    })
}

/// The statement containing a procedure invocation, or the invocation itself.
fn statement_of(node: &SyntaxNode) -> SyntaxNode {
    ast::enclosing_statement(node).unwrap_or_else(|| node.clone())
}

/// Parent references from a symbol or a simple vector of symbols.
fn parent_types(
    node: Option<SyntaxNode>,
    cx: &ParseContext,
    construct: &'static str,
) -> Result<Vec<TypeString>, MalformedConstruct> {
    let Some(node) = node else {
        return Ok(Vec::new());
    };
    if let Some(name) = ast::as_symbol(&node) {
        return Ok(vec![cx.type_of(&name)]);
    }
    if let Some(vector) = ast::SimpleVector::cast(node.clone()) {
        return vector
            .items()
            .iter()
            .map(|item| {
                ast::as_symbol(item).map(|name| cx.type_of(&name)).ok_or_else(|| {
                    MalformedConstruct::new(
                        construct,
                        "parent is not a symbol",
                        ast::significant_range(item),
                    )
                })
            })
            .collect();
    }
    if node.kind() == SyntaxKind::ATOM && ast::significant_text(&node) == "_unset" {
        return Ok(Vec::new());
    }
    Err(MalformedConstruct::new(
        construct,
        "parents must be a symbol or a vector of symbols",
        ast::significant_range(&node),
    ))
}

/// Accessor methods synthesized for slots and shared variables.
struct Accessors<'a> {
    provenance: &'a Provenance,
    exemplar: &'a TypeString,
    name: &'a str,
    value_type: &'a TypeString,
}

impl Accessors<'_> {
    fn method(&self, name: String, private: bool) -> MethodDefinition {
        let mut modifiers = BTreeSet::new();
        if private {
            modifiers.insert(MethodModifier::Private);
        }
        MethodDefinition {
            provenance: self.provenance.clone(),
            exemplar: self.exemplar.clone(),
            name: name.into(),
            modifiers,
            parameters: Vec::new(),
            assignment_parameter: None,
            conditions: BTreeSet::new(),
            return_types: ExpressionResultString::single(self.value_type.clone()),
            loop_types: ExpressionResultString::empty(),
        }
    }

    fn getter(&self, private: bool) -> Definition {
        self.method(self.name.to_string(), private).into()
    }

    fn setter(&self, suffix: &str, private: bool) -> Definition {
        let mut method = self.method(format!("{}{suffix}", self.name), private);
        method.assignment_parameter = Some(ParameterDefinition::new(
            "val",
            ParameterModifier::None,
            self.value_type.clone(),
        ));
        method.into()
    }

    /// Getter, setter and boot setter.
    fn triple(&self, getter_private: bool, setter_private: bool) -> Vec<Definition> {
        vec![
            self.getter(getter_private),
            self.setter(CHEVRON_SUFFIX, setter_private),
            self.setter(BOOT_CHEVRON_SUFFIX, setter_private),
        ]
    }
}
