//! Typed AST wrappers over the untyped rowan CST.
//!
//! Each struct wraps a SyntaxNode and provides accessors for the parts the
//! definition parsers, scope builder and type reasoner need.

use super::syntax_kind::SyntaxKind;
use super::{SyntaxElement, SyntaxNode, SyntaxToken};
use rowan::TextRange;

/// Trait for AST nodes that wrap a SyntaxNode
pub trait AstNode: Sized {
    fn can_cast(kind: SyntaxKind) -> bool;
    fn cast(node: SyntaxNode) -> Option<Self>;
    fn syntax(&self) -> &SyntaxNode;
}

// ============================================================================
// Helper macros
// ============================================================================

macro_rules! ast_node {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl AstNode for $name {
            fn can_cast(kind: SyntaxKind) -> bool {
                kind == SyntaxKind::$kind
            }

            fn cast(node: SyntaxNode) -> Option<Self> {
                if Self::can_cast(node.kind()) {
                    Some(Self(node))
                } else {
                    None
                }
            }

            fn syntax(&self) -> &SyntaxNode {
                &self.0
            }
        }
    };
}

// ============================================================================
// Free helpers
// ============================================================================

/// Non-trivia tokens directly or indirectly under `node`.
pub fn significant_tokens(node: &SyntaxNode) -> impl Iterator<Item = SyntaxToken> {
    node.descendants_with_tokens()
        .filter_map(SyntaxElement::into_token)
        .filter(|t| !t.kind().is_trivia())
}

/// Source text of `node` with comments and whitespace dropped.
pub fn significant_text(node: &SyntaxNode) -> String {
    significant_tokens(node).map(|t| t.text().to_string()).collect()
}

/// Range from the first to the last non-trivia token of `node`.
pub fn significant_range(node: &SyntaxNode) -> TextRange {
    let mut tokens = significant_tokens(node);
    match tokens.next() {
        Some(first) => {
            let last = tokens.last().unwrap_or_else(|| first.clone());
            TextRange::new(first.text_range().start(), last.text_range().end())
        }
        None => node.text_range(),
    }
}

/// Child nodes that are expressions.
pub fn expressions(node: &SyntaxNode) -> impl Iterator<Item = SyntaxNode> {
    node.children().filter(|n| n.kind().is_expression())
}

/// First direct child token of the given kind.
pub fn child_token(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxToken> {
    node.children_with_tokens()
        .filter_map(SyntaxElement::into_token)
        .find(|t| t.kind() == kind)
}

/// Whether `node` is a statement directly under the top level of its file.
pub fn is_top_level_statement(node: &SyntaxNode) -> bool {
    node.parent()
        .is_some_and(|parent| parent.kind() == SyntaxKind::SOURCE_FILE)
}

/// The statement enclosing `node`, if any.
pub fn enclosing_statement(node: &SyntaxNode) -> Option<SyntaxNode> {
    node.ancestors().find(|n| {
        matches!(
            n.kind(),
            SyntaxKind::EXPRESSION_STATEMENT
                | SyntaxKind::VARIABLE_DEFINITION_STATEMENT
                | SyntaxKind::METHOD_DEFINITION
                | SyntaxKind::RETURN_STATEMENT
                | SyntaxKind::EMIT_STATEMENT
        )
    })
}

// ============================================================================
// Root
// ============================================================================

ast_node!(SourceFile, SOURCE_FILE);

impl SourceFile {
    pub fn statements(&self) -> impl Iterator<Item = SyntaxNode> + '_ {
        self.0.children()
    }
}

ast_node!(PackageSpecification, PACKAGE_SPECIFICATION);

impl PackageSpecification {
    pub fn name(&self) -> Option<String> {
        child_token(&self.0, SyntaxKind::IDENT).map(|t| t.text().to_string())
    }
}

// ============================================================================
// Identifiers and atoms
// ============================================================================

ast_node!(Identifier, IDENTIFIER);

impl Identifier {
    /// Full identifier text, including a package qualifier if present.
    pub fn name(&self) -> String {
        significant_text(&self.0)
    }

    /// Range of the identifier text, without surrounding trivia.
    pub fn name_range(&self) -> TextRange {
        significant_range(&self.0)
    }

    /// Split into `(Some(package), name)` for `pkg:name`, `(None, name)` otherwise.
    pub fn parts(&self) -> (Option<String>, String) {
        let text = self.name();
        match text.split_once(':') {
            Some((package, name)) => (Some(package.to_string()), name.to_string()),
            None => (None, text),
        }
    }
}

ast_node!(Atom, ATOM);

impl Atom {
    /// The kind of the leading token: INTEGER, STRING, SYMBOL, SELF_KW, ...
    pub fn token_kind(&self) -> Option<SyntaxKind> {
        significant_tokens(&self.0).next().map(|t| t.kind())
    }

    pub fn is_float(&self) -> bool {
        significant_tokens(&self.0).any(|t| t.kind() == SyntaxKind::DOT)
    }

    pub fn text(&self) -> String {
        significant_text(&self.0)
    }
}

ast_node!(Slot, SLOT);

impl Slot {
    pub fn name(&self) -> Option<String> {
        child_token(&self.0, SyntaxKind::IDENT).map(|t| t.text().to_string())
    }
}

/// Symbol literal text (`:name` or `:|name|`) as its bare name.
pub fn symbol_name(symbol: &str) -> String {
    let stripped = symbol.strip_prefix(':').unwrap_or(symbol);
    stripped
        .strip_prefix('|')
        .and_then(|s| s.strip_suffix('|'))
        .unwrap_or(stripped)
        .to_string()
}

/// If `node` is an atom made of a single symbol literal, the symbol's bare name.
pub fn as_symbol(node: &SyntaxNode) -> Option<String> {
    let atom = Atom::cast(node.clone())?;
    (atom.token_kind()? == SyntaxKind::SYMBOL).then(|| symbol_name(&atom.text()))
}

// ============================================================================
// Methods and procedures
// ============================================================================

ast_node!(MethodDefinition, METHOD_DEFINITION);

impl MethodDefinition {
    pub fn exemplar_name(&self) -> Option<String> {
        let node = self.0.children().find(|n| n.kind() == SyntaxKind::EXEMPLAR_NAME)?;
        let text = significant_text(&node);
        (!text.is_empty()).then_some(text)
    }

    pub fn exemplar_name_range(&self) -> Option<TextRange> {
        let node = self.0.children().find(|n| n.kind() == SyntaxKind::EXEMPLAR_NAME)?;
        Some(significant_range(&node))
    }

    /// The token naming the method, `[` for indexer methods.
    pub fn method_name_token(&self) -> Option<SyntaxToken> {
        if let Some(name) = self.0.children().find(|n| n.kind() == SyntaxKind::METHOD_NAME) {
            return child_token(&name, SyntaxKind::IDENT);
        }
        let parameters = self.parameters_node()?;
        child_token(&parameters, SyntaxKind::L_BRACKET)
    }

    fn parameters_node(&self) -> Option<SyntaxNode> {
        self.0.children().find(|n| n.kind() == SyntaxKind::PARAMETERS)
    }

    /// Method name as Magik spells it, e.g. `name`, `name()`, `name()<<`, `[]<<`.
    pub fn method_name(&self) -> Option<String> {
        let mut name = match self.0.children().find(|n| n.kind() == SyntaxKind::METHOD_NAME) {
            Some(node) => {
                let mut name = child_token(&node, SyntaxKind::IDENT)?.text().to_string();
                if self
                    .parameters_node()
                    .is_some_and(|p| child_token(&p, SyntaxKind::L_PAREN).is_some())
                {
                    name.push_str("()");
                }
                name
            }
            None => {
                self.parameters_node()
                    .and_then(|p| child_token(&p, SyntaxKind::L_BRACKET))?;
                "[]".to_string()
            }
        };

        if let Some(operator) = self.assignment_operator() {
            name.push_str(match operator {
                SyntaxKind::BOOT_CHEVRON => "^<<",
                _ => "<<",
            });
        }
        Some(name)
    }

    fn assignment_operator(&self) -> Option<SyntaxKind> {
        let node = self
            .0
            .children()
            .find(|n| n.kind() == SyntaxKind::ASSIGNMENT_PARAMETER)?;
        node.children_with_tokens()
            .filter_map(SyntaxElement::into_token)
            .map(|t| t.kind())
            .find(|k| matches!(k, SyntaxKind::CHEVRON | SyntaxKind::BOOT_CHEVRON))
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        self.parameters_node()
            .map(|p| p.children().filter_map(Parameter::cast).collect())
            .unwrap_or_default()
    }

    pub fn assignment_parameter(&self) -> Option<Parameter> {
        self.0
            .children()
            .find(|n| n.kind() == SyntaxKind::ASSIGNMENT_PARAMETER)?
            .children()
            .find_map(Parameter::cast)
    }

    fn has_modifier(&self, kind: SyntaxKind) -> bool {
        child_token(&self.0, kind).is_some()
    }

    pub fn is_private(&self) -> bool {
        self.has_modifier(SyntaxKind::PRIVATE_KW)
    }

    pub fn is_abstract(&self) -> bool {
        self.has_modifier(SyntaxKind::ABSTRACT_KW)
    }

    pub fn is_iter(&self) -> bool {
        self.has_modifier(SyntaxKind::ITER_KW)
    }

    pub fn body(&self) -> Option<SyntaxNode> {
        self.0.children().find(|n| n.kind() == SyntaxKind::BODY)
    }
}

ast_node!(ProcDefinition, PROC_DEFINITION);

impl ProcDefinition {
    pub fn parameters(&self) -> Vec<Parameter> {
        self.0
            .children()
            .find(|n| n.kind() == SyntaxKind::PARAMETERS)
            .map(|p| p.children().filter_map(Parameter::cast).collect())
            .unwrap_or_default()
    }

    pub fn is_iter(&self) -> bool {
        child_token(&self.0, SyntaxKind::ITER_KW).is_some()
    }

    /// Name given with `_proc @name(...)`.
    pub fn label(&self) -> Option<String> {
        let mut after_at = false;
        for token in self
            .0
            .children_with_tokens()
            .filter_map(SyntaxElement::into_token)
        {
            match token.kind() {
                SyntaxKind::AT => after_at = true,
                SyntaxKind::IDENT if after_at => return Some(token.text().to_string()),
                _ => {}
            }
        }
        None
    }

    pub fn body(&self) -> Option<SyntaxNode> {
        self.0.children().find(|n| n.kind() == SyntaxKind::BODY)
    }
}

/// How a parameter accepts its argument(s).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterModifier {
    #[default]
    None,
    Optional,
    Gather,
}

ast_node!(Parameter, PARAMETER);

impl Parameter {
    pub fn name_token(&self) -> Option<SyntaxToken> {
        child_token(&self.0, SyntaxKind::IDENT)
    }

    pub fn name(&self) -> Option<String> {
        self.name_token().map(|t| t.text().to_string())
    }

    /// `_optional` and `_gather` apply to every parameter that follows them.
    pub fn modifier(&self) -> ParameterModifier {
        let preceding = std::iter::successors(Some(self.0.clone()), |n| n.prev_sibling())
            .filter(|n| n.kind() == SyntaxKind::PARAMETER);
        for node in preceding {
            if child_token(&node, SyntaxKind::GATHER_KW).is_some() {
                return ParameterModifier::Gather;
            }
            if child_token(&node, SyntaxKind::OPTIONAL_KW).is_some() {
                return ParameterModifier::Optional;
            }
        }
        ParameterModifier::None
    }
}

// ============================================================================
// Invocations
// ============================================================================

ast_node!(ProcedureInvocation, PROCEDURE_INVOCATION);

impl ProcedureInvocation {
    pub fn callee(&self) -> Option<SyntaxNode> {
        self.0.children().find(|n| n.kind().is_expression())
    }

    /// Name of the invoked procedure when it is called through an identifier.
    pub fn callee_name(&self) -> Option<String> {
        self.callee().and_then(Identifier::cast).map(|i| i.name())
    }

    /// Whether this invokes `name`, unqualified or `sw:`-qualified.
    pub fn is_invocation_of(&self, name: &str) -> bool {
        self.callee_name().is_some_and(|callee| {
            callee == name || callee.strip_prefix("sw:").is_some_and(|c| c == name)
        })
    }

    pub fn arguments(&self) -> Option<Arguments> {
        self.0.children().find_map(Arguments::cast)
    }
}

ast_node!(MethodInvocation, METHOD_INVOCATION);

impl MethodInvocation {
    pub fn receiver(&self) -> Option<SyntaxNode> {
        self.0.children().find(|n| n.kind().is_expression())
    }

    pub fn name_token(&self) -> Option<SyntaxToken> {
        child_token(&self.0, SyntaxKind::IDENT)
    }

    /// Invoked method name, with `()` when called with an argument list.
    pub fn method_name(&self) -> Option<String> {
        let mut name = self.name_token()?.text().to_string();
        if self.arguments().is_some() {
            name.push_str("()");
        }
        Some(name)
    }

    pub fn arguments(&self) -> Option<Arguments> {
        self.0.children().find_map(Arguments::cast)
    }
}

ast_node!(Arguments, ARGUMENTS);

impl Arguments {
    pub fn arguments(&self) -> Vec<Argument> {
        self.0.children().filter_map(Argument::cast).collect()
    }

    pub fn len(&self) -> usize {
        self.arguments().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expression of the argument at `index`.
    pub fn expression(&self, index: usize) -> Option<SyntaxNode> {
        self.arguments().get(index)?.expression()
    }

    /// Bare name of the argument at `index` when it is a symbol literal.
    pub fn symbol(&self, index: usize) -> Option<String> {
        as_symbol(&self.expression(index)?)
    }

    pub fn simple_vector(&self, index: usize) -> Option<SimpleVector> {
        SimpleVector::cast(self.expression(index)?)
    }
}

ast_node!(Argument, ARGUMENT);

impl Argument {
    pub fn expression(&self) -> Option<SyntaxNode> {
        expressions(&self.0).next()
    }

    pub fn is_scatter(&self) -> bool {
        child_token(&self.0, SyntaxKind::SCATTER_KW).is_some()
    }
}

ast_node!(SimpleVector, SIMPLE_VECTOR);

impl SimpleVector {
    pub fn items(&self) -> Vec<SyntaxNode> {
        expressions(&self.0).collect()
    }
}

// ============================================================================
// Variable definitions
// ============================================================================

ast_node!(VariableDefinitionStatement, VARIABLE_DEFINITION_STATEMENT);

impl VariableDefinitionStatement {
    fn has_keyword(&self, kind: SyntaxKind) -> bool {
        child_token(&self.0, kind).is_some()
    }

    pub fn is_global(&self) -> bool {
        self.has_keyword(SyntaxKind::GLOBAL_KW)
    }

    pub fn is_constant(&self) -> bool {
        self.has_keyword(SyntaxKind::CONSTANT_KW)
    }

    pub fn is_dynamic(&self) -> bool {
        self.has_keyword(SyntaxKind::DYNAMIC_KW)
    }

    pub fn is_import(&self) -> bool {
        self.has_keyword(SyntaxKind::IMPORT_KW)
    }

    pub fn definitions(&self) -> Vec<VariableDefinition> {
        self.0
            .children()
            .filter_map(VariableDefinition::cast)
            .collect()
    }

    pub fn multiple_definition(&self) -> Option<MultipleVariableDefinition> {
        self.0.children().find_map(MultipleVariableDefinition::cast)
    }
}

ast_node!(VariableDefinition, VARIABLE_DEFINITION);

impl VariableDefinition {
    pub fn identifier(&self) -> Option<Identifier> {
        self.0.children().find_map(Identifier::cast)
    }

    /// The assigned expression, if any.
    pub fn value(&self) -> Option<SyntaxNode> {
        expressions(&self.0).nth(1)
    }
}

ast_node!(MultipleVariableDefinition, MULTIPLE_VARIABLE_DEFINITION);

impl MultipleVariableDefinition {
    /// The declared names, i.e. the identifiers inside the parentheses.
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.targets()
            .filter_map(SyntaxElement::into_node)
            .filter_map(Identifier::cast)
            .collect()
    }

    /// The expression after the assignment operator.
    pub fn value(&self) -> Option<SyntaxNode> {
        self.0
            .children_with_tokens()
            .skip_while(|e| e.kind() != SyntaxKind::R_PAREN)
            .filter_map(SyntaxElement::into_node)
            .find(|n| n.kind().is_expression())
    }

    fn targets(&self) -> impl Iterator<Item = SyntaxElement> {
        self.0
            .children_with_tokens()
            .take_while(|e| e.kind() != SyntaxKind::R_PAREN)
    }

    /// Whether the identifier at `index` was preceded by `_gather`.
    pub fn is_gather(&self, index: usize) -> bool {
        let mut seen = 0;
        let mut gather = false;
        for element in self.targets() {
            match element {
                rowan::NodeOrToken::Token(t) if t.kind() == SyntaxKind::GATHER_KW => gather = true,
                rowan::NodeOrToken::Node(n) if n.kind() == SyntaxKind::IDENTIFIER => {
                    if seen == index {
                        return gather;
                    }
                    seen += 1;
                    gather = false;
                }
                _ => {}
            }
        }
        false
    }
}

// ============================================================================
// Expressions
// ============================================================================

ast_node!(AssignmentExpression, ASSIGNMENT_EXPRESSION);

impl AssignmentExpression {
    pub fn target(&self) -> Option<SyntaxNode> {
        expressions(&self.0).next()
    }

    pub fn value(&self) -> Option<SyntaxNode> {
        expressions(&self.0).nth(1)
    }

    pub fn is_boot(&self) -> bool {
        child_token(&self.0, SyntaxKind::BOOT_CHEVRON).is_some()
    }
}

ast_node!(BinaryExpression, BINARY_EXPRESSION);

impl BinaryExpression {
    pub fn lhs(&self) -> Option<SyntaxNode> {
        expressions(&self.0).next()
    }

    pub fn rhs(&self) -> Option<SyntaxNode> {
        expressions(&self.0).nth(1)
    }

    pub fn operator(&self) -> Option<SyntaxToken> {
        self.0
            .children_with_tokens()
            .filter_map(SyntaxElement::into_token)
            .find(|t| !t.kind().is_trivia())
    }
}

ast_node!(ForLoop, FOR);

impl ForLoop {
    pub fn variables(&self) -> Vec<Identifier> {
        self.0
            .children()
            .find(|n| n.kind() == SyntaxKind::FOR_VARIABLES)
            .map(|v| v.children().filter_map(Identifier::cast).collect())
            .unwrap_or_default()
    }

    /// The expression after `_over`.
    pub fn iterable(&self) -> Option<SyntaxNode> {
        expressions(&self.0).next()
    }

    pub fn loop_body(&self) -> Option<SyntaxNode> {
        self.0.children().find(|n| n.kind() == SyntaxKind::LOOP_BODY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn first<N: AstNode>(source: &str) -> N {
        parse(source)
            .syntax()
            .descendants()
            .find_map(N::cast)
            .expect("node present")
    }

    #[test]
    fn test_method_names() {
        let cases = [
            ("_method a.b _endmethod", "b"),
            ("_method a.b() _endmethod", "b()"),
            ("_method a.b << x _endmethod", "b<<"),
            ("_method a.b(y) << x _endmethod", "b()<<"),
            ("_method a.b ^<< x _endmethod", "b^<<"),
            ("_method a[i] _endmethod", "[]"),
            ("_method a[i] << x _endmethod", "[]<<"),
        ];
        for (source, expected) in cases {
            let method: MethodDefinition = first(source);
            assert_eq!(method.method_name().as_deref(), Some(expected), "{source}");
        }
    }

    #[test]
    fn test_method_exemplar_and_modifiers() {
        let method: MethodDefinition = first("_private _iter _method sw:rope.elements() _endmethod");

        assert_eq!(method.exemplar_name().as_deref(), Some("sw:rope"));
        assert!(method.is_private());
        assert!(method.is_iter());
        assert!(!method.is_abstract());
    }

    #[test]
    fn test_parameter_modifiers_carry_forward() {
        let method: MethodDefinition =
            first("_method a.b(p1, _optional p2, p3, _gather p4) _endmethod");
        let modifiers: Vec<_> = method.parameters().iter().map(|p| p.modifier()).collect();

        assert_eq!(
            modifiers,
            vec![
                ParameterModifier::None,
                ParameterModifier::Optional,
                ParameterModifier::Optional,
                ParameterModifier::Gather,
            ]
        );
    }

    #[test]
    fn test_procedure_invocation_arguments() {
        let invocation: ProcedureInvocation = first("sw:def_mixin(:my_mixin, {:parent})");
        let arguments = invocation.arguments().unwrap();

        assert!(invocation.is_invocation_of("def_mixin"));
        assert_eq!(arguments.symbol(0).as_deref(), Some("my_mixin"));
        assert_eq!(arguments.simple_vector(1).unwrap().items().len(), 1);
    }

    #[test]
    fn test_method_invocation_name() {
        let invocation: MethodInvocation = first("object.define_shared_variable(:x, 1, :public)");

        assert_eq!(invocation.method_name().as_deref(), Some("define_shared_variable()"));
        let receiver = Identifier::cast(invocation.receiver().unwrap()).unwrap();
        assert_eq!(receiver.name(), "object");
    }

    #[test]
    fn test_symbol_name_forms() {
        assert_eq!(symbol_name(":slot_a"), "slot_a");
        assert_eq!(symbol_name(":|+|"), "+");
    }

    #[test]
    fn test_multiple_variable_definition_gather() {
        let definition: MultipleVariableDefinition = first("_local (a, _gather b) << x()");

        assert_eq!(definition.identifiers().len(), 2);
        assert!(!definition.is_gather(0));
        assert!(definition.is_gather(1));
        assert!(definition.value().is_some());
    }

    #[test]
    fn test_multiple_variable_definition_bare_identifier_value() {
        let definition: MultipleVariableDefinition = first("_local (x, y) << a");
        let names: Vec<_> = definition.identifiers().iter().map(|i| i.name()).collect();

        assert_eq!(names, vec!["x", "y"]);
        let value = Identifier::cast(definition.value().unwrap()).unwrap();
        assert_eq!(value.name(), "a");
    }
}
