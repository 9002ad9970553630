//! Local type inference for one file.
//!
//! [`LocalTypeReasoner`] walks a parsed file after its [`ScopeTree`] has been
//! built and assigns an [`ExpressionResultString`] to every expression node.
//! Local variables are tracked flow-sensitively: the type of a local is the
//! type of its last assignment, with the states of alternative branches
//! merged through [`TypeString::combine`]. Anything that cannot be resolved
//! is `_undefined`, never an error.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::trace;

use super::definitions::{Definition, ParameterModifier};
use super::keeper::USER_PACKAGE;
use super::resolve::GlobalResolver;
use super::scope::{DeclarationId, ScopeTree};
use super::types::TypeResolver;
use super::typing::{ExpressionResultString, TypeDoc, TypeString};
use crate::syntax::ast::{
    self, AstNode, Atom, BinaryExpression, ForLoop, Identifier, MethodInvocation, Parameter,
    ProcedureInvocation, Slot, VariableDefinitionStatement,
};
use crate::syntax::{SyntaxKind, SyntaxNode};

/// Type of a literal atom, `None` for anything else.
pub(crate) fn literal_type(node: &SyntaxNode) -> Option<TypeString> {
    let atom = Atom::cast(node.clone())?;
    let type_string = match atom.token_kind()? {
        SyntaxKind::INTEGER if atom.is_float() => TypeString::SW_FLOAT,
        SyntaxKind::INTEGER => TypeString::SW_INTEGER,
        SyntaxKind::STRING => TypeString::SW_CHAR16_VECTOR,
        SyntaxKind::CHARACTER => TypeString::SW_CHARACTER,
        SyntaxKind::SYMBOL => TypeString::SW_SYMBOL,
        SyntaxKind::TRUE_KW | SyntaxKind::FALSE_KW => TypeString::SW_FALSE,
        SyntaxKind::MAYBE_KW => TypeString::SW_MAYBE,
        SyntaxKind::UNSET_KW => TypeString::SW_UNSET,
        _ => return None,
    };
    Some(type_string)
}

/// Inferred result of each expression node in a file.
#[derive(Clone, Debug, Default)]
pub struct TypeMap {
    types: FxHashMap<SyntaxNode, ExpressionResultString>,
}

impl TypeMap {
    /// Result of `node`; `_undefined` if it was never reached.
    pub fn get(&self, node: &SyntaxNode) -> ExpressionResultString {
        self.types
            .get(node)
            .cloned()
            .unwrap_or_else(ExpressionResultString::undefined)
    }

    pub fn contains(&self, node: &SyntaxNode) -> bool {
        self.types.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

type State = FxHashMap<DeclarationId, ExpressionResultString>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    /// `_block` and `_if` bodies, targets of `>>`.
    Emit,
    /// Loops, targets of `_leave _with`.
    Loop,
}

struct Frame {
    kind: FrameKind,
    result: Option<ExpressionResultString>,
}

/// Single-use walker producing a [`TypeMap`].
pub struct LocalTypeReasoner<'a> {
    resolver: &'a TypeResolver,
    scopes: &'a ScopeTree,
    package: SmolStr,
    self_type: TypeString,
    state: State,
    frames: Vec<Frame>,
    types: TypeMap,
}

impl<'a> LocalTypeReasoner<'a> {
    pub fn new(resolver: &'a TypeResolver, scopes: &'a ScopeTree) -> Self {
        Self {
            resolver,
            scopes,
            package: SmolStr::new_inline(USER_PACKAGE),
            self_type: TypeString::UNDEFINED,
            state: State::default(),
            frames: Vec::new(),
            types: TypeMap::default(),
        }
    }

    /// Package in effect before the first `_package` statement.
    pub fn with_package(mut self, package: impl Into<SmolStr>) -> Self {
        self.package = package.into();
        self
    }

    pub fn run(mut self, root: &SyntaxNode) -> TypeMap {
        let _span = tracing::debug_span!("infer_types").entered();
        self.statements(root);
        trace!(expressions = self.types.len(), "inferred expression types");
        self.types
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn statements(&mut self, node: &SyntaxNode) {
        for child in node.children() {
            self.statement(&child);
        }
    }

    fn statement(&mut self, node: &SyntaxNode) {
        match node.kind() {
            SyntaxKind::PACKAGE_SPECIFICATION => {
                if let Some(name) = ast::PackageSpecification::cast(node.clone()).and_then(|p| p.name()) {
                    self.package = SmolStr::new(name);
                }
            }
            SyntaxKind::METHOD_DEFINITION => self.method_definition(node),
            SyntaxKind::VARIABLE_DEFINITION_STATEMENT => self.variable_definitions(node),
            SyntaxKind::EMIT_STATEMENT => {
                let result = self.expression_list(node);
                self.deliver(FrameKind::Emit, result);
            }
            SyntaxKind::LEAVE_STATEMENT => {
                let result = self.expression_list(node);
                self.deliver(FrameKind::Loop, result);
            }
            SyntaxKind::BODY | SyntaxKind::LOOP_BODY => self.statements(node),
            kind if kind.is_expression() => {
                self.expression(node);
            }
            _ => {
                for child in node.children() {
                    if child.kind().is_expression() {
                        self.expression(&child);
                    } else {
                        self.statement(&child);
                    }
                }
            }
        }
    }

    /// Results of the expressions directly under `node`, one value each.
    fn expression_list(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let expressions: Vec<_> = ast::expressions(node).collect();
        match expressions.as_slice() {
            [single] => self.expression(single),
            many => {
                let types: Vec<_> = many
                    .iter()
                    .map(|e| self.expression(e).get(0, &TypeString::SW_UNSET))
                    .collect();
                ExpressionResultString::new(types)
            }
        }
    }

    fn deliver(&mut self, kind: FrameKind, result: ExpressionResultString) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|f| f.kind == kind) {
            frame.result = Some(match frame.result.take() {
                Some(previous) => ExpressionResultString::combine(&previous, Some(&result)),
                None => result,
            });
        }
    }

    /// Run `f` inside a new frame, returning what reached it.
    fn framed(&mut self, kind: FrameKind, f: impl FnOnce(&mut Self)) -> Option<ExpressionResultString> {
        self.frames.push(Frame { kind, result: None });
        f(self);
        self.frames.pop().and_then(|frame| frame.result)
    }

    fn method_definition(&mut self, node: &SyntaxNode) {
        let Some(method) = ast::MethodDefinition::cast(node.clone()) else {
            return;
        };
        let owner = method
            .exemplar_name()
            .map(|name| TypeString::of_identifier(&name, &self.package))
            .unwrap_or(TypeString::UNDEFINED);
        let owner = self.resolver.get_type(&owner).type_string().clone();

        let saved_self = std::mem::replace(&mut self.self_type, owner);
        let saved_state = std::mem::take(&mut self.state);
        let saved_frames = std::mem::take(&mut self.frames);

        let doc = TypeDoc::of_node(node, &self.package);
        let parameters = method.parameters().into_iter().chain(method.assignment_parameter());
        self.bind_parameters(parameters, &doc);
        if let Some(body) = method.body() {
            self.statements(&body);
        }

        self.self_type = saved_self;
        self.state = saved_state;
        self.frames = saved_frames;
    }

    fn bind_parameters(&mut self, parameters: impl IntoIterator<Item = Parameter>, doc: &TypeDoc) {
        for parameter in parameters {
            let Some(token) = parameter.name_token() else {
                continue;
            };
            let Some(declaration) = self.scopes.declaration_at(token.text_range()) else {
                continue;
            };
            let declared = doc.parameter_type(token.text());
            let type_string = match parameter.modifier() {
                ParameterModifier::None => declared,
                ParameterModifier::Optional => TypeString::combine(&declared, &TypeString::SW_UNSET),
                ParameterModifier::Gather => TypeString::SW_SIMPLE_VECTOR,
            };
            self.state.insert(declaration, ExpressionResultString::single(type_string));
        }
    }

    fn variable_definitions(&mut self, node: &SyntaxNode) {
        let Some(statement) = VariableDefinitionStatement::cast(node.clone()) else {
            return;
        };

        if let Some(multiple) = statement.multiple_definition() {
            let value = multiple
                .value()
                .map(|v| self.expression(&v))
                .unwrap_or_else(ExpressionResultString::empty);
            for (idx, identifier) in multiple.identifiers().iter().enumerate() {
                let type_string = if multiple.is_gather(idx) {
                    TypeString::SW_SIMPLE_VECTOR
                } else {
                    value.get(idx, &TypeString::SW_UNSET)
                };
                self.bind(identifier, ExpressionResultString::single(type_string));
            }
            return;
        }

        for definition in statement.definitions() {
            let Some(identifier) = definition.identifier() else {
                continue;
            };
            if statement.is_import() {
                let imported = self
                    .scopes
                    .declaration_at(identifier.name_range())
                    .and_then(|id| self.scopes.declaration(id).imports)
                    .and_then(|outer| self.state.get(&outer).cloned())
                    .unwrap_or_else(ExpressionResultString::undefined);
                self.bind(&identifier, imported);
                continue;
            }
            let result = match definition.value() {
                Some(value) => {
                    let value = self.expression(&value);
                    ExpressionResultString::single(value.get(0, &TypeString::SW_UNSET))
                }
                None => ExpressionResultString::single(TypeString::SW_UNSET),
            };
            self.bind(&identifier, result);
        }
    }

    /// Record `result` for a declaring or assigned identifier.
    fn bind(&mut self, identifier: &Identifier, result: ExpressionResultString) {
        let range = identifier.name_range();
        let target = self
            .scopes
            .declaration_at(range)
            .or_else(|| self.scopes.usage_target(range));
        if let Some(declaration) = target {
            self.state.insert(declaration, result.clone());
        }
        self.types.types.insert(identifier.syntax().clone(), result);
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expression(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let result = self.infer(node);
        self.types.types.insert(node.clone(), result.clone());
        result
    }

    fn infer(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        match node.kind() {
            SyntaxKind::ATOM => ExpressionResultString::single(self.atom(node)),
            SyntaxKind::IDENTIFIER => match Identifier::cast(node.clone()) {
                Some(identifier) => self.identifier(&identifier),
                None => ExpressionResultString::undefined(),
            },
            SyntaxKind::SLOT => {
                let name = Slot::cast(node.clone()).and_then(|s| s.name());
                ExpressionResultString::single(name.map(|n| self.slot_type(&n)).unwrap_or(TypeString::UNDEFINED))
            }
            SyntaxKind::SIMPLE_VECTOR => {
                for item in ast::expressions(node) {
                    self.expression(&item);
                }
                ExpressionResultString::single(TypeString::SW_SIMPLE_VECTOR)
            }
            SyntaxKind::PAREN_EXPRESSION => match ast::expressions(node).next() {
                Some(inner) => self.expression(&inner),
                None => ExpressionResultString::undefined(),
            },
            SyntaxKind::ASSIGNMENT_EXPRESSION => self.assignment(node),
            SyntaxKind::BINARY_EXPRESSION => self.binary(node),
            SyntaxKind::UNARY_EXPRESSION => self.unary(node),
            SyntaxKind::METHOD_INVOCATION => self.method_invocation(node),
            SyntaxKind::PROCEDURE_INVOCATION => self.procedure_invocation(node),
            SyntaxKind::INDEX_INVOCATION => self.index_invocation(node),
            SyntaxKind::PROC_DEFINITION => {
                self.procedure_definition(node);
                ExpressionResultString::single(TypeString::SW_PROCEDURE)
            }
            SyntaxKind::BLOCK => {
                let emitted = self.framed(FrameKind::Emit, |this| this.statements(node));
                emitted.unwrap_or_else(ExpressionResultString::empty)
            }
            SyntaxKind::IF => self.if_expression(node),
            SyntaxKind::FOR => self.for_loop(node),
            SyntaxKind::WHILE | SyntaxKind::LOOP => self.loop_expression(node),
            SyntaxKind::TRY => self.try_expression(node),
            SyntaxKind::PROTECT => {
                self.statements(node);
                ExpressionResultString::empty()
            }
            _ => ExpressionResultString::undefined(),
        }
    }

    fn atom(&self, node: &SyntaxNode) -> TypeString {
        if let Some(literal) = literal_type(node) {
            return literal;
        }
        match Atom::cast(node.clone()).and_then(|a| a.token_kind()) {
            Some(SyntaxKind::SELF_KW | SyntaxKind::CLONE_KW) => self.self_type.clone(),
            Some(SyntaxKind::SUPER_KW) => self
                .resolver
                .get_parents(&self.self_type)
                .first()
                .cloned()
                .unwrap_or(TypeString::UNDEFINED),
            _ => TypeString::UNDEFINED,
        }
    }

    fn identifier(&mut self, identifier: &Identifier) -> ExpressionResultString {
        let range = identifier.name_range();
        let local = self
            .scopes
            .usage_target(range)
            .or_else(|| self.scopes.declaration_at(range));
        if let Some(declaration) = local {
            return self
                .state
                .get(&declaration)
                .cloned()
                .unwrap_or_else(ExpressionResultString::undefined);
        }
        ExpressionResultString::single(self.global_type(&identifier.name()))
    }

    fn global_type(&self, name: &str) -> TypeString {
        let resolver = GlobalResolver::new(self.resolver.keeper()).with_package(self.package.clone());
        match resolver.resolve(name).definition() {
            Some(Definition::Exemplar(exemplar)) => exemplar.type_string.clone(),
            Some(Definition::Global(global)) => global.value_type.clone(),
            Some(Definition::Procedure(_)) => TypeString::SW_PROCEDURE,
            _ => TypeString::UNDEFINED,
        }
    }

    fn slot_type(&self, name: &str) -> TypeString {
        self.resolver
            .get_type(&self.self_type)
            .exemplar()
            .and_then(|e| e.slots.iter().find(|s| s.name == name).map(|s| s.type_string.clone()))
            .unwrap_or(TypeString::UNDEFINED)
    }

    fn assignment(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let mut expressions = ast::expressions(node);
        let target = expressions.next();
        let value = match expressions.next() {
            Some(value) => self.expression(&value),
            None => ExpressionResultString::undefined(),
        };
        if let Some(target) = target {
            match Identifier::cast(target.clone()) {
                Some(identifier) => {
                    let single = ExpressionResultString::single(value.get(0, &TypeString::SW_UNSET));
                    self.bind(&identifier, single);
                }
                None => {
                    self.expression(&target);
                }
            }
        }
        value
    }

    fn binary(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let Some(binary) = BinaryExpression::cast(node.clone()) else {
            return ExpressionResultString::undefined();
        };
        let lhs = binary.lhs().map(|n| self.expression(&n));
        let rhs = binary.rhs().map(|n| self.expression(&n));
        let Some(operator) = binary.operator() else {
            return ExpressionResultString::undefined();
        };

        use SyntaxKind::*;
        if matches!(
            operator.kind(),
            EQ | NEQ | LT | LT_EQ | GT | GT_EQ | IS_KW | ISNT_KW | CF_KW | AND_KW | ANDIF_KW | OR_KW | ORIF_KW | XOR_KW
        ) {
            return ExpressionResultString::single(TypeString::SW_FALSE);
        }

        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return ExpressionResultString::undefined();
        };
        let lhs = lhs.get(0, &TypeString::SW_UNSET);
        let rhs = rhs.get(0, &TypeString::SW_UNSET);
        match self.resolver.get_binary_operator(operator.text(), &lhs, &rhs) {
            Some(result) => ExpressionResultString::single(result),
            None => ExpressionResultString::undefined(),
        }
    }

    fn unary(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let operand = ast::expressions(node).next().map(|n| self.expression(&n));
        if ast::child_token(node, SyntaxKind::NOT_KW).is_some() {
            return ExpressionResultString::single(TypeString::SW_FALSE);
        }
        operand.unwrap_or_else(ExpressionResultString::undefined)
    }

    fn arguments(&mut self, arguments: Option<ast::Arguments>) {
        for argument in arguments.iter().flat_map(|a| a.arguments()) {
            if let Some(expression) = argument.expression() {
                self.expression(&expression);
            }
        }
    }

    /// Return types of `name` on `receiver`, `_self` replaced by the receiver.
    fn method_result(&self, receiver: &TypeString, name: &str, loop_types: bool) -> ExpressionResultString {
        if receiver.is_undefined() {
            return ExpressionResultString::undefined();
        }
        if receiver.is_combined() {
            let mut members = receiver.members().map(|m| self.method_result(m, name, loop_types));
            let Some(first) = members.next() else {
                return ExpressionResultString::undefined();
            };
            return members.fold(first, |acc, next| ExpressionResultString::combine(&acc, Some(&next)));
        }
        match self.resolver.get_method(receiver, name) {
            Some(method) => {
                let result = if loop_types { &method.loop_types } else { &method.return_types };
                result.substitute_type(&TypeString::SELF, receiver)
            }
            None => ExpressionResultString::undefined(),
        }
    }

    fn method_invocation(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let Some(invocation) = MethodInvocation::cast(node.clone()) else {
            return ExpressionResultString::undefined();
        };
        let receiver = match invocation.receiver() {
            Some(receiver) => self.expression(&receiver).get(0, &TypeString::SW_UNSET),
            None => self.self_type.clone(),
        };
        self.arguments(invocation.arguments());
        match invocation.method_name() {
            Some(name) => self.method_result(&receiver, &name, false),
            None => ExpressionResultString::undefined(),
        }
    }

    fn index_invocation(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let receiver = match ast::expressions(node).next() {
            Some(receiver) => self.expression(&receiver).get(0, &TypeString::SW_UNSET),
            None => TypeString::UNDEFINED,
        };
        self.arguments(node.children().find_map(ast::Arguments::cast));
        self.method_result(&receiver, "[]", false)
    }

    fn procedure_invocation(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let Some(invocation) = ProcedureInvocation::cast(node.clone()) else {
            return ExpressionResultString::undefined();
        };
        if let Some(callee) = invocation.callee() {
            self.expression(&callee);
        }
        self.arguments(invocation.arguments());

        let Some(name) = invocation.callee_name() else {
            return ExpressionResultString::undefined();
        };
        let callee_is_local = invocation
            .callee()
            .and_then(Identifier::cast)
            .is_some_and(|id| self.scopes.usage_target(id.name_range()).is_some());
        if callee_is_local {
            return ExpressionResultString::undefined();
        }
        let resolver = GlobalResolver::new(self.resolver.keeper()).with_package(self.package.clone());
        match resolver.resolve(&name).definition() {
            Some(Definition::Procedure(procedure)) => procedure.return_types.clone(),
            _ => ExpressionResultString::undefined(),
        }
    }

    fn procedure_definition(&mut self, node: &SyntaxNode) {
        let Some(procedure) = ast::ProcDefinition::cast(node.clone()) else {
            return;
        };
        let saved_frames = std::mem::take(&mut self.frames);
        let saved_state = self.state.clone();

        let doc = TypeDoc::of_node(node, &self.package);
        self.bind_parameters(procedure.parameters(), &doc);
        if let Some(body) = procedure.body() {
            self.statements(&body);
        }

        self.state = saved_state;
        self.frames = saved_frames;
    }

    // ------------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------------

    /// Walk `body` on a copy of the current state; returns the branch's
    /// final state and what it emitted.
    fn branch(&mut self, body: Option<&SyntaxNode>, before: &State) -> (State, Option<ExpressionResultString>) {
        self.state = before.clone();
        let emitted = self.framed(FrameKind::Emit, |this| {
            if let Some(body) = body {
                this.statements(body);
            }
        });
        (std::mem::take(&mut self.state), emitted)
    }

    fn if_expression(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        if let Some(condition) = ast::expressions(node).next() {
            self.expression(&condition);
        }
        let before = self.state.clone();
        let mut states = Vec::new();
        let mut emits = Vec::new();

        let then_body = node.children().find(|n| n.kind() == SyntaxKind::BODY);
        let (state, emitted) = self.branch(then_body.as_ref(), &before);
        states.push(state);
        emits.push(emitted);

        let mut has_else = false;
        for child in node.children() {
            match child.kind() {
                SyntaxKind::ELIF => {
                    self.state = before.clone();
                    if let Some(condition) = ast::expressions(&child).next() {
                        self.expression(&condition);
                    }
                    let condition_state = std::mem::take(&mut self.state);
                    let body = child.children().find(|n| n.kind() == SyntaxKind::BODY);
                    let (state, emitted) = self.branch(body.as_ref(), &condition_state);
                    states.push(state);
                    emits.push(emitted);
                }
                SyntaxKind::ELSE => {
                    has_else = true;
                    let body = child.children().find(|n| n.kind() == SyntaxKind::BODY);
                    let (state, emitted) = self.branch(body.as_ref(), &before);
                    states.push(state);
                    emits.push(emitted);
                }
                _ => {}
            }
        }
        if !has_else {
            states.push(before);
            emits.push(Some(ExpressionResultString::empty()));
        }

        self.state = merge_states(states);
        combine_all(emits.into_iter().map(|e| e.unwrap_or_else(ExpressionResultString::empty)))
    }

    fn run_loop_body(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let before = self.state.clone();
        let left = self.framed(FrameKind::Loop, |this| {
            if let Some(body) = node.children().find(|n| n.kind() == SyntaxKind::LOOP_BODY) {
                this.statements(&body);
            }
        });
        let after = std::mem::take(&mut self.state);
        self.state = merge_states(vec![before, after]);

        if let Some(finally) = node.children().find(|n| n.kind() == SyntaxKind::FINALLY) {
            for identifier in finally.children().filter_map(Identifier::cast) {
                self.bind(&identifier, ExpressionResultString::undefined());
            }
            self.statements(&finally);
        }
        left.unwrap_or_else(ExpressionResultString::empty)
    }

    fn for_loop(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        let Some(for_loop) = ForLoop::cast(node.clone()) else {
            return ExpressionResultString::undefined();
        };
        let iterated = match for_loop.iterable() {
            Some(iterable) => self.iterated_types(&iterable),
            None => ExpressionResultString::undefined(),
        };

        let before = self.state.clone();
        for (idx, variable) in for_loop.variables().iter().enumerate() {
            let type_string = if iterated.is_undefined() {
                TypeString::UNDEFINED
            } else {
                iterated.get(idx, &TypeString::SW_UNSET)
            };
            self.bind(variable, ExpressionResultString::single(type_string));
        }
        let result = self.run_loop_body(node);
        // Iterators are not visible past the loop.
        let iterators: Vec<_> = for_loop
            .variables()
            .iter()
            .filter_map(|v| self.scopes.declaration_at(v.name_range()))
            .collect();
        for id in iterators {
            if !before.contains_key(&id) {
                self.state.remove(&id);
            }
        }
        result
    }

    /// Per-iteration types of a `_for ... _over <iterable>`.
    fn iterated_types(&mut self, iterable: &SyntaxNode) -> ExpressionResultString {
        let Some(invocation) = MethodInvocation::cast(iterable.clone()) else {
            self.expression(iterable);
            return ExpressionResultString::undefined();
        };
        let receiver = match invocation.receiver() {
            Some(receiver) => self.expression(&receiver).get(0, &TypeString::SW_UNSET),
            None => self.self_type.clone(),
        };
        self.arguments(invocation.arguments());
        let Some(name) = invocation.method_name() else {
            return ExpressionResultString::undefined();
        };
        let returned = self.method_result(&receiver, &name, false);
        self.types.types.insert(iterable.clone(), returned);
        self.method_result(&receiver, &name, true)
    }

    fn loop_expression(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        if node.kind() == SyntaxKind::WHILE {
            if let Some(condition) = ast::expressions(node).next() {
                self.expression(&condition);
            }
        }
        self.run_loop_body(node)
    }

    fn try_expression(&mut self, node: &SyntaxNode) -> ExpressionResultString {
        if let Some(condition) = node.children().find_map(Identifier::cast) {
            self.bind(&condition, ExpressionResultString::single(TypeString::SW_CONDITION));
        }
        let before = self.state.clone();
        let mut states = Vec::new();

        let body = node.children().find(|n| n.kind() == SyntaxKind::BODY);
        let (state, _) = self.branch(body.as_ref(), &before);
        states.push(state);
        for handler in node.children().filter(|n| n.kind() == SyntaxKind::WHEN) {
            let body = handler.children().find(|n| n.kind() == SyntaxKind::BODY);
            let (state, _) = self.branch(body.as_ref(), &before);
            states.push(state);
        }

        self.state = merge_states(states);
        ExpressionResultString::empty()
    }
}

/// Merge alternative states: a local known in several is the combination.
fn merge_states(states: Vec<State>) -> State {
    let mut merged = State::default();
    for state in states {
        for (id, result) in state {
            let combined = match merged.get(&id) {
                Some(existing) => ExpressionResultString::combine(existing, Some(&result)),
                None => result,
            };
            merged.insert(id, combined);
        }
    }
    merged
}

fn combine_all(results: impl IntoIterator<Item = ExpressionResultString>) -> ExpressionResultString {
    let mut results = results.into_iter();
    let Some(first) = results.next() else {
        return ExpressionResultString::empty();
    };
    results.fold(first, |acc, next| ExpressionResultString::combine(&acc, Some(&next)))
}

/// Infer the types of every expression in `root`.
pub fn infer_types(resolver: &TypeResolver, scopes: &ScopeTree, root: &SyntaxNode, package: &str) -> TypeMap {
    LocalTypeReasoner::new(resolver, scopes)
        .with_package(package)
        .run(root)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::base::FileId;
    use crate::hir::keeper::DefinitionKeeper;
    use crate::hir::parsers::{DefinitionReader, ParseContext};
    use crate::syntax::parse;

    struct Fixture {
        root: SyntaxNode,
        types: TypeMap,
    }

    impl Fixture {
        fn new(source: &str) -> Self {
            let parse = parse(source);
            assert!(parse.ok(), "{:?}", parse.errors);
            let root = parse.syntax();
            let keeper = Arc::new(DefinitionKeeper::new());
            let read = DefinitionReader::new(ParseContext::new(FileId::new(0), "user")).read(&root);
            keeper.replace_file(FileId::new(0), read.definitions);
            let resolver = TypeResolver::new(keeper);
            let scopes = ScopeTree::build(&root, "user");
            let types = infer_types(&resolver, &scopes, &root, "user");
            Self { root, types }
        }

        /// Result of the `nth` identifier node named `name`.
        fn identifier(&self, name: &str, nth: usize) -> String {
            let node = self
                .root
                .descendants()
                .filter_map(Identifier::cast)
                .filter(|id| id.name() == name)
                .nth(nth)
                .unwrap();
            self.types.get(node.syntax()).to_string()
        }

        /// Result of the `nth` node of `kind`.
        fn node(&self, kind: SyntaxKind, nth: usize) -> String {
            let node = self.root.descendants().filter(|n| n.kind() == kind).nth(nth).unwrap();
            self.types.get(&node).to_string()
        }
    }

    fn literal(source: &str) -> Option<TypeString> {
        let root = parse(source).syntax();
        let atom = root.descendants().find(|n| n.kind() == SyntaxKind::ATOM).unwrap();
        literal_type(&atom)
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(literal("1"), Some(TypeString::SW_INTEGER));
        assert_eq!(literal("1.5"), Some(TypeString::SW_FLOAT));
        assert_eq!(literal("\"s\""), Some(TypeString::SW_CHAR16_VECTOR));
        assert_eq!(literal(":sym"), Some(TypeString::SW_SYMBOL));
        assert_eq!(literal("%a"), Some(TypeString::SW_CHARACTER));
        assert_eq!(literal("_true"), Some(TypeString::SW_FALSE));
        assert_eq!(literal("_maybe"), Some(TypeString::SW_MAYBE));
        assert_eq!(literal("_unset"), Some(TypeString::SW_UNSET));
        assert_eq!(literal("_self"), None);
    }

    #[test]
    fn test_local_takes_last_assignment() {
        let fixture = Fixture::new("_block\n  _local a << 1\n  write(a)\n  a << \"x\"\n  write(a)\n_endblock");

        assert_eq!(fixture.identifier("a", 1), "sw:integer");
        assert_eq!(fixture.identifier("a", 3), "sw:char16_vector");
    }

    #[test]
    fn test_branches_are_merged() {
        let fixture = Fixture::new(
            "_block\n  _local a << 1\n  _if _true _then a << 1.5 _endif\n  write(a)\n_endblock",
        );

        assert_eq!(fixture.identifier("a", 2), "sw:float|sw:integer");
    }

    #[test]
    fn test_block_emit_and_if_without_else() {
        let fixture = Fixture::new("_block\n  _if _true _then >> 1 _endif\n_endblock");

        assert_eq!(fixture.node(SyntaxKind::IF, 0), "sw:integer|sw:unset");
    }

    #[test]
    fn test_method_invocation_uses_return_type_and_self() {
        let fixture = Fixture::new(
            "def_slotted_exemplar(:rope, {})\n\
             _method rope.copy\n  ## @return {_self}\n  _return _self\n_endmethod\n\
             _method rope.size\n  ## @return {sw:integer}\n_endmethod\n\
             _method rope.test\n  _local c << _self.copy\n  write(c.size, c.missing)\n_endmethod",
        );

        assert_eq!(fixture.identifier("c", 0), "user:rope");
        assert_eq!(fixture.node(SyntaxKind::METHOD_INVOCATION, 1), "sw:integer");
        assert!(fixture.types.get(&fixture.root.descendants().filter(|n| n.kind() == SyntaxKind::METHOD_INVOCATION).nth(2).unwrap()).is_undefined());
    }

    #[test]
    fn test_parameters_and_scatter() {
        let fixture = Fixture::new(
            "_method object.m(a, _optional b, _gather c)\n\
               ## @param {sw:integer} a\n\
               ## @param {sw:symbol} b\n\
               _local (x, y) << a\n\
               write(a, b, c, x, y)\n\
             _endmethod",
        );

        assert_eq!(fixture.identifier("a", 1), "sw:integer");
        assert_eq!(fixture.identifier("b", 0), "sw:symbol|sw:unset");
        assert_eq!(fixture.identifier("c", 0), "sw:simple_vector");
        assert_eq!(fixture.identifier("x", 1), "sw:integer");
        assert_eq!(fixture.identifier("y", 1), "sw:unset");
    }

    #[test]
    fn test_comparisons_and_unknown_globals() {
        let fixture = Fixture::new("_block\n  _local a << 1 = 2\n  _local b << mystery\n_endblock");

        assert_eq!(fixture.identifier("a", 0), "sw:false");
        assert_eq!(fixture.identifier("b", 0), "_undefined");
    }
}
