//! Lexical scopes of one file and the references into them.
//!
//! Built by a single source-order walk. A declaration is visible in its
//! scope and all nested scopes from its declaration point onward; a `_for`
//! iterator is visible in the loop body only. Every identifier occurrence is
//! resolved during the walk: to the innermost visible declaration, or else
//! to a global name in the package in effect.
//!
//! Scopes and declarations live in arenas and refer to each other by index.
//! The tree is rebuilt from scratch whenever the file changes.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::error::RenameError;
use crate::base::{TextRange, TextSize};
use crate::syntax::ast::{
    self, AstNode, Identifier, PackageSpecification, Parameter, VariableDefinitionStatement,
};
use crate::syntax::{SyntaxKind, SyntaxNode};

/// Index of a [`Scope`] in its [`ScopeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

/// Index of a [`Declaration`] in its [`ScopeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    File,
    Method,
    Procedure,
    Block,
    /// A branch or handler body: `_if`, `_elif`, `_else`, `_when`, `_protect`.
    Body,
    Loop,
    Try,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Local,
    Parameter,
    OptionalParameter,
    GatherParameter,
    LoopIterator,
    Import,
}

impl DeclarationKind {
    pub fn display(&self) -> &'static str {
        match self {
            DeclarationKind::Local => "local",
            DeclarationKind::Parameter => "parameter",
            DeclarationKind::OptionalParameter => "optional parameter",
            DeclarationKind::GatherParameter => "gather parameter",
            DeclarationKind::LoopIterator => "iterator",
            DeclarationKind::Import => "import",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Usage {
    pub range: TextRange,
    pub access: Access,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub range: TextRange,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub declarations: Vec<DeclarationId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: SmolStr,
    pub kind: DeclarationKind,
    /// Span of the declaring identifier.
    pub range: TextRange,
    pub scope: ScopeId,
    /// For `_import`, the outer declaration it brings in.
    pub imports: Option<DeclarationId>,
    pub usages: Vec<Usage>,
}

/// An identifier that no local declaration binds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalReference {
    pub name: SmolStr,
    /// Package in effect at the reference.
    pub package: SmolStr,
    pub range: TextRange,
    pub access: Access,
}

/// What an identifier occurrence refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reference<'a> {
    Local {
        id: DeclarationId,
        declaration: &'a Declaration,
        /// Span of the occurrence itself.
        range: TextRange,
    },
    Global(&'a GlobalReference),
}

impl Reference<'_> {
    pub fn range(&self) -> TextRange {
        match self {
            Reference::Local { range, .. } => *range,
            Reference::Global(global) => global.range,
        }
    }
}

/// A replacement of `range` by `new_text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEdit {
    pub range: TextRange,
    pub new_text: SmolStr,
}

/// Scope tree of one file.
#[derive(Clone, Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    declarations: Vec<Declaration>,
    globals: Vec<GlobalReference>,
    declared_at: FxHashMap<TextRange, DeclarationId>,
    used_at: FxHashMap<TextRange, DeclarationId>,
}

impl ScopeTree {
    /// Build the tree for `root`, with `package` in effect before the first
    /// `_package` statement.
    pub fn build(root: &SyntaxNode, package: &str) -> Self {
        let mut builder = ScopeBuilder {
            tree: ScopeTree::default(),
            package: SmolStr::new(package),
        };
        let file = builder.push_scope(ScopeKind::File, root.text_range(), None);
        builder.walk_children(root, file);
        builder.tree
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn declaration(&self, id: DeclarationId) -> &Declaration {
        &self.declarations[id.0 as usize]
    }

    pub fn declarations(&self) -> impl Iterator<Item = (DeclarationId, &Declaration)> {
        self.declarations
            .iter()
            .enumerate()
            .map(|(idx, d)| (DeclarationId(idx as u32), d))
    }

    pub fn globals(&self) -> &[GlobalReference] {
        &self.globals
    }

    /// The declaration introduced by the identifier spanning `range`.
    pub fn declaration_at(&self, range: TextRange) -> Option<DeclarationId> {
        self.declared_at.get(&range).copied()
    }

    /// The declaration the identifier occurrence spanning `range` refers to.
    pub fn usage_target(&self, range: TextRange) -> Option<DeclarationId> {
        self.used_at.get(&range).copied()
    }

    /// Innermost scope containing `offset`.
    pub fn scope_at(&self, offset: TextSize) -> ScopeId {
        let mut current = self.root();
        'descend: loop {
            for &child in &self.scope(current).children {
                if self.scope(child).range.contains_inclusive(offset) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Resolve the identifier occurrence touching `offset`.
    pub fn resolve(&self, offset: TextSize) -> Option<Reference<'_>> {
        let local = self
            .declared_at
            .iter()
            .chain(self.used_at.iter())
            .find(|(range, _)| range.contains_inclusive(offset))
            .map(|(range, &id)| Reference::Local {
                id,
                declaration: self.declaration(id),
                range: *range,
            });
        local.or_else(|| {
            self.globals
                .iter()
                .find(|g| g.range.contains_inclusive(offset))
                .map(Reference::Global)
        })
    }

    /// The local declaration a rename at `offset` would apply to.
    pub fn prepare_rename(&self, offset: TextSize) -> Result<(TextRange, SmolStr), RenameError> {
        match self.resolve(offset) {
            Some(Reference::Local { declaration, range, .. }) => Ok((range, declaration.name.clone())),
            Some(Reference::Global(global)) => Err(RenameError::AmbiguousTarget(format!(
                "'{}' is not a local variable",
                global.name
            ))),
            None => Err(RenameError::AmbiguousTarget("no variable at cursor".to_string())),
        }
    }

    /// Edits renaming the local variable at `offset` to `new_name`: its
    /// declaration and every usage, including through `_import`.
    pub fn rename(&self, offset: TextSize, new_name: &str) -> Result<Vec<TextEdit>, RenameError> {
        if !is_valid_identifier(new_name) {
            return Err(RenameError::InvalidName(new_name.to_string()));
        }
        self.prepare_rename(offset)?;
        let Some(Reference::Local { id, .. }) = self.resolve(offset) else {
            return Err(RenameError::AmbiguousTarget("no variable at cursor".to_string()));
        };

        let mut root = id;
        while let Some(outer) = self.declaration(root).imports {
            root = outer;
        }

        let mut ranges = Vec::new();
        let mut pending = vec![root];
        while let Some(current) = pending.pop() {
            let declaration = self.declaration(current);
            ranges.push(declaration.range);
            ranges.extend(declaration.usages.iter().map(|u| u.range));
            pending.extend(
                self.declarations()
                    .filter(|(_, d)| d.imports == Some(current))
                    .map(|(id, _)| id),
            );
        }
        ranges.sort_by_key(|r| r.start());
        ranges.dedup();

        let new_text = SmolStr::new(new_name);
        Ok(ranges
            .into_iter()
            .map(|range| TextEdit {
                range,
                new_text: new_text.clone(),
            })
            .collect())
    }
}

/// Whether `name` can name a Magik variable.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '!')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '!' | '?'))
}

// ============================================================================
// BUILDER
// ============================================================================

struct ScopeBuilder {
    tree: ScopeTree,
    package: SmolStr,
}

impl ScopeBuilder {
    fn push_scope(&mut self, kind: ScopeKind, range: TextRange, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.tree.scopes.len() as u32);
        self.tree.scopes.push(Scope {
            kind,
            range,
            parent,
            children: Vec::new(),
            declarations: Vec::new(),
        });
        if let Some(parent) = parent {
            self.tree.scopes[parent.0 as usize].children.push(id);
        }
        id
    }

    fn child_scope(&mut self, kind: ScopeKind, node: &SyntaxNode, parent: ScopeId) -> ScopeId {
        self.push_scope(kind, node.text_range(), Some(parent))
    }

    fn declare(&mut self, identifier: &Identifier, kind: DeclarationKind, scope: ScopeId) -> DeclarationId {
        let name = SmolStr::new(identifier.name());
        let range = identifier.name_range();
        self.declare_name(name, range, kind, scope)
    }

    fn declare_name(&mut self, name: SmolStr, range: TextRange, kind: DeclarationKind, scope: ScopeId) -> DeclarationId {
        let imports = match kind {
            DeclarationKind::Import => self
                .tree
                .scope(scope)
                .parent
                .and_then(|outer| self.lookup(&name, outer)),
            _ => None,
        };
        let id = DeclarationId(self.tree.declarations.len() as u32);
        self.tree.declarations.push(Declaration {
            name,
            kind,
            range,
            scope,
            imports,
            usages: Vec::new(),
        });
        self.tree.scopes[scope.0 as usize].declarations.push(id);
        self.tree.declared_at.insert(range, id);
        id
    }

    /// Latest visible declaration of `name` from `scope` outward.
    fn lookup(&self, name: &str, scope: ScopeId) -> Option<DeclarationId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.tree.scope(id);
            let found = scope
                .declarations
                .iter()
                .rev()
                .find(|d| self.tree.declaration(**d).name == name);
            if let Some(found) = found {
                return Some(*found);
            }
            current = scope.parent;
        }
        None
    }

    fn reference(&mut self, identifier: &Identifier, access: Access, scope: ScopeId) {
        let name = identifier.name();
        let range = identifier.name_range();
        match self.lookup(&name, scope) {
            Some(id) => {
                self.tree.declarations[id.0 as usize].usages.push(Usage { range, access });
                self.tree.used_at.insert(range, id);
            }
            None => self.tree.globals.push(GlobalReference {
                name: SmolStr::new(name),
                package: self.package.clone(),
                range,
                access,
            }),
        }
    }

    fn walk_children(&mut self, node: &SyntaxNode, scope: ScopeId) {
        for child in node.children() {
            self.walk(&child, scope);
        }
    }

    fn walk(&mut self, node: &SyntaxNode, scope: ScopeId) {
        match node.kind() {
            SyntaxKind::PACKAGE_SPECIFICATION => {
                if let Some(name) = PackageSpecification::cast(node.clone()).and_then(|p| p.name()) {
                    self.package = SmolStr::new(name);
                }
            }
            SyntaxKind::METHOD_DEFINITION => self.walk_callable(node, ScopeKind::Method, scope),
            SyntaxKind::PROC_DEFINITION => self.walk_callable(node, ScopeKind::Procedure, scope),
            SyntaxKind::BLOCK => {
                let block = self.child_scope(ScopeKind::Block, node, scope);
                self.walk_children(node, block);
            }
            SyntaxKind::BODY => {
                let body = self.child_scope(ScopeKind::Body, node, scope);
                self.walk_children(node, body);
            }
            SyntaxKind::FOR => self.walk_for(node, scope),
            SyntaxKind::LOOP_BODY => {
                let body = self.child_scope(ScopeKind::Loop, node, scope);
                self.walk_children(node, body);
            }
            SyntaxKind::FINALLY => {
                let finally = self.child_scope(ScopeKind::Body, node, scope);
                for child in node.children() {
                    match Identifier::cast(child.clone()) {
                        Some(identifier) => {
                            self.declare(&identifier, DeclarationKind::Local, finally);
                        }
                        None => self.walk(&child, finally),
                    }
                }
            }
            SyntaxKind::TRY => {
                let handler = self.child_scope(ScopeKind::Try, node, scope);
                for child in node.children() {
                    match Identifier::cast(child.clone()) {
                        Some(identifier) => {
                            self.declare(&identifier, DeclarationKind::Local, handler);
                        }
                        None => self.walk(&child, handler),
                    }
                }
            }
            SyntaxKind::VARIABLE_DEFINITION_STATEMENT => self.walk_variable_definitions(node, scope),
            SyntaxKind::ASSIGNMENT_EXPRESSION => {
                let mut expressions = ast::expressions(node);
                let target = expressions.next();
                for value in expressions {
                    self.walk(&value, scope);
                }
                if let Some(target) = target {
                    match Identifier::cast(target.clone()) {
                        Some(identifier) => self.reference(&identifier, Access::Write, scope),
                        None => self.walk(&target, scope),
                    }
                }
            }
            SyntaxKind::IDENTIFIER => {
                if let Some(identifier) = Identifier::cast(node.clone()) {
                    self.reference(&identifier, Access::Read, scope);
                }
            }
            _ => self.walk_children(node, scope),
        }
    }

    fn walk_callable(&mut self, node: &SyntaxNode, kind: ScopeKind, scope: ScopeId) {
        let callable = self.child_scope(kind, node, scope);
        for child in node.children() {
            match child.kind() {
                SyntaxKind::PARAMETERS | SyntaxKind::ASSIGNMENT_PARAMETER => {
                    for parameter in child.children().filter_map(Parameter::cast) {
                        let Some(token) = parameter.name_token() else {
                            continue;
                        };
                        let kind = match parameter.modifier() {
                            ast::ParameterModifier::None => DeclarationKind::Parameter,
                            ast::ParameterModifier::Optional => DeclarationKind::OptionalParameter,
                            ast::ParameterModifier::Gather => DeclarationKind::GatherParameter,
                        };
                        self.declare_name(SmolStr::new(token.text()), token.text_range(), kind, callable);
                    }
                }
                // Parameters and locals share the callable's scope.
                SyntaxKind::BODY => self.walk_children(&child, callable),
                SyntaxKind::EXEMPLAR_NAME | SyntaxKind::METHOD_NAME => {}
                _ => self.walk(&child, callable),
            }
        }
    }

    fn walk_for(&mut self, node: &SyntaxNode, scope: ScopeId) {
        let Some(for_loop) = ast::ForLoop::cast(node.clone()) else {
            return;
        };
        if let Some(iterable) = for_loop.iterable() {
            self.walk(&iterable, scope);
        }
        for child in node.children() {
            match child.kind() {
                SyntaxKind::LOOP_BODY => {
                    let body = self.child_scope(ScopeKind::Loop, &child, scope);
                    for variable in for_loop.variables() {
                        self.declare(&variable, DeclarationKind::LoopIterator, body);
                    }
                    self.walk_children(&child, body);
                }
                SyntaxKind::FINALLY => self.walk(&child, scope),
                _ => {}
            }
        }
    }

    fn walk_variable_definitions(&mut self, node: &SyntaxNode, scope: ScopeId) {
        let Some(statement) = VariableDefinitionStatement::cast(node.clone()) else {
            return;
        };
        let kind = if statement.is_import() {
            DeclarationKind::Import
        } else {
            DeclarationKind::Local
        };
        // Globals are not scoped; they resolve like any unbound name.
        let global = statement.is_global();

        let bind = |this: &mut Self, identifier: &Identifier| {
            if global {
                this.reference(identifier, Access::Write, scope);
            } else {
                this.declare(identifier, kind, scope);
            }
        };

        if let Some(multiple) = statement.multiple_definition() {
            if let Some(value) = multiple.value() {
                self.walk(&value, scope);
            }
            for identifier in multiple.identifiers() {
                bind(self, &identifier);
            }
            return;
        }
        for definition in statement.definitions() {
            if let Some(value) = definition.value() {
                self.walk(&value, scope);
            }
            if let Some(identifier) = definition.identifier() {
                bind(self, &identifier);
            }
        }
    }
}
