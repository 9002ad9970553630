//! Definition model — immutable records of what source code defines.
//!
//! Definitions are produced by the parsers in [`super::parsers`], stored in
//! the [`super::DefinitionKeeper`] and queried through the
//! [`super::TypeResolver`]. Each variant is behind an `Arc`, so cloning a
//! [`Definition`] is cheap.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use smol_str::SmolStr;

use super::typing::{ExpressionResultString, TypeString};
use crate::base::{FileId, TextRange};

pub use crate::syntax::ast::ParameterModifier;

// ============================================================================
// PROVENANCE
// ============================================================================

/// Where a definition lives in source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: FileId,
    pub range: TextRange,
}

impl Location {
    pub fn new(file: FileId, range: TextRange) -> Self {
        Self { file, range }
    }
}

/// Provenance shared by every definition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Provenance {
    pub location: Option<Location>,
    /// Module (from the nearest `module.def`) the file belongs to.
    pub module: Option<SmolStr>,
    pub timestamp: Option<SystemTime>,
    pub doc: Option<Arc<str>>,
}

impl Provenance {
    pub fn file(&self) -> Option<FileId> {
        self.location.map(|l| l.file)
    }
}

// ============================================================================
// DEFINITION RECORDS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageDefinition {
    pub provenance: Provenance,
    pub name: SmolStr,
    /// Packages searched, in order, for unqualified names.
    pub uses: Vec<SmolStr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum ExemplarKind {
    Slotted,
    Indexed,
    Mixin,
}

impl ExemplarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExemplarKind::Slotted => "slotted",
            ExemplarKind::Indexed => "indexed",
            ExemplarKind::Mixin => "mixin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotDefinition {
    pub name: SmolStr,
    pub type_string: TypeString,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExemplarDefinition {
    pub provenance: Provenance,
    pub kind: ExemplarKind,
    /// The exemplar's own (qualified) type.
    pub type_string: TypeString,
    pub slots: Vec<SlotDefinition>,
    /// Declared parents, unresolved and in declaration order.
    pub parents: Vec<TypeString>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum MethodModifier {
    Private,
    Abstract,
    Iter,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParameterDefinition {
    pub name: SmolStr,
    pub modifier: ParameterModifier,
    pub type_string: TypeString,
    pub range: Option<TextRange>,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<SmolStr>, modifier: ParameterModifier, type_string: TypeString) -> Self {
        Self {
            name: name.into(),
            modifier,
            type_string,
            range: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDefinition {
    pub provenance: Provenance,
    /// The exemplar the method is defined on.
    pub exemplar: TypeString,
    /// Name including `()`, `<<` and `^<<` suffixes.
    pub name: SmolStr,
    pub modifiers: BTreeSet<MethodModifier>,
    pub parameters: Vec<ParameterDefinition>,
    pub assignment_parameter: Option<ParameterDefinition>,
    /// Conditions raised from the body.
    pub conditions: BTreeSet<SmolStr>,
    pub return_types: ExpressionResultString,
    /// Types yielded per iteration by `_iter` methods.
    pub loop_types: ExpressionResultString,
}

impl MethodDefinition {
    pub fn is_private(&self) -> bool {
        self.modifiers.contains(&MethodModifier::Private)
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(&MethodModifier::Abstract)
    }

    pub fn is_iter(&self) -> bool {
        self.modifiers.contains(&MethodModifier::Iter)
    }

    /// `exemplar.name`, e.g. `sw:rope.add()`.
    pub fn signature(&self) -> String {
        format!("{}.{}", self.exemplar, self.name)
    }
}

/// A global variable or constant (`_global`, shared constants are methods).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlobalDefinition {
    pub provenance: Provenance,
    pub type_string: TypeString,
    /// Declared type of the value.
    pub value_type: TypeString,
    pub constant: bool,
}

/// A procedure bound to a global.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcedureDefinition {
    pub provenance: Provenance,
    pub type_string: TypeString,
    pub modifiers: BTreeSet<MethodModifier>,
    pub parameters: Vec<ParameterDefinition>,
    pub return_types: ExpressionResultString,
    pub loop_types: ExpressionResultString,
}

/// `define_binary_operator_case(:op, lhs, rhs, _proc ...)`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BinaryOperatorDefinition {
    pub provenance: Provenance,
    pub package: SmolStr,
    pub operator: SmolStr,
    pub lhs: TypeString,
    pub rhs: TypeString,
    pub result: TypeString,
}

/// `condition.define_condition(:name, :parent, {:data ...})`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConditionDefinition {
    pub provenance: Provenance,
    pub name: SmolStr,
    pub parent: Option<SmolStr>,
    pub data_names: Vec<SmolStr>,
}

/// A product declared by a `product.def`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProductDefinition {
    pub provenance: Provenance,
    pub name: SmolStr,
    /// `layered_product`, `customisation_product`, ... as written.
    pub product_type: Option<SmolStr>,
    pub version: Option<SmolStr>,
    pub title: Option<SmolStr>,
    pub requires: Vec<SmolStr>,
    /// The product whose directory encloses this one.
    pub parent: Option<SmolStr>,
}

/// A module declared by a `module.def`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleDefinition {
    pub provenance: Provenance,
    pub name: SmolStr,
    /// Version on the header line.
    pub base_version: Option<SmolStr>,
    /// Version from a `version` line, when it differs from the base.
    pub current_version: Option<SmolStr>,
    pub requires: Vec<SmolStr>,
    /// The product the module belongs to.
    pub product: Option<SmolStr>,
}

// ============================================================================
// DEFINITION
// ============================================================================

/// The kind of a [`Definition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "persist", derive(serde::Serialize, serde::Deserialize))]
pub enum DefinitionKind {
    Package,
    Exemplar,
    Method,
    Global,
    Procedure,
    BinaryOperator,
    Condition,
    Product,
    Module,
}

impl DefinitionKind {
    pub fn display(&self) -> &'static str {
        match self {
            DefinitionKind::Package => "package",
            DefinitionKind::Exemplar => "exemplar",
            DefinitionKind::Method => "method",
            DefinitionKind::Global => "global",
            DefinitionKind::Procedure => "procedure",
            DefinitionKind::BinaryOperator => "binary operator",
            DefinitionKind::Condition => "condition",
            DefinitionKind::Product => "product",
            DefinitionKind::Module => "module",
        }
    }
}

/// Any definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Definition {
    Package(Arc<PackageDefinition>),
    Exemplar(Arc<ExemplarDefinition>),
    Method(Arc<MethodDefinition>),
    Global(Arc<GlobalDefinition>),
    Procedure(Arc<ProcedureDefinition>),
    BinaryOperator(Arc<BinaryOperatorDefinition>),
    Condition(Arc<ConditionDefinition>),
    Product(Arc<ProductDefinition>),
    Module(Arc<ModuleDefinition>),
}

/// Identity of a definition for indexing: (package, name, kind, owning file).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionKey {
    pub package: SmolStr,
    pub name: SmolStr,
    pub kind: DefinitionKind,
    pub file: Option<FileId>,
}

impl Definition {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Definition::Package(_) => DefinitionKind::Package,
            Definition::Exemplar(_) => DefinitionKind::Exemplar,
            Definition::Method(_) => DefinitionKind::Method,
            Definition::Global(_) => DefinitionKind::Global,
            Definition::Procedure(_) => DefinitionKind::Procedure,
            Definition::BinaryOperator(_) => DefinitionKind::BinaryOperator,
            Definition::Condition(_) => DefinitionKind::Condition,
            Definition::Product(_) => DefinitionKind::Product,
            Definition::Module(_) => DefinitionKind::Module,
        }
    }

    pub fn provenance(&self) -> &Provenance {
        match self {
            Definition::Package(d) => &d.provenance,
            Definition::Exemplar(d) => &d.provenance,
            Definition::Method(d) => &d.provenance,
            Definition::Global(d) => &d.provenance,
            Definition::Procedure(d) => &d.provenance,
            Definition::BinaryOperator(d) => &d.provenance,
            Definition::Condition(d) => &d.provenance,
            Definition::Product(d) => &d.provenance,
            Definition::Module(d) => &d.provenance,
        }
    }

    pub fn location(&self) -> Option<Location> {
        self.provenance().location
    }

    pub fn file(&self) -> Option<FileId> {
        self.provenance().file()
    }

    pub fn doc(&self) -> Option<&str> {
        self.provenance().doc.as_deref()
    }

    /// The package the definition's name lives in.
    pub fn package(&self) -> SmolStr {
        match self {
            Definition::Package(d) => d.name.clone(),
            Definition::Exemplar(d) => package_of(&d.type_string),
            Definition::Method(d) => package_of(&d.exemplar),
            Definition::Global(d) => package_of(&d.type_string),
            Definition::Procedure(d) => package_of(&d.type_string),
            Definition::BinaryOperator(d) => d.package.clone(),
            Definition::Condition(_) => SmolStr::new_inline("sw"),
            Definition::Product(_) | Definition::Module(_) => SmolStr::default(),
        }
    }

    /// The unqualified name.
    pub fn name(&self) -> SmolStr {
        match self {
            Definition::Package(d) => d.name.clone(),
            Definition::Exemplar(d) => name_of(&d.type_string),
            Definition::Method(d) => SmolStr::new(format!("{}.{}", name_of(&d.exemplar), d.name)),
            Definition::Global(d) => name_of(&d.type_string),
            Definition::Procedure(d) => name_of(&d.type_string),
            Definition::BinaryOperator(d) => {
                SmolStr::new(format!("{} {} {}", d.lhs, d.operator, d.rhs))
            }
            Definition::Condition(d) => d.name.clone(),
            Definition::Product(d) => d.name.clone(),
            Definition::Module(d) => d.name.clone(),
        }
    }

    /// Lookup key in the keeper's name index.
    ///
    /// Packages, conditions, products and modules have their own namespaces
    /// and are keyed by bare name; everything else by `package:name`.
    pub fn qualified_name(&self) -> SmolStr {
        match self {
            Definition::Package(d) => d.name.clone(),
            Definition::Condition(d) => d.name.clone(),
            Definition::Product(d) => d.name.clone(),
            Definition::Module(d) => d.name.clone(),
            other => SmolStr::new(format!("{}:{}", other.package(), other.name())),
        }
    }

    pub fn key(&self) -> DefinitionKey {
        DefinitionKey {
            package: self.package(),
            name: self.name(),
            kind: self.kind(),
            file: self.file(),
        }
    }

    pub fn as_exemplar(&self) -> Option<&Arc<ExemplarDefinition>> {
        match self {
            Definition::Exemplar(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&Arc<MethodDefinition>> {
        match self {
            Definition::Method(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_package(&self) -> Option<&Arc<PackageDefinition>> {
        match self {
            Definition::Package(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_global(&self) -> Option<&Arc<GlobalDefinition>> {
        match self {
            Definition::Global(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&Arc<ProcedureDefinition>> {
        match self {
            Definition::Procedure(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_binary_operator(&self) -> Option<&Arc<BinaryOperatorDefinition>> {
        match self {
            Definition::BinaryOperator(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<&Arc<ConditionDefinition>> {
        match self {
            Definition::Condition(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_product(&self) -> Option<&Arc<ProductDefinition>> {
        match self {
            Definition::Product(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&Arc<ModuleDefinition>> {
        match self {
            Definition::Module(d) => Some(d),
            _ => None,
        }
    }

    /// Whether this definition binds a global name (exemplar, global or procedure).
    pub fn is_global_binding(&self) -> bool {
        matches!(
            self,
            Definition::Exemplar(_) | Definition::Global(_) | Definition::Procedure(_)
        )
    }
}

fn package_of(type_string: &TypeString) -> SmolStr {
    SmolStr::new(type_string.package().unwrap_or_default())
}

fn name_of(type_string: &TypeString) -> SmolStr {
    SmolStr::new(type_string.name().unwrap_or_default())
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind().display(), self.qualified_name())
    }
}

macro_rules! impl_from_definition {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Definition {
                fn from(definition: $ty) -> Self {
                    Definition::$variant(Arc::new(definition))
                }
            }
        )*
    };
}

impl_from_definition! {
    Package => PackageDefinition,
    Exemplar => ExemplarDefinition,
    Method => MethodDefinition,
    Global => GlobalDefinition,
    Procedure => ProcedureDefinition,
    BinaryOperator => BinaryOperatorDefinition,
    Condition => ConditionDefinition,
    Product => ProductDefinition,
    Module => ModuleDefinition,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(exemplar: TypeString, name: &str) -> MethodDefinition {
        MethodDefinition {
            provenance: Provenance::default(),
            exemplar,
            name: name.into(),
            modifiers: BTreeSet::new(),
            parameters: Vec::new(),
            assignment_parameter: None,
            conditions: BTreeSet::new(),
            return_types: ExpressionResultString::undefined(),
            loop_types: ExpressionResultString::empty(),
        }
    }

    #[test]
    fn test_method_names() {
        let definition: Definition = method(TypeString::SW_OBJECT, "show()").into();

        assert_eq!(definition.kind(), DefinitionKind::Method);
        assert_eq!(definition.package(), "sw");
        assert_eq!(definition.name(), "object.show()");
        assert_eq!(definition.qualified_name(), "sw:object.show()");
        assert_eq!(definition.to_string(), "method sw:object.show()");
    }

    #[test]
    fn test_exemplar_names() {
        let definition: Definition = ExemplarDefinition {
            provenance: Provenance::default(),
            kind: ExemplarKind::Mixin,
            type_string: TypeString::simple("user", "thing"),
            slots: Vec::new(),
            parents: Vec::new(),
        }
        .into();

        assert_eq!(definition.qualified_name(), "user:thing");
        assert!(definition.is_global_binding());
        assert!(definition.as_exemplar().is_some());
        assert!(definition.as_method().is_none());
    }

    #[test]
    fn test_key_includes_file() {
        let mut located = method(TypeString::SW_OBJECT, "a");
        located.provenance.location = Some(Location::new(FileId::new(3), TextRange::default()));
        let located: Definition = located.into();
        let unlocated: Definition = method(TypeString::SW_OBJECT, "a").into();

        assert_ne!(located.key(), unlocated.key());
        assert_eq!(located.key().file, Some(FileId::new(3)));
    }
}
