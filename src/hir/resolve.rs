//! Package-aware global name resolution.
//!
//! Unqualified names are looked up in the current package first, then in
//! the packages it uses, depth first in declaration order. `uses` lists may
//! form cycles; each package is searched at most once.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::trace;

use super::definitions::Definition;
use super::keeper::{DefinitionKeeper, USER_PACKAGE};
use super::typing::TypeString;

// ============================================================================
// RESOLUTION RESULT
// ============================================================================

/// Result of resolving a global name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveResult {
    /// Exactly one definition binds the name.
    Found(Definition),
    /// Several definitions bind the name in the first package that has it.
    Ambiguous(Vec<Definition>),
    /// No package in the search order binds the name.
    NotFound,
}

impl ResolveResult {
    /// The resolved definition if unambiguous.
    pub fn definition(&self) -> Option<&Definition> {
        match self {
            ResolveResult::Found(d) => Some(d),
            _ => None,
        }
    }

    /// All candidate definitions.
    pub fn candidates(&self) -> &[Definition] {
        match self {
            ResolveResult::Found(d) => std::slice::from_ref(d),
            ResolveResult::Ambiguous(ds) => ds,
            ResolveResult::NotFound => &[],
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ResolveResult::Found(_))
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ResolveResult::Ambiguous(_))
    }

    fn from_candidates(mut candidates: Vec<Definition>) -> Self {
        match candidates.len() {
            0 => ResolveResult::NotFound,
            1 => ResolveResult::Found(candidates.remove(0)),
            _ => ResolveResult::Ambiguous(candidates),
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolver for global names, relative to a current package.
#[derive(Clone, Debug)]
pub struct GlobalResolver<'a> {
    keeper: &'a DefinitionKeeper,
    package: SmolStr,
}

impl<'a> GlobalResolver<'a> {
    /// A resolver relative to the `user` package.
    pub fn new(keeper: &'a DefinitionKeeper) -> Self {
        Self {
            keeper,
            package: SmolStr::new_inline(USER_PACKAGE),
        }
    }

    pub fn with_package(mut self, package: impl Into<SmolStr>) -> Self {
        self.package = package.into();
        self
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Packages searched for unqualified names, current package first.
    pub fn search_order(&self) -> Vec<SmolStr> {
        search_order(self.keeper, &self.package)
    }

    /// Resolve `name` (`pkg:name` or bare) to the definitions binding it.
    pub fn resolve(&self, name: &str) -> ResolveResult {
        if let Some((package, bare)) = name.split_once(':') {
            return ResolveResult::from_candidates(global_bindings(self.keeper, package, bare));
        }
        for package in self.search_order() {
            let candidates = global_bindings(self.keeper, &package, name);
            if !candidates.is_empty() {
                trace!(name, %package, count = candidates.len(), "resolved global");
                return ResolveResult::from_candidates(candidates);
            }
        }
        ResolveResult::NotFound
    }

    /// The type a global name refers to, if any definition binds it.
    pub fn resolve_type(&self, name: &str) -> Option<TypeString> {
        self.resolve(name).candidates().iter().find_map(binding_type)
    }
}

/// Depth-first walk of `uses`, each package visited once.
pub fn search_order(keeper: &DefinitionKeeper, package: &str) -> Vec<SmolStr> {
    let mut order = Vec::new();
    let mut visited = FxHashSet::default();
    let mut stack = vec![SmolStr::new(package)];

    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(definition) = keeper.package(&current) {
            // Reverse so the first `uses` entry is searched first.
            stack.extend(definition.uses.iter().rev().cloned());
        }
        order.push(current);
    }
    order
}

/// Resolve a type reference as written in `type_string.package()`.
///
/// The reference's own package is searched first, then the packages it uses.
pub fn resolve_type_string(keeper: &DefinitionKeeper, type_string: &TypeString) -> ResolveResult {
    let (Some(package), Some(name)) = (type_string.package(), type_string.name()) else {
        return ResolveResult::NotFound;
    };
    for package in search_order(keeper, package) {
        let candidates = global_bindings(keeper, &package, name);
        if !candidates.is_empty() {
            return ResolveResult::from_candidates(candidates);
        }
    }
    ResolveResult::NotFound
}

fn global_bindings(keeper: &DefinitionKeeper, package: &str, name: &str) -> Vec<Definition> {
    keeper
        .get_definitions(&format!("{package}:{name}"))
        .into_iter()
        .filter(Definition::is_global_binding)
        .collect()
}

fn binding_type(definition: &Definition) -> Option<TypeString> {
    match definition {
        Definition::Exemplar(d) => Some(d.type_string.clone()),
        Definition::Global(d) => Some(d.type_string.clone()),
        Definition::Procedure(d) => Some(d.type_string.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{FileId, TextRange};
    use crate::hir::definitions::{
        ExemplarDefinition, ExemplarKind, Location, PackageDefinition, Provenance,
    };

    fn located(file: u32) -> Provenance {
        Provenance {
            location: Some(Location::new(FileId::new(file), TextRange::default())),
            ..Provenance::default()
        }
    }

    fn package(name: &str, uses: &[&str]) -> Definition {
        PackageDefinition {
            provenance: located(9),
            name: name.into(),
            uses: uses.iter().map(|u| SmolStr::new(u)).collect(),
        }
        .into()
    }

    fn exemplar(package: &str, name: &str, file: u32) -> Definition {
        ExemplarDefinition {
            provenance: located(file),
            kind: ExemplarKind::Slotted,
            type_string: TypeString::simple(package, name),
            slots: Vec::new(),
            parents: Vec::new(),
        }
        .into()
    }

    #[test]
    fn test_search_order_is_cycle_safe() {
        let keeper = DefinitionKeeper::new();
        keeper.add_definition(package("a", &["b", "sw"]));
        keeper.add_definition(package("b", &["a"]));

        let order = GlobalResolver::new(&keeper).with_package("a").search_order();

        assert_eq!(order, vec!["a", "b", "sw"]);
    }

    #[test]
    fn test_unqualified_names_follow_uses() {
        let keeper = DefinitionKeeper::new();
        keeper.add_definition(exemplar("sw", "rope", 1));

        let resolver = GlobalResolver::new(&keeper);

        assert_eq!(resolver.resolve_type("rope"), Some(TypeString::simple("sw", "rope")));
        assert!(resolver.resolve("sw:rope").is_found());
        assert_eq!(resolver.resolve("user:rope"), ResolveResult::NotFound);
    }

    #[test]
    fn test_nearest_package_wins() {
        let keeper = DefinitionKeeper::new();
        keeper.add_definition(exemplar("sw", "thing", 1));
        keeper.add_definition(exemplar("user", "thing", 2));

        let resolver = GlobalResolver::new(&keeper);

        assert_eq!(resolver.resolve_type("thing"), Some(TypeString::simple("user", "thing")));
    }

    #[test]
    fn test_redefinitions_are_ambiguous() {
        let keeper = DefinitionKeeper::new();
        keeper.add_definition(exemplar("user", "thing", 1));
        keeper.add_definition(exemplar("user", "thing", 2));

        let result = GlobalResolver::new(&keeper).resolve("thing");

        assert!(result.is_ambiguous());
        assert_eq!(result.candidates().len(), 2);
    }

    #[test]
    fn test_type_string_resolution_searches_uses() {
        let keeper = DefinitionKeeper::new();
        keeper.add_definition(exemplar("sw", "mixin_a", 1));

        let result = resolve_type_string(&keeper, &TypeString::simple("user", "mixin_a"));

        assert_eq!(result.definition(), Some(&exemplar("sw", "mixin_a", 1)));
    }
}
