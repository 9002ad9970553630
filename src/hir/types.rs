//! Type Keeper: type-level queries over the definition keeper.
//!
//! Parents are stored as unresolved [`TypeString`]s, so inheritance graphs
//! may reference types that are defined later, never, or cyclically. All
//! traversals carry a visited set keyed by the resolved type.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::trace;

use super::definitions::{ExemplarDefinition, ExemplarKind, MethodDefinition};
use super::keeper::DefinitionKeeper;
use super::resolve::resolve_type_string;
use super::typing::TypeString;

/// Result of [`TypeResolver::get_type`]: a known exemplar or a placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedType {
    Exemplar(Arc<ExemplarDefinition>),
    /// A type no exemplar defines. Queries on it yield no parents and no
    /// methods.
    Synthetic(TypeString),
}

impl ResolvedType {
    pub fn type_string(&self) -> &TypeString {
        match self {
            ResolvedType::Exemplar(e) => &e.type_string,
            ResolvedType::Synthetic(t) => t,
        }
    }

    pub fn exemplar(&self) -> Option<&Arc<ExemplarDefinition>> {
        match self {
            ResolvedType::Exemplar(e) => Some(e),
            ResolvedType::Synthetic(_) => None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, ResolvedType::Synthetic(_))
    }
}

#[derive(Default)]
struct Caches {
    generation: u64,
    methods: FxHashMap<(TypeString, SmolStr), Option<Arc<MethodDefinition>>>,
    parents: FxHashMap<TypeString, Arc<[TypeString]>>,
}

/// Answers type questions against a [`DefinitionKeeper`].
///
/// Method and parent lookups are memoized; the memo is dropped whenever the
/// keeper's generation moves.
pub struct TypeResolver {
    keeper: Arc<DefinitionKeeper>,
    caches: Mutex<Caches>,
}

impl TypeResolver {
    pub fn new(keeper: Arc<DefinitionKeeper>) -> Self {
        Self {
            keeper,
            caches: Mutex::new(Caches::default()),
        }
    }

    pub fn keeper(&self) -> &Arc<DefinitionKeeper> {
        &self.keeper
    }

    /// Look up a memoized answer, returning it with the generation it is
    /// valid for.
    fn cached<R>(&self, f: impl FnOnce(&Caches) -> Option<R>) -> (u64, Option<R>) {
        let generation = self.keeper.generation();
        let caches = self.caches.lock();
        let hit = if caches.generation == generation { f(&caches) } else { None };
        (generation, hit)
    }

    /// Store an answer computed while the keeper was at `generation`.
    ///
    /// Dropped if the keeper has moved on since, so an answer computed from
    /// an older state never lands in the caches of a newer one.
    fn remember(&self, generation: u64, f: impl FnOnce(&mut Caches)) {
        let mut caches = self.caches.lock();
        if self.keeper.generation() != generation {
            trace!(generation, "discarding answer computed for an older generation");
            return;
        }
        if caches.generation != generation {
            trace!(from = caches.generation, to = generation, "type caches invalidated");
            *caches = Caches {
                generation,
                ..Caches::default()
            };
        }
        f(&mut caches);
    }

    /// The exemplar `type_string` refers to, or a synthetic placeholder.
    pub fn get_type(&self, type_string: &TypeString) -> ResolvedType {
        resolve_type_string(&self.keeper, &type_string.without_generics())
            .candidates()
            .iter()
            .find_map(|d| d.as_exemplar().cloned())
            .map(ResolvedType::Exemplar)
            .unwrap_or_else(|| ResolvedType::Synthetic(type_string.clone()))
    }

    /// Resolve a global name written in `package` to its type.
    pub fn get_type_by_name(&self, name: &str, package: &str) -> ResolvedType {
        self.get_type(&TypeString::of_identifier(name, package))
    }

    /// All ancestors of `type_string`, each once, depth first in declared
    /// parent order. Unresolvable parents are skipped.
    ///
    /// Slotted and indexed exemplars without declared parents inherit
    /// `sw:object`.
    pub fn get_parents(&self, type_string: &TypeString) -> Arc<[TypeString]> {
        let start = self.get_type(type_string);
        let key = start.type_string().clone();
        let (generation, cached) = self.cached(|c| c.parents.get(&key).cloned());
        if let Some(parents) = cached {
            return parents;
        }

        let mut visited = FxHashSet::default();
        visited.insert(key.clone());
        let mut parents = Vec::new();
        if let ResolvedType::Exemplar(exemplar) = start {
            self.collect_parents(&exemplar, &mut visited, &mut parents);
        }

        let parents: Arc<[TypeString]> = parents.into();
        self.remember(generation, |c| {
            c.parents.insert(key, parents.clone());
        });
        parents
    }

    fn collect_parents(
        &self,
        exemplar: &ExemplarDefinition,
        visited: &mut FxHashSet<TypeString>,
        out: &mut Vec<TypeString>,
    ) {
        for parent in declared_parents(exemplar) {
            let ResolvedType::Exemplar(parent) = self.get_type(&parent) else {
                trace!(parent = %parent, "skipping unresolved parent");
                continue;
            };
            if !visited.insert(parent.type_string.clone()) {
                continue;
            }
            out.push(parent.type_string.clone());
            self.collect_parents(&parent, visited, out);
        }
    }

    /// The method `name` on `type_string`: its own methods first, then
    /// ancestors in [`get_parents`](Self::get_parents) order.
    pub fn get_method(&self, type_string: &TypeString, name: &str) -> Option<Arc<MethodDefinition>> {
        let resolved = self.get_type(type_string);
        let key = (resolved.type_string().clone(), SmolStr::new(name));
        let (generation, cached) = self.cached(|c| c.methods.get(&key).cloned());
        if let Some(cached) = cached {
            return cached;
        }

        let mut found = self.own_method(resolved.type_string(), name);
        if found.is_none() {
            found = self
                .get_parents(resolved.type_string())
                .iter()
                .find_map(|parent| self.own_method(parent, name));
        }

        self.remember(generation, |c| {
            c.methods.insert(key, found.clone());
        });
        found
    }

    /// Methods defined directly on the resolved type `exemplar`.
    pub fn own_methods(&self, exemplar: &TypeString) -> Vec<Arc<MethodDefinition>> {
        let target = self.get_type(exemplar).type_string().clone();
        self.keeper
            .method_candidates(&target)
            .into_iter()
            .filter(|m| m.exemplar.without_generics() == target || self.get_type(&m.exemplar).type_string() == &target)
            .collect()
    }

    fn own_method(&self, exemplar: &TypeString, name: &str) -> Option<Arc<MethodDefinition>> {
        self.own_methods(exemplar).into_iter().find(|m| m.name == name)
    }

    /// Result type of `lhs operator rhs`, if an operator case covers it.
    pub fn get_binary_operator(&self, operator: &str, lhs: &TypeString, rhs: &TypeString) -> Option<TypeString> {
        let lhs = self.get_type(lhs).type_string().clone();
        let rhs = self.get_type(rhs).type_string().clone();
        self.keeper
            .binary_operators(operator)
            .iter()
            .find(|case| {
                self.get_type(&case.lhs).type_string() == &lhs && self.get_type(&case.rhs).type_string() == &rhs
            })
            .map(|case| case.result.clone())
    }
}

fn declared_parents(exemplar: &ExemplarDefinition) -> Vec<TypeString> {
    if !exemplar.parents.is_empty() {
        return exemplar.parents.clone();
    }
    if exemplar.kind == ExemplarKind::Mixin || exemplar.type_string == TypeString::SW_OBJECT {
        return Vec::new();
    }
    vec![TypeString::SW_OBJECT]
}
