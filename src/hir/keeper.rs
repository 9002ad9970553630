//! Definition Keeper: the authoritative, file-partitioned store of definitions.
//!
//! Each file's definitions are held as one immutable `Arc<[Definition]>`
//! partition. Replacing a partition and updating the lookup indices happens
//! inside a single write section, so a reader sees either the old or the new
//! partition of a file, never a mix. The diff against the old partition is
//! computed before that section; the write lock covers only the swap.
//!
//! Replacements may carry the version of the contents they were read from.
//! A replacement older than the one already applied for its file is dropped,
//! so a slow re-index can never undo a newer one.
//!
//! Every change bumps a generation counter; caches built on top of the
//! keeper (method resolution, package search orders) compare generations to
//! detect staleness.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::trace;

use super::definitions::{
    BinaryOperatorDefinition, Definition, ExemplarDefinition, MethodDefinition, ModuleDefinition,
    PackageDefinition, ProductDefinition, Provenance,
};
use super::typing::TypeString;
use crate::base::FileId;

/// Name of the package holding the base system.
pub const SW_PACKAGE: &str = "sw";
/// Name of the package user code lives in by default.
pub const USER_PACKAGE: &str = "user";

/// Net change applied by [`DefinitionKeeper::replace_file`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileDelta {
    pub added: Vec<Definition>,
    pub removed: Vec<Definition>,
}

impl FileDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Default)]
struct KeeperState {
    /// Source-located definitions, one partition per file.
    by_file: FxHashMap<FileId, Arc<[Definition]>>,
    /// Definitions without a source location (built-ins, loaded caches).
    unlocated: Vec<Definition>,
    /// Qualified name -> definitions (several files may define the same name).
    by_name: FxHashMap<SmolStr, Vec<Definition>>,
    /// Unqualified exemplar name -> methods defined on it.
    ///
    /// Keyed by bare name because `_method rope.add` written in package
    /// `user` may well define a method on `sw:rope`.
    methods: FxHashMap<SmolStr, Vec<Arc<MethodDefinition>>>,
    /// Operator -> binary operator cases.
    operators: FxHashMap<SmolStr, Vec<Arc<BinaryOperatorDefinition>>>,
    /// Contents version of the last versioned replacement per file.
    versions: FxHashMap<FileId, u64>,
}

/// Version recorded for a removed file; nothing replaces it afterwards.
const RETIRED: u64 = u64::MAX;

fn exemplar_key(exemplar: &TypeString) -> SmolStr {
    SmolStr::new(exemplar.name().unwrap_or_default())
}

impl KeeperState {
    fn index(&mut self, definition: &Definition) {
        self.by_name
            .entry(definition.qualified_name())
            .or_default()
            .push(definition.clone());
        if let Some(method) = definition.as_method() {
            self.methods
                .entry(exemplar_key(&method.exemplar))
                .or_default()
                .push(method.clone());
        }
        if let Some(operator) = definition.as_binary_operator() {
            self.operators
                .entry(operator.operator.clone())
                .or_default()
                .push(operator.clone());
        }
    }

    /// Drop `removed` from the lookup indices, one pass per touched key.
    fn unindex(&mut self, removed: &[Definition]) {
        let mut names: FxHashMap<SmolStr, FxHashSet<&Definition>> = FxHashMap::default();
        let mut methods: FxHashMap<SmolStr, FxHashSet<&MethodDefinition>> = FxHashMap::default();
        let mut operators: FxHashMap<SmolStr, FxHashSet<&BinaryOperatorDefinition>> = FxHashMap::default();
        for definition in removed {
            names.entry(definition.qualified_name()).or_default().insert(definition);
            if let Some(method) = definition.as_method() {
                methods
                    .entry(exemplar_key(&method.exemplar))
                    .or_default()
                    .insert(method.as_ref());
            }
            if let Some(operator) = definition.as_binary_operator() {
                operators
                    .entry(operator.operator.clone())
                    .or_default()
                    .insert(operator.as_ref());
            }
        }

        retain_unremoved(&mut self.by_name, names, |d| d);
        retain_unremoved(&mut self.methods, methods, |m| m.as_ref());
        retain_unremoved(&mut self.operators, operators, |o| o.as_ref());
    }

    fn partition(&self, file: FileId) -> Option<Arc<[Definition]>> {
        self.by_file.get(&file).cloned()
    }

    fn is_superseded(&self, file: FileId, version: Option<u64>) -> bool {
        match (version, self.versions.get(&file)) {
            (Some(version), Some(&applied)) => version < applied,
            (None, Some(&applied)) => applied == RETIRED,
            _ => false,
        }
    }

    fn with_builtins() -> Self {
        let mut state = KeeperState::default();
        for definition in builtin_packages() {
            state.index(&definition);
            state.unlocated.push(definition);
        }
        state
    }
}

/// The implicit packages: `sw` (uses nothing) and `user` (uses `sw`).
fn builtin_packages() -> [Definition; 2] {
    [
        PackageDefinition {
            provenance: Provenance::default(),
            name: SmolStr::new_inline(SW_PACKAGE),
            uses: Vec::new(),
        }
        .into(),
        PackageDefinition {
            provenance: Provenance::default(),
            name: SmolStr::new_inline(USER_PACKAGE),
            uses: vec![SmolStr::new_inline(SW_PACKAGE)],
        }
        .into(),
    ]
}

fn retain_unremoved<T, U: Eq + Hash + ?Sized>(
    index: &mut FxHashMap<SmolStr, Vec<T>>,
    removed: FxHashMap<SmolStr, FxHashSet<&U>>,
    view: impl Fn(&T) -> &U,
) {
    for (key, removed) in removed {
        if let Some(list) = index.get_mut(&key) {
            list.retain(|item| !removed.contains(view(item)));
            if list.is_empty() {
                index.remove(&key);
            }
        }
    }
}

fn same_partition(a: &Option<Arc<[Definition]>>, b: &Option<Arc<[Definition]>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl FileDelta {
    fn between(old: &[Definition], new: &[Definition]) -> Self {
        let old_set: FxHashSet<&Definition> = old.iter().collect();
        let new_set: FxHashSet<&Definition> = new.iter().collect();
        FileDelta {
            added: new.iter().filter(|d| !old_set.contains(d)).cloned().collect(),
            removed: old.iter().filter(|d| !new_set.contains(d)).cloned().collect(),
        }
    }
}

/// Keep the last definition per key, in first-seen order.
fn dedup_by_key(definitions: Vec<Definition>) -> Vec<Definition> {
    let mut unique = IndexMap::with_capacity(definitions.len());
    for definition in definitions {
        unique.insert(definition.key(), definition);
    }
    unique.into_values().collect()
}

/// Thread-safe store of all known definitions.
pub struct DefinitionKeeper {
    state: RwLock<KeeperState>,
    generation: AtomicU64,
}

impl Default for DefinitionKeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefinitionKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("DefinitionKeeper")
            .field("files", &state.by_file.len())
            .field("names", &state.by_name.len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl DefinitionKeeper {
    /// A keeper holding only the implicit `sw` and `user` packages.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(KeeperState::with_builtins()),
            generation: AtomicU64::new(0),
        }
    }

    /// Counter bumped by every change to the keeper's content.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Add a single definition, to its file's partition if it has a location.
    pub fn add_definition(&self, definition: Definition) {
        let mut state = self.state.write();
        match definition.file() {
            Some(file) => {
                let mut partition: Vec<_> = state
                    .by_file
                    .get(&file)
                    .map(|p| p.to_vec())
                    .unwrap_or_default();
                partition.push(definition.clone());
                state.by_file.insert(file, partition.into());
            }
            None => state.unlocated.push(definition.clone()),
        }
        state.index(&definition);
        drop(state);
        self.bump();
    }

    /// Atomically replace everything attributed to `file` with `definitions`.
    ///
    /// Definitions sharing a key are collapsed, the last one winning.
    /// Returns the net change; an unchanged file leaves the generation as is.
    pub fn replace_file(&self, file: FileId, definitions: Vec<Definition>) -> FileDelta {
        self.replace(file, None, definitions).unwrap_or_default()
    }

    /// Like [`replace_file`](Self::replace_file), for definitions read from
    /// version `version` of the file's contents.
    ///
    /// Returns `None`, changing nothing, when a newer version has already
    /// been applied or the file was removed.
    pub fn replace_file_at_version(
        &self,
        file: FileId,
        version: u64,
        definitions: Vec<Definition>,
    ) -> Option<FileDelta> {
        self.replace(file, Some(version), definitions)
    }

    fn replace(&self, file: FileId, version: Option<u64>, definitions: Vec<Definition>) -> Option<FileDelta> {
        let definitions = dedup_by_key(definitions);
        loop {
            let old = {
                let state = self.state.read();
                if state.is_superseded(file, version) {
                    trace!(%file, ?version, "dropping superseded replacement");
                    return None;
                }
                state.partition(file)
            };
            let delta = FileDelta::between(old.as_deref().unwrap_or_default(), &definitions);

            let mut state = self.state.write();
            if state.is_superseded(file, version) {
                trace!(%file, ?version, "dropping superseded replacement");
                return None;
            }
            if !same_partition(&state.partition(file), &old) {
                // Another replacement landed since the diff; diff again.
                continue;
            }
            if let Some(version) = version {
                state.versions.insert(file, version);
            }
            if delta.is_empty() {
                return Some(delta);
            }

            state.unindex(&delta.removed);
            for definition in &delta.added {
                state.index(definition);
            }
            if definitions.is_empty() {
                state.by_file.remove(&file);
            } else {
                state.by_file.insert(file, definitions.into());
            }
            drop(state);

            trace!(%file, added = delta.added.len(), removed = delta.removed.len(), "replaced file partition");
            self.bump();
            return Some(delta);
        }
    }

    /// Remove every definition attributed to `file`, returning them.
    ///
    /// The file id is retired: later replacements for it are ignored.
    pub fn remove_definitions_for_file(&self, file: FileId) -> Vec<Definition> {
        let mut state = self.state.write();
        state.versions.insert(file, RETIRED);
        let Some(removed) = state.by_file.remove(&file) else {
            return Vec::new();
        };
        state.unindex(&removed);
        drop(state);
        self.bump();
        removed.to_vec()
    }

    /// Drop everything except the implicit packages.
    pub fn clear(&self) {
        *self.state.write() = KeeperState::with_builtins();
        self.bump();
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// All definitions registered under a qualified name.
    pub fn get_definitions(&self, qualified_name: &str) -> Vec<Definition> {
        self.state
            .read()
            .by_name
            .get(qualified_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the definitions attributed to `file`.
    pub fn get_definitions_in_file(&self, file: FileId) -> Arc<[Definition]> {
        self.state
            .read()
            .by_file
            .get(&file)
            .cloned()
            .unwrap_or_else(|| Arc::from([]))
    }

    /// Every definition, located and unlocated.
    pub fn all_definitions(&self) -> Vec<Definition> {
        let state = self.state.read();
        state
            .unlocated
            .iter()
            .chain(state.by_file.values().flat_map(|p| p.iter()))
            .cloned()
            .collect()
    }

    pub fn files(&self) -> Vec<FileId> {
        let mut files: Vec<_> = self.state.read().by_file.keys().copied().collect();
        files.sort();
        files
    }

    pub fn package(&self, name: &str) -> Option<Arc<PackageDefinition>> {
        self.get_definitions(name)
            .iter()
            .find_map(|d| d.as_package().cloned())
    }

    pub fn product(&self, name: &str) -> Option<Arc<ProductDefinition>> {
        self.get_definitions(name)
            .iter()
            .find_map(|d| d.as_product().cloned())
    }

    pub fn module(&self, name: &str) -> Option<Arc<ModuleDefinition>> {
        self.get_definitions(name)
            .iter()
            .find_map(|d| d.as_module().cloned())
    }

    /// Exemplars registered under `type_string` (generic arguments ignored).
    pub fn exemplars(&self, type_string: &TypeString) -> Vec<Arc<ExemplarDefinition>> {
        self.get_definitions(&type_string.without_generics().full_string())
            .iter()
            .filter_map(|d| d.as_exemplar().cloned())
            .collect()
    }

    /// Methods on any exemplar whose unqualified name matches `exemplar`'s.
    ///
    /// Callers decide which of the written exemplar references denote the
    /// type they are after.
    pub fn method_candidates(&self, exemplar: &TypeString) -> Vec<Arc<MethodDefinition>> {
        self.state
            .read()
            .methods
            .get(&exemplar_key(exemplar))
            .cloned()
            .unwrap_or_default()
    }

    /// Methods written as defined on exactly `exemplar`.
    pub fn methods_of(&self, exemplar: &TypeString) -> Vec<Arc<MethodDefinition>> {
        let exemplar = exemplar.without_generics();
        self.method_candidates(&exemplar)
            .into_iter()
            .filter(|m| m.exemplar.without_generics() == exemplar)
            .collect()
    }

    /// Binary operator cases for `operator`.
    pub fn binary_operators(&self, operator: &str) -> Vec<Arc<BinaryOperatorDefinition>> {
        self.state
            .read()
            .operators
            .get(operator)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of qualified names known.
    pub fn len(&self) -> usize {
        self.state.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
