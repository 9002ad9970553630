//! JSON warm-start cache of the definition keeper.
//!
//! The cache holds definition records grouped by qualified name. File paths
//! are stored as strings and re-interned on load, so file ids need not match
//! between sessions. An undefined result is stored as
//! `__UNDEFINED_RESULT__`, never as a type name.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{debug, info};

use super::definitions::{
    BinaryOperatorDefinition, ConditionDefinition, Definition, ExemplarDefinition, ExemplarKind,
    GlobalDefinition, Location, MethodDefinition, MethodModifier, ModuleDefinition,
    PackageDefinition, ParameterDefinition, ParameterModifier, ProcedureDefinition,
    ProductDefinition, Provenance, SlotDefinition,
};
use super::error::CacheError;
use super::keeper::DefinitionKeeper;
use super::source::FileSet;
use super::typing::{ExpressionResultString, TypeString};
use crate::base::{FileId, TextRange, TextSize};

/// Format version; caches of any other version are rejected.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    definitions: BTreeMap<String, Vec<DefinitionRecord>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProvenanceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<(u32, u32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module: Option<SmolStr>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doc: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParameterRecord {
    name: SmolStr,
    modifier: ParameterModifier,
    type_string: TypeString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<(u32, u32)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SlotRecord {
    name: SmolStr,
    type_string: TypeString,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum DefinitionRecord {
    Package {
        provenance: ProvenanceRecord,
        name: SmolStr,
        uses: Vec<SmolStr>,
    },
    Exemplar {
        provenance: ProvenanceRecord,
        exemplar_kind: ExemplarKind,
        type_string: TypeString,
        slots: Vec<SlotRecord>,
        parents: Vec<TypeString>,
    },
    Method {
        provenance: ProvenanceRecord,
        exemplar: TypeString,
        name: SmolStr,
        modifiers: BTreeSet<MethodModifier>,
        parameters: Vec<ParameterRecord>,
        assignment_parameter: Option<ParameterRecord>,
        conditions: BTreeSet<SmolStr>,
        return_types: ExpressionResultString,
        loop_types: ExpressionResultString,
    },
    Global {
        provenance: ProvenanceRecord,
        type_string: TypeString,
        value_type: TypeString,
        constant: bool,
    },
    Procedure {
        provenance: ProvenanceRecord,
        type_string: TypeString,
        modifiers: BTreeSet<MethodModifier>,
        parameters: Vec<ParameterRecord>,
        return_types: ExpressionResultString,
        loop_types: ExpressionResultString,
    },
    BinaryOperator {
        provenance: ProvenanceRecord,
        package: SmolStr,
        operator: SmolStr,
        lhs: TypeString,
        rhs: TypeString,
        result: TypeString,
    },
    Condition {
        provenance: ProvenanceRecord,
        name: SmolStr,
        parent: Option<SmolStr>,
        data_names: Vec<SmolStr>,
    },
    Product {
        provenance: ProvenanceRecord,
        name: SmolStr,
        product_type: Option<SmolStr>,
        version: Option<SmolStr>,
        title: Option<SmolStr>,
        requires: Vec<SmolStr>,
        parent: Option<SmolStr>,
    },
    Module {
        provenance: ProvenanceRecord,
        name: SmolStr,
        base_version: Option<SmolStr>,
        current_version: Option<SmolStr>,
        requires: Vec<SmolStr>,
        product: Option<SmolStr>,
    },
}

// ============================================================================
// WRITE
// ============================================================================

/// Serialize every non-builtin definition of `keeper` as a cache document.
pub fn to_json(keeper: &DefinitionKeeper, files: &FileSet) -> Result<String, CacheError> {
    let builtins = DefinitionKeeper::new().all_definitions();
    let mut definitions: BTreeMap<String, Vec<DefinitionRecord>> = BTreeMap::new();
    for definition in keeper.all_definitions() {
        if definition.file().is_none() && builtins.contains(&definition) {
            continue;
        }
        definitions
            .entry(definition.qualified_name().to_string())
            .or_default()
            .push(record(&definition, files));
    }
    let document = CacheDocument {
        version: CACHE_VERSION,
        definitions,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Write the cache for `keeper` to `path`.
pub fn write_cache(keeper: &DefinitionKeeper, files: &FileSet, path: &Path) -> Result<(), CacheError> {
    let json = to_json(keeper, files)?;
    fs::write(path, json)?;
    info!(path = %path.display(), definitions = keeper.len(), "wrote definition cache");
    Ok(())
}

fn record(definition: &Definition, files: &FileSet) -> DefinitionRecord {
    let provenance = provenance_record(definition.provenance(), files);
    match definition {
        Definition::Package(d) => DefinitionRecord::Package {
            provenance,
            name: d.name.clone(),
            uses: d.uses.clone(),
        },
        Definition::Exemplar(d) => DefinitionRecord::Exemplar {
            provenance,
            exemplar_kind: d.kind,
            type_string: d.type_string.clone(),
            slots: d
                .slots
                .iter()
                .map(|s| SlotRecord {
                    name: s.name.clone(),
                    type_string: s.type_string.clone(),
                })
                .collect(),
            parents: d.parents.clone(),
        },
        Definition::Method(d) => DefinitionRecord::Method {
            provenance,
            exemplar: d.exemplar.clone(),
            name: d.name.clone(),
            modifiers: d.modifiers.clone(),
            parameters: d.parameters.iter().map(parameter_record).collect(),
            assignment_parameter: d.assignment_parameter.as_ref().map(parameter_record),
            conditions: d.conditions.clone(),
            return_types: d.return_types.clone(),
            loop_types: d.loop_types.clone(),
        },
        Definition::Global(d) => DefinitionRecord::Global {
            provenance,
            type_string: d.type_string.clone(),
            value_type: d.value_type.clone(),
            constant: d.constant,
        },
        Definition::Procedure(d) => DefinitionRecord::Procedure {
            provenance,
            type_string: d.type_string.clone(),
            modifiers: d.modifiers.clone(),
            parameters: d.parameters.iter().map(parameter_record).collect(),
            return_types: d.return_types.clone(),
            loop_types: d.loop_types.clone(),
        },
        Definition::BinaryOperator(d) => DefinitionRecord::BinaryOperator {
            provenance,
            package: d.package.clone(),
            operator: d.operator.clone(),
            lhs: d.lhs.clone(),
            rhs: d.rhs.clone(),
            result: d.result.clone(),
        },
        Definition::Condition(d) => DefinitionRecord::Condition {
            provenance,
            name: d.name.clone(),
            parent: d.parent.clone(),
            data_names: d.data_names.clone(),
        },
        Definition::Product(d) => DefinitionRecord::Product {
            provenance,
            name: d.name.clone(),
            product_type: d.product_type.clone(),
            version: d.version.clone(),
            title: d.title.clone(),
            requires: d.requires.clone(),
            parent: d.parent.clone(),
        },
        Definition::Module(d) => DefinitionRecord::Module {
            provenance,
            name: d.name.clone(),
            base_version: d.base_version.clone(),
            current_version: d.current_version.clone(),
            requires: d.requires.clone(),
            product: d.product.clone(),
        },
    }
}

fn provenance_record(provenance: &Provenance, files: &FileSet) -> ProvenanceRecord {
    let location = provenance.location;
    ProvenanceRecord {
        path: location
            .and_then(|l| files.path(l.file))
            .map(|p| p.to_string_lossy().into_owned()),
        range: location.map(|l| range_record(l.range)),
        module: provenance.module.clone(),
        timestamp: provenance
            .timestamp
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64),
        doc: provenance.doc.as_deref().map(str::to_string),
    }
}

fn parameter_record(parameter: &ParameterDefinition) -> ParameterRecord {
    ParameterRecord {
        name: parameter.name.clone(),
        modifier: parameter.modifier,
        type_string: parameter.type_string.clone(),
        range: parameter.range.map(range_record),
    }
}

fn range_record(range: TextRange) -> (u32, u32) {
    (range.start().into(), range.end().into())
}

// ============================================================================
// READ
// ============================================================================

/// Load a cache document into `keeper`, interning its paths in `files`.
///
/// Each cached file's partition replaces whatever the keeper held for it.
/// Returns the number of definitions loaded.
pub fn from_json(json: &str, keeper: &DefinitionKeeper, files: &FileSet) -> Result<usize, CacheError> {
    let document: CacheDocument = serde_json::from_str(json)?;
    if document.version != CACHE_VERSION {
        return Err(CacheError::Version {
            found: document.version,
            expected: CACHE_VERSION,
        });
    }

    let mut by_file: FxHashMap<FileId, Vec<Definition>> = FxHashMap::default();
    let mut unlocated = Vec::new();
    let mut count = 0;
    for record in document.definitions.into_values().flatten() {
        let definition = definition(record, files);
        count += 1;
        match definition.file() {
            Some(file) => by_file.entry(file).or_default().push(definition),
            None => unlocated.push(definition),
        }
    }

    for (file, definitions) in by_file {
        keeper.replace_file(file, definitions);
    }
    for definition in unlocated {
        keeper.add_definition(definition);
    }
    debug!(count, "loaded definition cache");
    Ok(count)
}

/// Read the cache at `path` into `keeper`.
pub fn read_cache(path: &Path, keeper: &DefinitionKeeper, files: &FileSet) -> Result<usize, CacheError> {
    let json = fs::read_to_string(path)?;
    let count = from_json(&json, keeper, files)?;
    info!(path = %path.display(), count, "read definition cache");
    Ok(count)
}

fn definition(record: DefinitionRecord, files: &FileSet) -> Definition {
    match record {
        DefinitionRecord::Package { provenance, name, uses } => Definition::Package(Arc::new(PackageDefinition {
            provenance: provenance_from(provenance, files),
            name,
            uses,
        })),
        DefinitionRecord::Exemplar {
            provenance,
            exemplar_kind,
            type_string,
            slots,
            parents,
        } => Definition::Exemplar(Arc::new(ExemplarDefinition {
            provenance: provenance_from(provenance, files),
            kind: exemplar_kind,
            type_string,
            slots: slots
                .into_iter()
                .map(|s| SlotDefinition {
                    name: s.name,
                    type_string: s.type_string,
                })
                .collect(),
            parents,
        })),
        DefinitionRecord::Method {
            provenance,
            exemplar,
            name,
            modifiers,
            parameters,
            assignment_parameter,
            conditions,
            return_types,
            loop_types,
        } => Definition::Method(Arc::new(MethodDefinition {
            provenance: provenance_from(provenance, files),
            exemplar,
            name,
            modifiers,
            parameters: parameters.into_iter().map(parameter_from).collect(),
            assignment_parameter: assignment_parameter.map(parameter_from),
            conditions,
            return_types,
            loop_types,
        })),
        DefinitionRecord::Global {
            provenance,
            type_string,
            value_type,
            constant,
        } => Definition::Global(Arc::new(GlobalDefinition {
            provenance: provenance_from(provenance, files),
            type_string,
            value_type,
            constant,
        })),
        DefinitionRecord::Procedure {
            provenance,
            type_string,
            modifiers,
            parameters,
            return_types,
            loop_types,
        } => Definition::Procedure(Arc::new(ProcedureDefinition {
            provenance: provenance_from(provenance, files),
            type_string,
            modifiers,
            parameters: parameters.into_iter().map(parameter_from).collect(),
            return_types,
            loop_types,
        })),
        DefinitionRecord::BinaryOperator {
            provenance,
            package,
            operator,
            lhs,
            rhs,
            result,
        } => Definition::BinaryOperator(Arc::new(BinaryOperatorDefinition {
            provenance: provenance_from(provenance, files),
            package,
            operator,
            lhs,
            rhs,
            result,
        })),
        DefinitionRecord::Condition {
            provenance,
            name,
            parent,
            data_names,
        } => Definition::Condition(Arc::new(ConditionDefinition {
            provenance: provenance_from(provenance, files),
            name,
            parent,
            data_names,
        })),
        DefinitionRecord::Product {
            provenance,
            name,
            product_type,
            version,
            title,
            requires,
            parent,
        } => Definition::Product(Arc::new(ProductDefinition {
            provenance: provenance_from(provenance, files),
            name,
            product_type,
            version,
            title,
            requires,
            parent,
        })),
        DefinitionRecord::Module {
            provenance,
            name,
            base_version,
            current_version,
            requires,
            product,
        } => Definition::Module(Arc::new(ModuleDefinition {
            provenance: provenance_from(provenance, files),
            name,
            base_version,
            current_version,
            requires,
            product,
        })),
    }
}

fn provenance_from(record: ProvenanceRecord, files: &FileSet) -> Provenance {
    let location = match (record.path, record.range) {
        (Some(path), Some(range)) => Some(Location::new(files.file_id(&PathBuf::from(path)), range_from(range))),
        _ => None,
    };
    Provenance {
        location,
        module: record.module,
        timestamp: record
            .timestamp
            .map(|millis| UNIX_EPOCH + Duration::from_millis(millis)),
        doc: record.doc.map(Arc::from),
    }
}

fn parameter_from(record: ParameterRecord) -> ParameterDefinition {
    ParameterDefinition {
        name: record.name,
        modifier: record.modifier,
        type_string: record.type_string,
        range: record.range.map(range_from),
    }
}

fn range_from((start, end): (u32, u32)) -> TextRange {
    TextRange::new(TextSize::from(start), TextSize::from(end.max(start)))
}
