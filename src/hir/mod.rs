//! High-level IR: the semantic model of a Magik workspace.
//!
//! ```text
//! indexer     → file events, full/background passes
//!   ↓
//! parsers     → Definitions from one file's syntax tree
//!   ↓
//! keeper      → file-partitioned Definition store
//!   ↓
//! types       → exemplar lookup, parents, method resolution
//! resolve     → package-aware global names
//! ```
//!
//! Per-file analysis lives beside it: [`scope`] builds the scope tree used
//! for reference resolution and renaming, [`reasoner`] infers the types of
//! expressions on top of it.

mod config;
pub mod definitions;
pub mod diagnostics;
pub mod error;
mod indexer;
mod keeper;
pub mod parsers;
#[cfg(feature = "persist")]
pub mod persist;
pub mod reasoner;
pub mod resolve;
pub mod scope;
mod source;
mod types;
pub mod typing;

pub use config::AnalysisConfiguration;
pub use definitions::{Definition, DefinitionKind, MethodDefinition};
pub use diagnostics::{Diagnostic, DiagnosticCollector, Severity, check_file};
pub use error::{IndexError, MalformedConstruct, RenameError};
pub use indexer::{FileOutcome, IndexSummary, MagikIndexer};
pub use keeper::{DefinitionKeeper, FileDelta, SW_PACKAGE, USER_PACKAGE};
pub use reasoner::{LocalTypeReasoner, TypeMap, infer_types};
pub use resolve::{GlobalResolver, ResolveResult};
pub use scope::{Reference, ScopeTree, TextEdit};
pub use source::{FileSet, FileState, SourceFile};
pub use types::{ResolvedType, TypeResolver};
pub use typing::{ExpressionResultString, MAX_ITEMS, TypeDoc, TypeString};

#[cfg(feature = "persist")]
pub use error::CacheError;
