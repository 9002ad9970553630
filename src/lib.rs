//! # magik-base
//!
//! Semantic indexing and type inference for Magik source code.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide      → editor queries (hover, resolve, rename, symbols, inlay hints)
//!   ↓
//! project  → workspace scanning, product.def and module.def files
//!   ↓
//! hir      → definitions, keeper, type resolution, scopes, local types
//!   ↓
//! syntax   → logos lexer, rowan CST, typed wrappers
//!   ↓
//! base     → primitives (FileId, TextRange, LineIndex)
//! ```

/// Foundation types: FileId, text ranges, line index
pub mod base;

/// Semantic model: definitions, type resolution, scopes, local type inference
pub mod hir;

/// IDE features: hover, resolve, rename, workspace symbols, inlay hints
pub mod ide;

/// Workspace management: directory scanning and module lookup
pub mod project;

/// Magik lexer, parser and syntax tree
pub mod syntax;

pub use base::{FileId, LineCol, LineIndex, TextRange, TextSize};
pub use hir::{
    DefinitionKeeper, ExpressionResultString, MagikIndexer, ScopeTree, TypeResolver, TypeString,
};
pub use ide::{Analysis, AnalysisHost};
