//! Foundation types shared by every layer of the indexer.
//!
//! - [`FileId`] - interned handle for a Magik source file
//! - [`TextRange`], [`TextSize`] - byte positions inside a file
//! - [`LineCol`], [`LineIndex`] - line/column conversion for editor positions
//!
//! This module has NO dependencies on other crate modules.

mod file_id;
mod span;

pub use file_id::FileId;
pub use span::{LineCol, LineIndex, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
