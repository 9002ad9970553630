//! Error types for indexing, renaming and caching.

use std::path::PathBuf;

use thiserror::Error;

use crate::base::TextRange;

/// Errors that can occur while indexing a single file.
///
/// These never abort a workspace pass; the indexer turns them into
/// diagnostics at the file boundary.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid Magik.
    #[error("parse error: {message}")]
    Parse { message: String, range: TextRange },

    /// The file is not tracked by the indexer.
    #[error("unknown file: {0}")]
    UnknownFile(PathBuf),
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(message: impl Into<String>, range: TextRange) -> Self {
        Self::Parse {
            message: message.into(),
            range,
        }
    }
}

/// A recognized construct whose shape is invalid.
///
/// Only the affected definition is skipped; sibling definitions in the same
/// file are still produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {construct}: {message}")]
pub struct MalformedConstruct {
    pub construct: &'static str,
    pub message: String,
    pub range: TextRange,
}

impl MalformedConstruct {
    pub fn new(construct: &'static str, message: impl Into<String>, range: TextRange) -> Self {
        Self {
            construct,
            message: message.into(),
            range,
        }
    }
}

/// Errors returned by rename requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenameError {
    /// The cursor does not resolve to exactly one local declaration.
    #[error("cannot rename: {0}")]
    AmbiguousTarget(String),

    /// The new name is not a valid Magik identifier.
    #[error("invalid name: {0}")]
    InvalidName(String),
}

/// Errors reading or writing the warm-start cache.
#[cfg(feature = "persist")]
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cache was written by an incompatible version.
    #[error("unsupported cache version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
}
