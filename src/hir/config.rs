//! Analysis options

use smol_str::SmolStr;

use super::keeper::USER_PACKAGE;

/// Options controlling workspace scanning and indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persist", derive(serde::Deserialize))]
#[cfg_attr(feature = "persist", serde(default, rename_all = "camelCase"))]
pub struct AnalysisConfiguration {
    /// Glob patterns, relative to the workspace root, of files to skip
    pub ignore: Vec<String>,
    /// Threads used for a full index (0 = rayon's default)
    pub max_index_threads: usize,
    /// Package in effect before a file's first `_package` statement
    pub default_package: SmolStr,
}

impl Default for AnalysisConfiguration {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            max_index_threads: 0,
            default_package: SmolStr::new_inline(USER_PACKAGE),
        }
    }
}

impl AnalysisConfiguration {
    pub fn with_ignore(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_index_threads(mut self, threads: usize) -> Self {
        self.max_index_threads = threads;
        self
    }

    pub fn with_default_package(mut self, package: impl Into<SmolStr>) -> Self {
        self.default_package = package.into();
        self
    }
}
