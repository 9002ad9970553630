//! Workspace scanning: the files eligible for indexing.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::def_file::is_def_file;
use crate::hir::{AnalysisConfiguration, IndexSummary};
use crate::ide::AnalysisHost;

/// Extension of Magik source files.
pub const MAGIK_EXTENSION: &str = "magik";

/// Collects `.magik`, `product.def` and `module.def` files below a root,
/// skipping ignored paths.
pub struct WorkspaceLoader {
    ignore: GlobSet,
}

impl WorkspaceLoader {
    pub fn new(config: &AnalysisConfiguration) -> Result<Self, String> {
        Ok(Self {
            ignore: build_globset(&config.ignore)?,
        })
    }

    /// All eligible files below `root`, sorted by path.
    pub fn collect_file_paths(&self, root: &Path) -> Result<Vec<PathBuf>, String> {
        if !root.is_dir() {
            return Err(format!("Directory not found: {}", root.display()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(%error, "skipping unreadable workspace entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !(is_magik_file(entry.path()) || is_def_file(entry.path())) {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if self.ignore.is_match(relative) {
                debug!(path = %relative.display(), "ignored");
                continue;
            }
            paths.push(entry.into_path());
        }
        paths.sort();
        Ok(paths)
    }

    /// Index every eligible file below `root` into `host`.
    ///
    /// Files the host tracked that are no longer eligible are removed.
    pub fn load_directory_into_host<P: AsRef<Path>>(
        &self,
        root: P,
        host: &AnalysisHost,
    ) -> Result<IndexSummary, String> {
        let paths = self.collect_file_paths(root.as_ref())?;
        Ok(host.indexer().index_workspace(paths))
    }
}

pub fn is_magik_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MAGIK_EXTENSION)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, String> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        let glob = Glob::new(pattern).map_err(|err| format!("invalid ignore pattern '{pattern}': {err}"))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| format!("failed to build ignore matcher: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collects_magik_files_and_honours_ignores() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("src/a.magik"), "").unwrap();
        fs::write(root.join("src/notes.txt"), "").unwrap();
        fs::write(root.join("src/module.def"), "src_module\n").unwrap();
        fs::write(root.join("product.def"), "ws layered_product\n").unwrap();
        fs::write(root.join("build/b.magik"), "").unwrap();
        fs::write(root.join("build/module.def"), "build_module\n").unwrap();

        let config = AnalysisConfiguration::default().with_ignore(["build/**"]);
        let loader = WorkspaceLoader::new(&config).unwrap();

        assert_eq!(
            loader.collect_file_paths(root).unwrap(),
            vec![root.join("product.def"), root.join("src/a.magik"), root.join("src/module.def")]
        );
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let config = AnalysisConfiguration::default().with_ignore(["a/[b"]);
        assert!(WorkspaceLoader::new(&config).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let loader = WorkspaceLoader::new(&AnalysisConfiguration::default()).unwrap();
        assert!(loader.collect_file_paths(Path::new("/no/such/dir")).is_err());
    }
}
