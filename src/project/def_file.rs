//! Readers for `product.def` and `module.def` files.
//!
//! Both open with a header line `<name> [...]` followed by keyword lines.
//! A block keyword alone on its line opens a block running to a line that
//! reads `end`; any other keyword line is a one-line entry. Lines starting
//! with `#` are comments.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use smol_str::SmolStr;
use tracing::warn;

use super::module_def::MODULE_DEF;
use crate::base::{FileId, TextRange, TextSize};
use crate::hir::IndexError;
use crate::hir::definitions::{Definition, Location, ModuleDefinition, ProductDefinition, Provenance};

/// File name of a product definition.
pub const PRODUCT_DEF: &str = "product.def";

const BLOCK_KEYWORDS: &[&str] = &[
    "description",
    "title",
    "requires",
    "optional",
    "test_modules",
    "install_requires",
    "required_by",
    "templates",
    "children",
];

/// Whether `path` names a `product.def` or `module.def`.
pub fn is_def_file(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == PRODUCT_DEF || name == MODULE_DEF)
}

/// Name of the product whose `product.def` is in `dir` or above it.
pub fn product_name_for(dir: &Path) -> Option<SmolStr> {
    let product_def = dir
        .ancestors()
        .map(|dir| dir.join(PRODUCT_DEF))
        .find(|candidate| candidate.is_file())?;
    match fs::read_to_string(&product_def) {
        Ok(text) => DefFile::parse(&text).ok().map(|def| SmolStr::new(def.name)),
        Err(error) => {
            warn!(path = %product_def.display(), %error, "failed to read product.def");
            None
        }
    }
}

/// Read the definition a `.def` file declares, or `None` for other files.
pub fn read_def_file(
    file: FileId,
    path: &Path,
    text: &str,
    timestamp: Option<SystemTime>,
) -> Option<Result<Definition, IndexError>> {
    let name = path.file_name()?;
    let dir = path.parent();
    if name == PRODUCT_DEF {
        let parent = dir.and_then(Path::parent).and_then(product_name_for);
        Some(read_product_def(file, text, timestamp, parent).map(Definition::from))
    } else if name == MODULE_DEF {
        let product = dir.and_then(product_name_for);
        Some(read_module_def(file, text, timestamp, product).map(Definition::from))
    } else {
        None
    }
}

pub fn read_product_def(
    file: FileId,
    text: &str,
    timestamp: Option<SystemTime>,
    parent: Option<SmolStr>,
) -> Result<ProductDefinition, IndexError> {
    let def = DefFile::parse(text)?;
    Ok(ProductDefinition {
        provenance: def.provenance(file, timestamp, None),
        name: SmolStr::new(def.name),
        product_type: def.header.first().map(|t| SmolStr::new(t)),
        version: def.value("version").map(SmolStr::new),
        title: def.value("title").map(SmolStr::new),
        requires: def.names("requires"),
        parent,
    })
}

pub fn read_module_def(
    file: FileId,
    text: &str,
    timestamp: Option<SystemTime>,
    product: Option<SmolStr>,
) -> Result<ModuleDefinition, IndexError> {
    let def = DefFile::parse(text)?;
    let name = SmolStr::new(def.name);
    let base_version = def.header.first().map(|t| SmolStr::new(t));
    let current_version = def
        .value("version")
        .and_then(|v| v.split_whitespace().next())
        .map(SmolStr::new)
        .filter(|v| Some(v) != base_version.as_ref());
    Ok(ModuleDefinition {
        provenance: def.provenance(file, timestamp, Some(name.clone())),
        name,
        base_version,
        current_version,
        requires: def.names("requires"),
        product,
    })
}

#[derive(Debug)]
struct Entry<'a> {
    keyword: &'a str,
    /// Text after the keyword on a one-line entry.
    value: Option<&'a str>,
    /// Lines of a block entry.
    lines: Vec<&'a str>,
}

#[derive(Debug)]
struct DefFile<'a> {
    name: &'a str,
    name_range: TextRange,
    /// Words after the name on the header line.
    header: Vec<&'a str>,
    entries: Vec<Entry<'a>>,
}

impl<'a> DefFile<'a> {
    fn parse(text: &'a str) -> Result<Self, IndexError> {
        let mut lines = significant_lines(text);
        let Some((offset, header)) = lines.next() else {
            return Err(IndexError::parse("missing header line", TextRange::empty(TextSize::of(text))));
        };
        let mut words = header.split_whitespace();
        let name = words.next().unwrap_or_default();
        let mut def = DefFile {
            name,
            name_range: TextRange::at(offset, TextSize::of(name)),
            header: words.collect(),
            entries: Vec::new(),
        };

        while let Some((offset, line)) = lines.next() {
            let (keyword, rest) = match line.split_once(char::is_whitespace) {
                Some((keyword, rest)) => (keyword, rest.trim()),
                None => (line, ""),
            };
            if !rest.is_empty() || !BLOCK_KEYWORDS.contains(&keyword) {
                def.entries.push(Entry {
                    keyword,
                    value: Some(rest).filter(|r| !r.is_empty()),
                    lines: Vec::new(),
                });
                continue;
            }

            let mut block = Vec::new();
            loop {
                match lines.next() {
                    Some((_, "end")) => break,
                    Some((_, inner)) => block.push(inner),
                    None => {
                        let range = TextRange::at(offset, TextSize::of(keyword));
                        return Err(IndexError::parse(format!("missing 'end' for '{keyword}'"), range));
                    }
                }
            }
            def.entries.push(Entry {
                keyword,
                value: None,
                lines: block,
            });
        }
        Ok(def)
    }

    fn entry(&self, keyword: &str) -> Option<&Entry<'a>> {
        self.entries.iter().find(|e| e.keyword == keyword)
    }

    /// A one-line value, or the first line of a block.
    fn value(&self, keyword: &str) -> Option<&'a str> {
        let entry = self.entry(keyword)?;
        entry.value.or_else(|| entry.lines.first().copied())
    }

    /// First word of every line of a block, e.g. the names under `requires`.
    fn names(&self, keyword: &str) -> Vec<SmolStr> {
        self.entries
            .iter()
            .filter(|e| e.keyword == keyword)
            .flat_map(|e| e.lines.iter())
            .filter_map(|line| line.split_whitespace().next())
            .map(SmolStr::new)
            .collect()
    }

    fn provenance(&self, file: FileId, timestamp: Option<SystemTime>, module: Option<SmolStr>) -> Provenance {
        let doc = self
            .entry("description")
            .map(|e| e.lines.join("\n"))
            .filter(|doc| !doc.is_empty());
        Provenance {
            location: Some(Location::new(file, self.name_range)),
            module,
            timestamp,
            doc: doc.map(Into::into),
        }
    }
}

/// Trimmed non-empty, non-comment lines with the offset of their first character.
fn significant_lines(text: &str) -> impl Iterator<Item = (TextSize, &str)> {
    let mut offset = TextSize::from(0);
    text.split_inclusive('\n')
        .map(move |line| {
            let start = offset;
            offset += TextSize::of(line);
            let indent = TextSize::of(&line[..line.len() - line.trim_start().len()]);
            (start + indent, line.trim())
        })
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "\
# Rope handling
rope_module 2

description
  Ropes and their helpers.
end

version 3 patched
requires
  base
  collections 1
end
hidden
";

    const PRODUCT: &str = "\
tools layered_product
title
  Tools
end
version 1.2.0
requires
  sw_core
end
";

    #[test]
    fn test_read_module_def() {
        let module = read_module_def(FileId::new(0), MODULE, None, Some("tools".into())).unwrap();

        assert_eq!(module.name, "rope_module");
        assert_eq!(module.base_version.as_deref(), Some("2"));
        assert_eq!(module.current_version.as_deref(), Some("3"));
        assert_eq!(module.requires, vec!["base", "collections"]);
        assert_eq!(module.product.as_deref(), Some("tools"));
        assert_eq!(module.provenance.module.as_deref(), Some("rope_module"));
        assert_eq!(module.provenance.doc.as_deref(), Some("Ropes and their helpers."));
        let range = module.provenance.location.unwrap().range;
        assert_eq!(&MODULE[range], "rope_module");
    }

    #[test]
    fn test_read_product_def() {
        let product = read_product_def(FileId::new(0), PRODUCT, None, None).unwrap();

        assert_eq!(product.name, "tools");
        assert_eq!(product.product_type.as_deref(), Some("layered_product"));
        assert_eq!(product.title.as_deref(), Some("Tools"));
        assert_eq!(product.version.as_deref(), Some("1.2.0"));
        assert_eq!(product.requires, vec!["sw_core"]);
    }

    #[test]
    fn test_malformed_def_files() {
        assert!(matches!(
            read_module_def(FileId::new(0), "# nothing\n", None, None),
            Err(IndexError::Parse { .. })
        ));
        let Err(IndexError::Parse { range, .. }) =
            read_module_def(FileId::new(0), "m 1\nrequires\n  base\n", None, None)
        else {
            panic!("expected a parse error");
        };
        assert_eq!(range, TextRange::at(TextSize::from(4), TextSize::from(8)));
    }

    #[test]
    fn test_nesting_sets_parent_product_and_owning_product() {
        let dir = tempfile::tempdir().unwrap();
        let outer = dir.path().join("outer");
        let inner = outer.join("inner");
        let module = inner.join("rope");
        fs::create_dir_all(&module).unwrap();
        fs::write(outer.join(PRODUCT_DEF), "outer_product layered_product\n").unwrap();
        fs::write(inner.join(PRODUCT_DEF), "inner_product customisation_product\n").unwrap();

        let Some(Ok(Definition::Product(product))) =
            read_def_file(FileId::new(0), &inner.join(PRODUCT_DEF), "inner_product\n", None)
        else {
            panic!("expected a product");
        };
        assert_eq!(product.parent.as_deref(), Some("outer_product"));

        let Some(Ok(Definition::Module(read))) =
            read_def_file(FileId::new(1), &module.join(MODULE_DEF), "rope 1\n", None)
        else {
            panic!("expected a module");
        };
        assert_eq!(read.product.as_deref(), Some("inner_product"));
        assert!(read_def_file(FileId::new(2), &module.join("rope.magik"), "", None).is_none());
    }
}
