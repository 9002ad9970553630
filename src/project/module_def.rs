//! Module membership from `module.def` files.
//!
//! A Magik file belongs to the module whose `module.def` sits in the
//! nearest enclosing directory. The first significant line of that file is
//! `<module_name> [version]`.

use std::fs;
use std::path::{Path, PathBuf};

use smol_str::SmolStr;
use tracing::warn;

/// File name of a module definition.
pub const MODULE_DEF: &str = "module.def";

/// The `module.def` governing `path`, searching upward from its directory.
pub fn find_module_def(path: &Path) -> Option<PathBuf> {
    path.parent()?
        .ancestors()
        .map(|dir| dir.join(MODULE_DEF))
        .find(|candidate| candidate.is_file())
}

/// Name of the module `path` belongs to, if any.
pub fn module_name_for(path: &Path) -> Option<SmolStr> {
    let module_def = find_module_def(path)?;
    match fs::read_to_string(&module_def) {
        Ok(text) => parse_module_name(&text),
        Err(error) => {
            warn!(path = %module_def.display(), %error, "failed to read module.def");
            None
        }
    }
}

/// Module name declared by the contents of a `module.def`.
pub fn parse_module_name(text: &str) -> Option<SmolStr> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .and_then(|line| line.split_whitespace().next())
        .map(SmolStr::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_name() {
        assert_eq!(parse_module_name("# comment\n\nmy_module 2\ndescription\n").as_deref(), Some("my_module"));
        assert_eq!(parse_module_name("# only comments\n"), None);
    }

    #[test]
    fn test_nearest_module_def_wins() {
        let dir = tempfile::tempdir().unwrap();
        let outer = dir.path().join("outer");
        let inner = outer.join("inner").join("source");
        fs::create_dir_all(&inner).unwrap();
        fs::write(outer.join(MODULE_DEF), "outer_module\n").unwrap();
        fs::write(outer.join("inner").join(MODULE_DEF), "inner_module 1\n").unwrap();

        assert_eq!(module_name_for(&inner.join("a.magik")).as_deref(), Some("inner_module"));
        assert_eq!(module_name_for(&outer.join("b.magik")).as_deref(), Some("outer_module"));
    }
}
