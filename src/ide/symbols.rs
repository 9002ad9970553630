//! Workspace symbols — name search over indexed definitions.

use smol_str::SmolStr;

use crate::hir::definitions::Location;
use crate::hir::{Definition, DefinitionKeeper, DefinitionKind};

/// A definition matching a symbol query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// `package:name`, or `package:exemplar.method` for methods
    pub name: SmolStr,
    pub kind: DefinitionKind,
    /// Source location, absent for built-in definitions
    pub location: Option<Location>,
    /// Owning exemplar of a method
    pub container: Option<SmolStr>,
}

impl SymbolInfo {
    fn of(definition: &Definition) -> Self {
        let container = definition.as_method().map(|m| SmolStr::new(m.exemplar.to_string()));
        Self {
            name: definition.qualified_name(),
            kind: definition.kind(),
            location: definition.location(),
            container,
        }
    }
}

/// Exemplars, methods, globals, procedures, products and modules whose
/// qualified name contains `query`, ignoring case. An empty query matches
/// everything.
///
/// Results are sorted by name, then kind.
pub fn workspace_symbols(keeper: &DefinitionKeeper, query: &str) -> Vec<SymbolInfo> {
    let query = query.to_lowercase();
    let mut symbols: Vec<SymbolInfo> = keeper
        .all_definitions()
        .iter()
        .filter(|d| {
            matches!(
                d.kind(),
                DefinitionKind::Exemplar
                    | DefinitionKind::Method
                    | DefinitionKind::Global
                    | DefinitionKind::Procedure
                    | DefinitionKind::Product
                    | DefinitionKind::Module
            )
        })
        .filter(|d| d.qualified_name().to_lowercase().contains(&query))
        .map(SymbolInfo::of)
        .collect();

    symbols.sort_by(|a, b| a.name.cmp(&b.name).then(a.kind.cmp(&b.kind)));
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ide::AnalysisHost;

    fn host() -> AnalysisHost {
        let host = AnalysisHost::new();
        host.set_file_content(
            "/ws/rope.magik",
            "def_slotted_exemplar(:rope, {})\n\
             _method rope.add(item)\n_endmethod\n\
             _global rope_count << 0\n",
        );
        host
    }

    #[test]
    fn test_workspace_symbols_case_insensitive() {
        let host = host();

        let symbols = host.analysis().workspace_symbols("ROPE");
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["user:rope", "user:rope.add()", "user:rope_count"]);
    }

    #[test]
    fn test_workspace_symbols_method_container_and_location() {
        let host = host();

        let symbols = host.analysis().workspace_symbols("add");

        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].kind, DefinitionKind::Method);
        assert_eq!(symbols[0].container.as_deref(), Some("user:rope"));
        assert!(symbols[0].location.is_some());
    }

    #[test]
    fn test_workspace_symbols_skip_unmatched() {
        let host = host();

        assert!(host.analysis().workspace_symbols("no_such_thing").is_empty());
    }
}
