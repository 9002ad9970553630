//! Reference resolution for the identifier under the cursor.
//!
//! Locals resolve through the file's scope tree; everything else is a global
//! resolved through the package search order.

use smol_str::SmolStr;

use super::analysis::FileAnalysis;
use crate::base::{LineCol, TextRange};
use crate::hir::scope::DeclarationKind;
use crate::hir::{DefinitionKeeper, GlobalResolver, Reference, ResolveResult};

/// What an identifier refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local {
        name: SmolStr,
        kind: DeclarationKind,
        declaration: TextRange,
        usages: Vec<TextRange>,
    },
    Global {
        name: SmolStr,
        package: SmolStr,
        result: ResolveResult,
    },
}

pub(crate) fn resolve(analysis: &FileAnalysis, keeper: &DefinitionKeeper, position: LineCol) -> Option<Resolution> {
    let offset = analysis.offset(position)?;
    match analysis.scopes.resolve(offset)? {
        Reference::Local { declaration, .. } => Some(Resolution::Local {
            name: declaration.name.clone(),
            kind: declaration.kind,
            declaration: declaration.range,
            usages: declaration.usages.iter().map(|u| u.range).collect(),
        }),
        Reference::Global(global) => {
            let result = GlobalResolver::new(keeper)
                .with_package(global.package.clone())
                .resolve(&global.name);
            Some(Resolution::Global {
                name: global.name.clone(),
                package: global.package.clone(),
                result,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::DefinitionKind;
    use crate::ide::AnalysisHost;

    #[test]
    fn test_resolve_local_lists_usages() {
        let host = AnalysisHost::new();
        let source = "_block\n  _local a << 1\n  a + a\n_endblock";
        let outcome = host.set_file_content("/ws/r.magik", source);

        let resolution = host.analysis().resolve(outcome.file, LineCol::new(2, 2)).unwrap();

        match resolution {
            Resolution::Local { name, kind, usages, .. } => {
                assert_eq!(name, "a");
                assert_eq!(kind, DeclarationKind::Local);
                assert_eq!(usages.len(), 2);
            }
            other => panic!("expected local, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_global_exemplar() {
        let host = AnalysisHost::new();
        host.set_file_content("/ws/def.magik", "def_slotted_exemplar(:rope, {})\n");
        let outcome = host.set_file_content("/ws/use.magik", "_block\n  rope.new()\n_endblock");

        let resolution = host.analysis().resolve(outcome.file, LineCol::new(1, 3)).unwrap();

        match resolution {
            Resolution::Global { name, package, result } => {
                assert_eq!(name, "rope");
                assert_eq!(package, "user");
                let definition = result.definition().expect("found");
                assert_eq!(definition.kind(), DefinitionKind::Exemplar);
            }
            other => panic!("expected global, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_unknown_global() {
        let host = AnalysisHost::new();
        let outcome = host.set_file_content("/ws/use.magik", "_block\n  nothing_here\n_endblock");

        let resolution = host.analysis().resolve(outcome.file, LineCol::new(1, 4)).unwrap();

        assert!(matches!(
            resolution,
            Resolution::Global {
                result: ResolveResult::NotFound,
                ..
            }
        ));
    }
}
