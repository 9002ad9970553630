//! `def_package(:name [, :uses, {:pkg ...}])`

use smol_str::SmolStr;

use super::{ParseContext, accepted, statement_of};
use crate::hir::definitions::{Definition, PackageDefinition};
use crate::hir::error::MalformedConstruct;
use crate::syntax::SyntaxNode;
use crate::syntax::ast::{self, AstNode, ProcedureInvocation};

pub(super) const DEF_PACKAGE: &str = "def_package";

struct Shape {
    name: String,
    uses: Vec<String>,
}

fn shape(node: &SyntaxNode) -> Option<Shape> {
    let invocation = ProcedureInvocation::cast(node.clone())?;
    if !invocation.is_invocation_of(DEF_PACKAGE) {
        return None;
    }
    let arguments = invocation.arguments()?;
    let name = arguments.symbol(0)?;

    // Keyword arguments follow the name in `:keyword, value` pairs.
    let mut uses = None;
    let mut index = 1;
    while index < arguments.len() {
        let keyword = arguments.symbol(index)?;
        if keyword == "uses" {
            let vector = arguments.simple_vector(index + 1)?;
            let names: Option<Vec<_>> = vector.items().iter().map(ast::as_symbol).collect();
            uses = Some(names?);
        }
        index += 2;
    }

    Some(Shape {
        name,
        uses: uses.unwrap_or_else(|| vec!["sw".to_string()]),
    })
}

pub(super) fn matches(node: &SyntaxNode) -> bool {
    shape(node).is_some()
}

pub(super) fn parse(node: &SyntaxNode, cx: &ParseContext) -> Result<Vec<Definition>, MalformedConstruct> {
    let Some(shape) = accepted(shape(node), DEF_PACKAGE) else {
        return Ok(Vec::new());
    };
    let statement = statement_of(node);
    let definition = PackageDefinition {
        provenance: cx.provenance(&statement, &statement),
        name: shape.name.into(),
        uses: shape.uses.into_iter().map(SmolStr::from).collect(),
    };
    Ok(vec![definition.into()])
}

#[cfg(test)]
mod tests {
    use crate::hir::parsers::test_support::read;

    #[test]
    fn test_package_with_uses() {
        let result = read("def_package(:app, :uses, {:sw, :base})");
        let package = result.definitions[0].as_package().unwrap();

        assert_eq!(package.name, "app");
        assert_eq!(package.uses, vec!["sw", "base"]);
    }

    #[test]
    fn test_package_defaults_to_using_sw() {
        let result = read("sw:def_package(:app)");
        let package = result.definitions[0].as_package().unwrap();

        assert_eq!(package.uses, vec!["sw"]);
    }

    #[test]
    fn test_non_symbol_uses_is_not_a_package() {
        let result = read("def_package(:app, :uses, {\"sw\"})");
        assert!(result.definitions.is_empty());
    }
}
