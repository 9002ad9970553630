//! Type annotations in doc comments.
//!
//! ```text
//! ## @param {sw:integer} count  Number of items.
//! ## @return {sw:rope}
//! ## @loop {sw:integer}
//! ## @slot {sw:symbol} name
//! ## @type {sw:char16_vector}
//! ```

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::{ExpressionResultString, TypeString};
use crate::syntax::SyntaxNode;
use crate::syntax::doc::doc_lines;

/// Type annotations of one documented construct.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeDoc {
    pub parameters: IndexMap<SmolStr, TypeString>,
    pub returns: Vec<TypeString>,
    pub loops: Vec<TypeString>,
    pub slots: IndexMap<SmolStr, TypeString>,
    pub type_string: Option<TypeString>,
}

impl TypeDoc {
    /// Annotations from the doc comments of `node`.
    pub fn of_node(node: &SyntaxNode, current_package: &str) -> Self {
        Self::parse_lines(doc_lines(node).iter().map(String::as_str), current_package)
    }

    pub fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>, current_package: &str) -> Self {
        let mut doc = TypeDoc::default();
        for line in lines {
            let line = line.trim();
            let Some((tag, rest)) = line.strip_prefix('@').and_then(|l| l.split_once(char::is_whitespace)) else {
                continue;
            };
            let Some((type_text, rest)) = braced(rest.trim_start()) else {
                continue;
            };
            let type_string = TypeString::parse(type_text, current_package);
            let name = rest.split_whitespace().next().map(SmolStr::new);

            match (tag, name) {
                ("param", Some(name)) => {
                    doc.parameters.insert(name, type_string);
                }
                ("slot", Some(name)) => {
                    doc.slots.insert(name, type_string);
                }
                ("return", _) => doc.returns.push(type_string),
                ("loop", _) => doc.loops.push(type_string),
                ("type", _) => doc.type_string = Some(type_string),
                _ => {}
            }
        }
        doc
    }

    /// Declared return types, `None` when no `@return` was given.
    pub fn return_result(&self) -> Option<ExpressionResultString> {
        (!self.returns.is_empty()).then(|| ExpressionResultString::new(self.returns.iter().cloned()))
    }

    pub fn loop_result(&self) -> Option<ExpressionResultString> {
        (!self.loops.is_empty()).then(|| ExpressionResultString::new(self.loops.iter().cloned()))
    }

    pub fn parameter_type(&self, name: &str) -> TypeString {
        self.parameters.get(name).cloned().unwrap_or(TypeString::Undefined)
    }

    pub fn slot_type(&self, name: &str) -> TypeString {
        self.slots.get(name).cloned().unwrap_or(TypeString::Undefined)
    }
}

/// Split `{inner} rest` into `(inner, rest)`, honouring nested braces.
fn braced(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('{')?;
    let mut depth = 1;
    for (idx, c) in rest.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&rest[..idx], &rest[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotations() {
        let doc = TypeDoc::parse_lines(
            [
                "Does things.",
                "@param {integer} count The count.",
                "@param {sw:symbol|_undefined} name",
                "@return {_self}",
                "@return {sw:float}",
                "@loop {sw:integer}",
                "@slot {sw:rope} items",
                "@type {char16_vector}",
            ],
            "sw",
        );

        assert_eq!(doc.parameter_type("count"), TypeString::SW_INTEGER);
        assert!(doc.parameter_type("name").is_undefined());
        assert_eq!(doc.parameter_type("missing"), TypeString::UNDEFINED);
        assert_eq!(
            doc.return_result(),
            Some(ExpressionResultString::new([TypeString::SELF, TypeString::SW_FLOAT]))
        );
        assert_eq!(doc.loop_result(), Some(ExpressionResultString::single(TypeString::SW_INTEGER)));
        assert_eq!(doc.slot_type("items"), TypeString::simple("sw", "rope"));
        assert_eq!(doc.type_string, Some(TypeString::SW_CHAR16_VECTOR));
    }

    #[test]
    fn test_unqualified_types_use_current_package() {
        let doc = TypeDoc::parse_lines(["@return {thing}"], "user");
        assert_eq!(doc.returns, vec![TypeString::simple("user", "thing")]);
    }

    #[test]
    fn test_malformed_lines_are_ignored() {
        let doc = TypeDoc::parse_lines(["@param integer count", "@return", "@param {sw:integer}"], "sw");
        assert_eq!(doc, TypeDoc::default());
    }
}
