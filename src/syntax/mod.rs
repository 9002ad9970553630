//! Magik syntax: lexer, lossless CST and typed wrappers.
//!
//! ```text
//! text → lexer (logos) → parser (rowan GreenNode) → ast wrappers / doc
//! ```

pub mod ast;
pub mod doc;
pub mod lexer;
pub mod parser;
mod syntax_kind;

pub use ast::AstNode;
pub use parser::{Parse, SyntaxError, parse};
pub use syntax_kind::{MagikLanguage, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken};
