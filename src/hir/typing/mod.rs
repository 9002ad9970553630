//! Type references and multi-value results.
//!
//! Both are pure values: [`TypeString`] names a type without resolving it,
//! [`ExpressionResultString`] is the ordered list of types an expression
//! yields. Unknown types are data (`_undefined`), never errors.

mod expression_result;
mod type_doc;
mod type_string;

pub use expression_result::{ExpressionResultString, MAX_ITEMS, UNDEFINED_SERIALIZED_NAME};
pub use type_doc::TypeDoc;
pub use type_string::{TypeString, UNDEFINED_NAME};
