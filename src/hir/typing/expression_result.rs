//! Multi-value expression results.

use std::fmt;
use std::sync::{Arc, LazyLock};

use super::type_string::{TypeString, split_top_level};

/// Maximum number of values an expression can yield (the `_scatter` limit).
pub const MAX_ITEMS: usize = 1024;

/// Serialized form of [`ExpressionResultString::undefined`].
pub const UNDEFINED_SERIALIZED_NAME: &str = "__UNDEFINED_RESULT__";

static UNDEFINED: LazyLock<ExpressionResultString> = LazyLock::new(|| ExpressionResultString {
    types: vec![TypeString::Undefined; MAX_ITEMS].into(),
});

/// The ordered types of the value(s) an expression yields.
///
/// Equality and hashing are structural over the sequence. The sequence is
/// shared, so clones are cheap.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ExpressionResultString {
    types: Arc<[TypeString]>,
}

impl ExpressionResultString {
    /// A result from `types`, truncated to [`MAX_ITEMS`].
    pub fn new(types: impl IntoIterator<Item = TypeString>) -> Self {
        Self {
            types: types.into_iter().take(MAX_ITEMS).collect(),
        }
    }

    pub fn single(type_string: TypeString) -> Self {
        Self::new([type_string])
    }

    /// Zero values.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Unknown arity and unknown types: [`MAX_ITEMS`] undefined types.
    pub fn undefined() -> Self {
        UNDEFINED.clone()
    }

    pub fn is_undefined(&self) -> bool {
        Arc::ptr_eq(&self.types, &UNDEFINED.types)
            || (self.types.len() == MAX_ITEMS && self.types.iter().all(TypeString::is_undefined))
    }

    /// Merge two alternative outcomes position by position.
    ///
    /// The shorter result is padded with `sw:unset`. Without a second result
    /// the first is returned unchanged.
    pub fn combine(first: &Self, second: Option<&Self>) -> Self {
        let Some(second) = second else {
            return first.clone();
        };
        if first == second {
            return first.clone();
        }

        let size = first.len().max(second.len());
        Self::new((0..size).map(|idx| {
            TypeString::combine(
                &first.get(idx, &TypeString::SW_UNSET),
                &second.get(idx, &TypeString::SW_UNSET),
            )
        }))
    }

    /// Type at `index`, or `unset_type` past the end of the result.
    pub fn get(&self, index: usize, unset_type: &TypeString) -> TypeString {
        self.types.get(index).cloned().unwrap_or_else(|| unset_type.clone())
    }

    pub fn types(&self) -> &[TypeString] {
        &self.types
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeString> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn substitute_type(&self, from: &TypeString, to: &TypeString) -> Self {
        if self.is_undefined() {
            return self.clone();
        }
        Self::new(self.types.iter().map(|t| t.substitute_type(from, to)))
    }

    /// Display form. A trailing run of identical types in a full-length
    /// result collapses to `type...`.
    pub fn type_names(&self, separator: &str) -> String {
        if self.is_undefined() {
            return "UNDEFINED...".to_string();
        }

        let mut first_repeating = self.types.len();
        let mut repeated = None;
        if self.types.len() == MAX_ITEMS {
            let last = &self.types[MAX_ITEMS - 1];
            first_repeating = self
                .types
                .iter()
                .rposition(|t| t != last)
                .map_or(0, |idx| idx + 1);
            repeated = Some(last);
        }

        let mut names: Vec<String> = self.types[..first_repeating]
            .iter()
            .map(TypeString::to_string)
            .collect();
        if let Some(last) = repeated {
            names.push(format!("{last}..."));
        }
        names.join(separator)
    }

    /// Serialized form, `__UNDEFINED_RESULT__` for the undefined result.
    pub fn full_string(&self) -> String {
        if self.is_undefined() {
            return UNDEFINED_SERIALIZED_NAME.to_string();
        }
        self.types
            .iter()
            .map(TypeString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Inverse of [`full_string`](Self::full_string).
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            UNDEFINED_SERIALIZED_NAME => Self::undefined(),
            "" => Self::empty(),
            text => Self::new(
                split_top_level(text, ',')
                    .into_iter()
                    .map(|part| TypeString::parse(part, "sw")),
            ),
        }
    }
}

impl FromIterator<TypeString> for ExpressionResultString {
    fn from_iter<I: IntoIterator<Item = TypeString>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for ExpressionResultString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_names(","))
    }
}

impl fmt::Debug for ExpressionResultString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpressionResultString({})", self.type_names(","))
    }
}

#[cfg(feature = "persist")]
impl serde::Serialize for ExpressionResultString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full_string())
    }
}

#[cfg(feature = "persist")]
impl<'de> serde::Deserialize<'de> for ExpressionResultString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(types: &[TypeString]) -> ExpressionResultString {
        ExpressionResultString::new(types.iter().cloned())
    }

    #[test]
    fn test_undefined_get() {
        let undefined = ExpressionResultString::undefined();

        assert_eq!(undefined.len(), MAX_ITEMS);
        assert!(undefined.get(0, &TypeString::SW_UNSET).is_undefined());
        assert!(undefined.get(MAX_ITEMS - 1, &TypeString::SW_UNSET).is_undefined());
        assert_eq!(undefined.get(MAX_ITEMS, &TypeString::SW_UNSET), TypeString::SW_UNSET);
    }

    #[test]
    fn test_get_past_end_returns_default() {
        let r = result(&[TypeString::SW_INTEGER]);

        assert_eq!(r.get(0, &TypeString::SW_UNSET), TypeString::SW_INTEGER);
        assert_eq!(r.get(1, &TypeString::SW_UNSET), TypeString::SW_UNSET);
        assert_eq!(
            ExpressionResultString::empty().get(0, &TypeString::SW_FALSE),
            TypeString::SW_FALSE
        );
    }

    #[test]
    fn test_combine_without_second_is_identity() {
        let r = result(&[TypeString::SW_INTEGER, TypeString::SW_SYMBOL]);
        assert_eq!(ExpressionResultString::combine(&r, None), r);
    }

    #[test]
    fn test_combine_pads_shorter_with_unset() {
        let r1 = result(&[TypeString::SW_INTEGER, TypeString::SW_SYMBOL]);
        let r2 = result(&[TypeString::SW_INTEGER]);

        let combined = ExpressionResultString::combine(&r1, Some(&r2));

        assert_eq!(combined.len(), 2);
        assert_eq!(combined.get(0, &TypeString::UNDEFINED), TypeString::SW_INTEGER);
        assert_eq!(
            combined.get(1, &TypeString::UNDEFINED),
            TypeString::combine(&TypeString::SW_SYMBOL, &TypeString::SW_UNSET)
        );
    }

    #[test]
    fn test_capacity_is_capped() {
        let r = ExpressionResultString::new(vec![TypeString::SW_INTEGER; MAX_ITEMS + 10]);
        assert_eq!(r.len(), MAX_ITEMS);
    }

    #[test]
    fn test_type_names_collapse_trailing_run() {
        let mut types = vec![TypeString::SW_SYMBOL];
        types.extend(std::iter::repeat_n(TypeString::SW_INTEGER, MAX_ITEMS - 1));
        let r = ExpressionResultString::new(types);

        assert_eq!(r.type_names(","), "sw:symbol,sw:integer...");
        assert_eq!(r.len(), MAX_ITEMS);
        assert_eq!(ExpressionResultString::undefined().to_string(), "UNDEFINED...");
    }

    #[test]
    fn test_serialized_forms() {
        assert_eq!(ExpressionResultString::undefined().full_string(), "__UNDEFINED_RESULT__");
        assert!(ExpressionResultString::parse("__UNDEFINED_RESULT__").is_undefined());

        let r = result(&[TypeString::SW_INTEGER, TypeString::parse("sw:rope<sw:integer,sw:float>", "sw")]);
        assert_eq!(ExpressionResultString::parse(&r.full_string()), r);
        assert_eq!(ExpressionResultString::parse(""), ExpressionResultString::empty());
    }

    #[test]
    fn test_equality_is_structural() {
        let a = result(&[TypeString::SW_INTEGER]);
        let b = ExpressionResultString::single(TypeString::SW_INTEGER);
        assert_eq!(a, b);

        let mut set = rustc_hash::FxHashSet::default();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
