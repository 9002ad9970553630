//! Unresolved type references.

use std::fmt;

use smol_str::SmolStr;

/// An unresolved, serializable reference to a type.
///
/// Simple and generic references are always package-qualified. Combined
/// references hold their members flattened, sorted and de-duplicated, which
/// keeps `combine` commutative and the serialized form canonical.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeString {
    /// Unknown type. Serialized as `_undefined`, which no identifier can spell.
    Undefined,
    /// The receiver of the method being analysed (`_self` / `_clone`).
    SelfType,
    /// Reference to a parameter's type, `_parameter(name)`.
    Parameter(SmolStr),
    /// `package:name`
    Simple { package: SmolStr, name: SmolStr },
    /// `package:name<arg, ...>`
    Generic {
        package: SmolStr,
        name: SmolStr,
        arguments: Vec<TypeString>,
    },
    /// Either of several types, `a|b`.
    Combined(Vec<TypeString>),
}

pub const UNDEFINED_NAME: &str = "_undefined";
pub const SELF_NAME: &str = "_self";
pub const CLONE_NAME: &str = "_clone";
const PARAMETER_PREFIX: &str = "_parameter(";

const fn sw(name: &str) -> TypeString {
    TypeString::Simple {
        package: SmolStr::new_inline("sw"),
        name: SmolStr::new_inline(name),
    }
}

impl TypeString {
    pub const UNDEFINED: TypeString = TypeString::Undefined;
    pub const SELF: TypeString = TypeString::SelfType;

    pub const SW_UNSET: TypeString = sw("unset");
    pub const SW_FALSE: TypeString = sw("false");
    pub const SW_MAYBE: TypeString = sw("maybe");
    pub const SW_INTEGER: TypeString = sw("integer");
    pub const SW_FLOAT: TypeString = sw("float");
    pub const SW_CHARACTER: TypeString = sw("character");
    pub const SW_CHAR16_VECTOR: TypeString = sw("char16_vector");
    pub const SW_SYMBOL: TypeString = sw("symbol");
    pub const SW_SIMPLE_VECTOR: TypeString = sw("simple_vector");
    pub const SW_PROCEDURE: TypeString = sw("procedure");
    pub const SW_OBJECT: TypeString = sw("object");
    pub const SW_CONDITION: TypeString = sw("condition");
    pub const SW_ENUMERATION_VALUE: TypeString = sw("enumeration_value");
    pub const SW_GLOBAL_VARIABLE: TypeString = sw("global_variable");

    pub fn simple(package: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        TypeString::Simple {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn parameter(name: impl Into<SmolStr>) -> Self {
        TypeString::Parameter(name.into())
    }

    /// Reference for an identifier as written in source: `pkg:name` keeps its
    /// package, a bare `name` is placed in `current_package`.
    pub fn of_identifier(identifier: &str, current_package: &str) -> Self {
        match identifier.split_once(':') {
            Some((package, name)) => TypeString::simple(package, name),
            None => TypeString::simple(current_package, identifier),
        }
    }

    /// Union of two types.
    ///
    /// Identical inputs yield the input, any undefined input yields undefined.
    pub fn combine(a: &TypeString, b: &TypeString) -> TypeString {
        if a == b {
            return a.clone();
        }
        if a.is_undefined() || b.is_undefined() {
            return TypeString::Undefined;
        }

        let mut members: Vec<TypeString> = a.members().chain(b.members()).cloned().collect();
        members.sort();
        members.dedup();
        if members.len() == 1 {
            members.pop().unwrap_or(TypeString::Undefined)
        } else {
            TypeString::Combined(members)
        }
    }

    /// The members of a combined type, or the type itself.
    pub fn members(&self) -> impl Iterator<Item = &TypeString> {
        match self {
            TypeString::Combined(members) => members.iter(),
            other => std::slice::from_ref(other).iter(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, TypeString::Undefined)
    }

    pub fn is_self(&self) -> bool {
        matches!(self, TypeString::SelfType)
    }

    pub fn is_parameter_reference(&self) -> bool {
        matches!(self, TypeString::Parameter(_))
    }

    pub fn is_combined(&self) -> bool {
        matches!(self, TypeString::Combined(_))
    }

    pub fn package(&self) -> Option<&str> {
        match self {
            TypeString::Simple { package, .. } | TypeString::Generic { package, .. } => Some(package),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TypeString::Simple { name, .. } | TypeString::Generic { name, .. } => Some(name),
            TypeString::Parameter(name) => Some(name),
            _ => None,
        }
    }

    /// The type without generic arguments.
    pub fn without_generics(&self) -> TypeString {
        match self {
            TypeString::Generic { package, name, .. } => TypeString::simple(package.clone(), name.clone()),
            other => other.clone(),
        }
    }

    pub fn generic_arguments(&self) -> &[TypeString] {
        match self {
            TypeString::Generic { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Replace every occurrence of `from` by `to`, recombining unions.
    pub fn substitute_type(&self, from: &TypeString, to: &TypeString) -> TypeString {
        if self == from {
            return to.clone();
        }
        match self {
            TypeString::Combined(members) => members
                .iter()
                .map(|m| m.substitute_type(from, to))
                .reduce(|acc, m| TypeString::combine(&acc, &m))
                .unwrap_or(TypeString::Undefined),
            TypeString::Generic {
                package,
                name,
                arguments,
            } => TypeString::Generic {
                package: package.clone(),
                name: name.clone(),
                arguments: arguments.iter().map(|a| a.substitute_type(from, to)).collect(),
            },
            other => other.clone(),
        }
    }

    /// Parse a type expression such as `sw:rope<integer>|_undefined`.
    ///
    /// Unqualified names are placed in `current_package`. Empty input is undefined.
    pub fn parse(text: &str, current_package: &str) -> TypeString {
        let text = text.trim();
        let alternatives = split_top_level(text, '|');
        if alternatives.len() > 1 {
            return alternatives
                .iter()
                .map(|alt| TypeString::parse(alt, current_package))
                .reduce(|acc, t| TypeString::combine(&acc, &t))
                .unwrap_or(TypeString::Undefined);
        }

        match text {
            "" | UNDEFINED_NAME => TypeString::Undefined,
            SELF_NAME | CLONE_NAME => TypeString::SelfType,
            _ => {
                if let Some(inner) = text
                    .strip_prefix(PARAMETER_PREFIX)
                    .and_then(|rest| rest.strip_suffix(')'))
                {
                    return TypeString::parameter(inner.trim());
                }
                match text.split_once('<') {
                    Some((base, rest)) if rest.ends_with('>') => {
                        let inner = &rest[..rest.len() - 1];
                        let base = TypeString::of_identifier(base.trim(), current_package);
                        let arguments = split_top_level(inner, ',')
                            .iter()
                            .map(|arg| TypeString::parse(arg, current_package))
                            .collect();
                        match base {
                            TypeString::Simple { package, name } => TypeString::Generic {
                                package,
                                name,
                                arguments,
                            },
                            other => other,
                        }
                    }
                    _ => TypeString::of_identifier(text, current_package),
                }
            }
        }
    }

    /// Canonical serialized form.
    pub fn full_string(&self) -> String {
        self.to_string()
    }
}

/// Split on `separator` outside of `<...>` and `(...)`.
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

impl fmt::Display for TypeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeString::Undefined => f.write_str(UNDEFINED_NAME),
            TypeString::SelfType => f.write_str(SELF_NAME),
            TypeString::Parameter(name) => write!(f, "{PARAMETER_PREFIX}{name})"),
            TypeString::Simple { package, name } => write!(f, "{package}:{name}"),
            TypeString::Generic {
                package,
                name,
                arguments,
            } => {
                write!(f, "{package}:{name}<")?;
                for (idx, argument) in arguments.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(">")
            }
            TypeString::Combined(members) => {
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for TypeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeString({self})")
    }
}

#[cfg(feature = "persist")]
impl serde::Serialize for TypeString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full_string())
    }
}

#[cfg(feature = "persist")]
impl<'de> serde::Deserialize<'de> for TypeString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        // Serialized references are always qualified, so the package is never used.
        Ok(TypeString::parse(&text, "sw"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_identical_returns_input() {
        let a = TypeString::SW_INTEGER;
        assert_eq!(TypeString::combine(&a, &a), a);
    }

    #[test]
    fn test_combine_with_undefined_is_undefined() {
        assert_eq!(
            TypeString::combine(&TypeString::SW_INTEGER, &TypeString::UNDEFINED),
            TypeString::UNDEFINED
        );
        assert_eq!(
            TypeString::combine(&TypeString::UNDEFINED, &TypeString::SW_FLOAT),
            TypeString::UNDEFINED
        );
    }

    #[test]
    fn test_combine_is_commutative_and_flat() {
        let a = TypeString::SW_INTEGER;
        let b = TypeString::SW_FLOAT;
        let c = TypeString::SW_SYMBOL;

        let ab = TypeString::combine(&a, &b);
        assert_eq!(ab, TypeString::combine(&b, &a));
        assert!(ab.is_combined());

        let abc = TypeString::combine(&ab, &c);
        let cba = TypeString::combine(&c, &TypeString::combine(&b, &a));
        assert_eq!(abc, cba);
        assert_eq!(abc.members().count(), 3);
        assert_eq!(TypeString::combine(&abc, &a), abc);
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(TypeString::UNDEFINED.to_string(), "_undefined");
        assert_eq!(TypeString::SELF.to_string(), "_self");
        assert_eq!(TypeString::parameter("p").to_string(), "_parameter(p)");
        assert_eq!(TypeString::SW_INTEGER.to_string(), "sw:integer");
        assert_eq!(
            TypeString::combine(&TypeString::SW_INTEGER, &TypeString::SW_FLOAT).to_string(),
            "sw:float|sw:integer"
        );
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(TypeString::parse("integer", "sw"), TypeString::SW_INTEGER);
        assert_eq!(TypeString::parse("user:thing", "sw"), TypeString::simple("user", "thing"));
        assert_eq!(TypeString::parse("_self", "user"), TypeString::SELF);
        assert_eq!(TypeString::parse("", "user"), TypeString::UNDEFINED);
        assert_eq!(TypeString::parse("_parameter(x)", "user"), TypeString::parameter("x"));

        let generic = TypeString::parse("sw:rope<integer, sw:float|symbol>", "sw");
        assert_eq!(generic.generic_arguments().len(), 2);
        assert_eq!(generic.to_string(), "sw:rope<sw:integer,sw:float|sw:symbol>");

        let combined = TypeString::parse("sw:integer | sw:unset", "user");
        assert_eq!(combined, TypeString::combine(&TypeString::SW_UNSET, &TypeString::SW_INTEGER));
    }

    #[test]
    fn test_parse_display_roundtrip() {
        for text in ["sw:integer", "_undefined", "_self", "sw:a|user:b", "sw:rope<sw:integer>"] {
            assert_eq!(TypeString::parse(text, "user").to_string(), text);
        }
    }

    #[test]
    fn test_substitute_self() {
        let t = TypeString::combine(&TypeString::SELF, &TypeString::SW_UNSET);
        let substituted = t.substitute_type(&TypeString::SELF, &TypeString::SW_INTEGER);

        assert_eq!(
            substituted,
            TypeString::combine(&TypeString::SW_INTEGER, &TypeString::SW_UNSET)
        );
    }
}
