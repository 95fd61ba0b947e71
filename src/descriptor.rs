//! Type Descriptor Tree.
//!
//! Normalized, language-neutral description of a type's shape. Consumed by
//! the matcher (encode/decode) and the schema generator; produced by whatever
//! implements [`crate::registry::Resolve`].
//!
//! Self-referential records are expressed with [`TypeDescriptor::Ref`], which
//! names another type instead of inlining it. Refs are resolved lazily while
//! walking, so a recursive type never expands eagerly.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    /// `inner ∪ nil`; absent and explicit null are the same thing.
    Optional(Box<TypeDescriptor>),
    /// Ordered variants; the first one that matches wins.
    Union(Vec<TypeDescriptor>),
    Record(RecordDescriptor),
    /// Homogeneous ordered sequence.
    Collection(Box<TypeDescriptor>),
    /// Lazy by-name reference to another (possibly the same) type.
    Ref(TypeRef),
    /// Types the engine refuses to process (pids, opaque handles, functions, untyped tuples).
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Integer,
    NonNegativeInteger,
    Float,
    Boolean,
    /// A single literal symbol, carried as a string on the wire.
    Atom(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    pub name: String,
    /// Declaration order. A field is required unless its descriptor is `Optional`.
    pub fields: IndexMap<String, TypeDescriptor>,
}

/// `(module, type name)` pair, rendered as `Module.name` (e.g. `App.User.t`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    pub module: String,
    pub name: String,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl TypeDescriptor {
    pub fn string() -> Self { Self::Primitive(PrimitiveKind::String) }
    pub fn integer() -> Self { Self::Primitive(PrimitiveKind::Integer) }
    pub fn non_negative_integer() -> Self { Self::Primitive(PrimitiveKind::NonNegativeInteger) }
    pub fn float() -> Self { Self::Primitive(PrimitiveKind::Float) }
    pub fn boolean() -> Self { Self::Primitive(PrimitiveKind::Boolean) }
    pub fn atom(value: impl Into<String>) -> Self { Self::Primitive(PrimitiveKind::Atom(value.into())) }

    pub fn optional(inner: TypeDescriptor) -> Self {
        // Optional(Optional(x)) says nothing Optional(x) doesn't.
        match inner {
            Self::Optional(_) => inner,
            other => Self::Optional(Box::new(other)),
        }
    }

    pub fn union(variants: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self::Union(variants.into_iter().collect())
    }

    pub fn collection(element: TypeDescriptor) -> Self {
        Self::Collection(Box::new(element))
    }

    pub fn reference(type_ref: TypeRef) -> Self {
        Self::Ref(type_ref)
    }

    pub fn record<I, K>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, TypeDescriptor)>,
        K: Into<String>,
    {
        Self::Record(RecordDescriptor {
            name: name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// True for a syntactic `Optional`; refs are not looked through here.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Short human label, used in diagnostics and config errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.to_string(),
            Self::Optional(inner) => format!("{} | nil", inner.describe()),
            Self::Union(variants) => variants
                .iter()
                .map(|v| v.describe())
                .collect::<Vec<_>>()
                .join(" | "),
            Self::Record(record) => format!("%{}{{}}", record.name),
            Self::Collection(element) => format!("[{}]", element.describe()),
            Self::Ref(type_ref) => type_ref.to_string(),
            Self::Unsupported(reason) => format!("unsupported({reason})"),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::NonNegativeInteger => f.write_str("non_neg_integer"),
            Self::Float => f.write_str("float"),
            Self::Boolean => f.write_str("boolean"),
            Self::Atom(value) => write!(f, ":{value}"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPE REFS
// ————————————————————————————————————————————————————————————————————————————

/// `Some.Module.type_name`, optionally with a trailing `()`.
static TYPE_REF_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?P<module>[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\.(?P<name>[a-z_][A-Za-z0-9_]*[?!]?)(?:\(\))?$")
        .ok()
});

impl TypeRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self { module: module.into(), name: name.into() }
    }

    pub fn parse(src: &str) -> Result<Self, ConfigError> {
        let caps = TYPE_REF_PATTERN
            .as_ref()
            .and_then(|pattern| pattern.captures(src.trim()))
            .ok_or_else(|| ConfigError::InvalidTypeRef { input: src.to_string() })?;
        Ok(Self::new(&caps["module"], &caps["name"]))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

impl FromStr for TypeRef {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TypeRef> for String {
    fn from(r: TypeRef) -> Self {
        r.to_string()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_ref_parses_module_and_name() {
        let r = TypeRef::parse("App.Accounts.User.t()").unwrap();
        assert_eq!(r.module, "App.Accounts.User");
        assert_eq!(r.name, "t");
        assert_eq!(r.to_string(), "App.Accounts.User.t");
    }

    #[test]
    fn type_ref_pattern_compiles() {
        assert!(TYPE_REF_PATTERN.is_some());
    }

    #[test]
    fn type_ref_rejects_bare_names() {
        assert!(matches!(
            TypeRef::parse("user"),
            Err(ConfigError::InvalidTypeRef { .. })
        ));
        assert!(TypeRef::parse("App.User.T").is_err());
    }

    #[test]
    fn optional_does_not_nest() {
        let d = TypeDescriptor::optional(TypeDescriptor::optional(TypeDescriptor::string()));
        assert_eq!(d, TypeDescriptor::Optional(Box::new(TypeDescriptor::string())));
    }

    #[test]
    fn descriptors_read_from_tagged_json() {
        let src = json!({
            "record": {
                "name": "App.User",
                "fields": {
                    "name": { "primitive": "string" },
                    "age": { "primitive": "non_negative_integer" },
                    "status": { "union": [
                        { "primitive": { "atom": "active" } },
                        { "primitive": { "atom": "banned" } }
                    ]},
                    "manager": { "optional": { "ref": "App.User.t" } }
                }
            }
        });
        let d: TypeDescriptor = serde_json::from_value(src).unwrap();
        let TypeDescriptor::Record(record) = &d else { panic!("expected record") };
        let keys: Vec<_> = record.fields.keys().cloned().collect();
        assert_eq!(keys, ["name", "age", "status", "manager"]);
        assert_eq!(
            record.fields["manager"],
            TypeDescriptor::optional(TypeDescriptor::Ref(TypeRef::new("App.User", "t")))
        );
        assert_eq!(record.fields["status"].describe(), ":active | :banned");
    }
}
