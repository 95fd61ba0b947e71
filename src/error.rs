//! Error taxonomy.
//!
//! Two disjoint families:
//!
//! - [`ValidationError`]: the data does not conform to an otherwise valid
//!   type. Returned as a value from the non-raising API.
//! - [`ConfigError`]: the type itself cannot be resolved or uses a shape the
//!   engine refuses. Always surfaced on the outer `Err`, from every API.
//!
//! [`Error`] only exists for the raising variants, which fold both into one
//! type.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::descriptor::TypeRef;
use crate::term::Term;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// LOCATION PATH
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// Where inside a nested structure a match was attempted. Root is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Location(Vec<Segment>);

impl Location {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Segment>> for Location {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Field(s.to_string())
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Index(i)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Dotted form, `root` for the empty path.
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Build a [`Location`] from mixed field names and indexes: `location!["address", 0]`.
#[macro_export]
macro_rules! location {
    () => { $crate::error::Location::root() };
    ($($seg:expr),+ $(,)?) => {
        $crate::error::Location::from(vec![$($crate::error::Segment::from($seg)),+])
    };
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION ERRORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Source text is not well-formed, or nesting exceeded the depth guard.
    DecodeError,
    /// Wrong shape altogether (string where an integer belongs).
    TypeMismatch,
    /// Right shape, failed a refinement; also whole-union and record-container failures.
    NoMatch,
    /// Required field absent.
    MissingData,
    /// Unknown keys present while unknown keys are rejected.
    NotMatchedFields,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecodeError => "decode_error",
            Self::TypeMismatch => "type_mismatch",
            Self::NoMatch => "no_match",
            Self::MissingData => "missing_data",
            Self::NotMatchedFields => "not_matched_fields",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value a failed match was looking at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Offending {
    /// External data (decode direction).
    Data(Value),
    /// Native value (encode direction).
    Native(Term),
}

/// Kind-specific diagnostic payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorContext {
    Parse { reason: String, line: usize, column: usize },
    Value { value: Offending },
    Struct { value: Offending, expected_struct: String },
    /// `missing_data`: nothing was there to look at.
    Undefined,
    Fields { fields: Vec<String> },
    DepthLimit { depth_limit: usize },
}

impl Serialize for ErrorContext {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = match self {
            Self::Undefined => return s.serialize_str("undefined"),
            Self::Parse { .. } => s.serialize_map(Some(3))?,
            Self::Struct { .. } => s.serialize_map(Some(2))?,
            _ => s.serialize_map(Some(1))?,
        };
        match self {
            Self::Parse { reason, line, column } => {
                map.serialize_entry("reason", reason)?;
                map.serialize_entry("line", line)?;
                map.serialize_entry("column", column)?;
            }
            Self::Value { value } => map.serialize_entry("value", value)?,
            Self::Struct { value, expected_struct } => {
                map.serialize_entry("value", value)?;
                map.serialize_entry("expected_struct", expected_struct)?;
            }
            Self::Fields { fields } => map.serialize_entry("fields", fields)?,
            Self::DepthLimit { depth_limit } => map.serialize_entry("depth_limit", depth_limit)?,
            Self::Undefined => {}
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {location}")]
pub struct ValidationError {
    pub location: Location,
    pub kind: ErrorKind,
    pub context: ErrorContext,
}

impl ValidationError {
    pub fn new(location: Location, kind: ErrorKind, context: ErrorContext) -> Self {
        Self { location, kind, context }
    }

    /// `"<kind> at <dotted.path>"`.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Wire shape of the error surface: `{location, type, context, message}`.
impl Serialize for ValidationError {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut st = s.serialize_struct("ValidationError", 4)?;
        st.serialize_field("location", &self.location)?;
        st.serialize_field("type", &self.kind)?;
        st.serialize_field("context", &self.context)?;
        st.serialize_field("message", &self.message())?;
        st.end()
    }
}

/// Result of a data-bearing operation: a value, or the located reasons it failed.
pub type Checked<T> = Result<T, Vec<ValidationError>>;

// ————————————————————————————————————————————————————————————————————————————
// CONFIGURATION ERRORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("module not found or carries no type metadata: {module}")]
    ModuleNotFound { module: String },

    #[error("type {name} not found in module {module}")]
    TypeNotFound { module: String, name: String },

    #[error("type {type_ref} uses an unsupported type: {description}")]
    UnsupportedType { type_ref: TypeRef, description: String },

    #[error("type declaration uses an unsupported type: {description}")]
    UnsupportedShape { description: String },

    #[error("not a type reference (expected `Module.type`): {input:?}")]
    InvalidTypeRef { input: String },

    #[error("failed to load type registry: {reason}")]
    Load { reason: String },
}

// ————————————————————————————————————————————————————————————————————————————
// RAISING SURFACE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(ValidationError),
}

impl Error {
    /// Keep the first error of a non-empty list, as the raising variants promise.
    pub(crate) fn first(errors: Vec<ValidationError>) -> Self {
        match errors.into_iter().next() {
            Some(e) => Self::Validation(e),
            None => Self::Validation(ValidationError::new(
                Location::root(),
                ErrorKind::NoMatch,
                ErrorContext::Undefined,
            )),
        }
    }
}

pub(crate) fn raise<T>(outcome: Result<Checked<T>, ConfigError>) -> Result<T, Error> {
    outcome?.map_err(Error::first)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_renders_as_root() {
        let e = ValidationError::new(Location::root(), ErrorKind::DecodeError, ErrorContext::Undefined);
        assert_eq!(e.message(), "decode_error at root");
    }

    #[test]
    fn nested_location_is_dotted() {
        let e = ValidationError::new(
            location!["address", "street"],
            ErrorKind::TypeMismatch,
            ErrorContext::Value { value: Offending::Data(Value::from(123i64)) },
        );
        assert_eq!(e.to_string(), "type_mismatch at address.street");

        let e = ValidationError::new(location!["tags", 2usize], ErrorKind::TypeMismatch, ErrorContext::Undefined);
        assert_eq!(e.message(), "type_mismatch at tags.2");
    }

    #[test]
    fn serializes_to_error_surface() {
        let e = ValidationError::new(location!["name"], ErrorKind::MissingData, ErrorContext::Undefined);
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({
                "location": ["name"],
                "type": "missing_data",
                "context": "undefined",
                "message": "missing_data at name"
            })
        );

        let e = ValidationError::new(
            location!["items", 1usize],
            ErrorKind::NoMatch,
            ErrorContext::Value { value: Offending::Data(Value::from(-5i64)) },
        );
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({
                "location": ["items", 1],
                "type": "no_match",
                "context": { "value": -5 },
                "message": "no_match at items.1"
            })
        );
    }

    #[test]
    fn raising_keeps_only_the_first_error() {
        let errors = vec![
            ValidationError::new(location!["a"], ErrorKind::NoMatch, ErrorContext::Undefined),
            ValidationError::new(location!["b"], ErrorKind::MissingData, ErrorContext::Undefined),
        ];
        let err = raise::<()>(Ok(Err(errors))).unwrap_err();
        assert_eq!(err.to_string(), "no_match at a");
    }
}
