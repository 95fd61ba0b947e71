//! JSON Codec Adapter: JSON text ⇄ Dynamic Value.
//!
//! Parsing never panics; malformed text becomes a single `decode_error` at
//! root. Serializing a Value cannot fail.

use serde::de::DeserializeOwned;

use crate::error::{ErrorContext, ErrorKind, Location, Segment, ValidationError};
use crate::value::Value;

pub fn parse(src: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice::<serde_json::Value>(src)
        .map(Value::from)
        .map_err(|error| parse_error(&error))
}

pub fn parse_str(src: &str) -> Result<Value, ValidationError> {
    parse(src.as_bytes())
}

/// Compact JSON bytes, keys in the Value's own order.
pub fn serialize(value: &Value) -> Vec<u8> {
    serde_json::Value::from(value.clone()).to_string().into_bytes()
}

fn parse_error(error: &serde_json::Error) -> ValidationError {
    ValidationError::new(
        Location::root(),
        ErrorKind::DecodeError,
        ErrorContext::Parse {
            reason: error.to_string(),
            line: error.line(),
            column: error.column(),
        },
    )
}

/// Deserialize already-validated data into a Rust type, keeping the JSON path
/// of anything serde still refuses.
pub fn from_value_with_path<T: DeserializeOwned>(value: &Value) -> Result<T, ValidationError> {
    let json = serde_json::Value::from(value.clone());
    serde_path_to_error::deserialize::<_, T>(json).map_err(|err| {
        let location = Location::from(
            err.path()
                .iter()
                .filter_map(|segment| match segment {
                    serde_path_to_error::Segment::Seq { index } => Some(Segment::Index(*index)),
                    serde_path_to_error::Segment::Map { key } => Some(Segment::Field(key.clone())),
                    serde_path_to_error::Segment::Enum { variant } => Some(Segment::Field(variant.clone())),
                    serde_path_to_error::Segment::Unknown => None,
                })
                .collect::<Vec<_>>(),
        );
        let inner = err.into_inner();
        ValidationError::new(
            location,
            ErrorKind::TypeMismatch,
            ErrorContext::Parse { reason: inner.to_string(), line: inner.line(), column: inner.column() },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn trailing_comma_is_one_decode_error() {
        let e = parse_str(r#"{"name":"Alice",}"#).unwrap_err();
        assert_eq!(e.kind, ErrorKind::DecodeError);
        assert!(e.location.is_root());
        let ErrorContext::Parse { line, column, .. } = e.context else { panic!("parse context") };
        assert_eq!(line, 1);
        assert!(column > 0);
    }

    #[test]
    fn unterminated_input_is_a_decode_error() {
        assert_eq!(parse_str(r#"{"name": ["#).unwrap_err().kind, ErrorKind::DecodeError);
        assert_eq!(parse_str("").unwrap_err().kind, ErrorKind::DecodeError);
    }

    #[test]
    fn reader_nesting_limit_fails_closed() {
        let deep = "[".repeat(10_000) + &"]".repeat(10_000);
        assert_eq!(parse_str(&deep).unwrap_err().kind, ErrorKind::DecodeError);
    }

    #[test]
    fn serialize_keeps_value_order() {
        let v = parse_str(r#"{"b":1,"a":[true,null,1.5]}"#).unwrap();
        assert_eq!(serialize(&v), br#"{"b":1,"a":[true,null,1.5]}"#.to_vec());
    }

    #[test]
    fn typed_view_reports_path() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Item {
            id: u8,
        }
        let v = parse_str(r#"{"items":[{"id":1},{"id":300}]}"#).unwrap();
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Doc {
            items: Vec<Item>,
        }
        let e = from_value_with_path::<Doc>(&v).unwrap_err();
        assert_eq!(e.location.to_string(), "items.1.id");
    }
}
