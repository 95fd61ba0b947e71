//! Public Façade.
//!
//! Every data-bearing call returns `Result<Checked<T>, ConfigError>`: the
//! outer error means the type declaration itself is unusable, the inner one
//! carries located validation errors. The `*_strict` variants flatten both
//! into [`Error`], keeping only the first validation error.
//!
//! An [`Engine`] holds nothing mutable; share it across threads freely.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::codec;
use crate::descriptor::{TypeDescriptor, TypeRef};
use crate::error::{self, Checked, ConfigError, Error};
use crate::matcher::{self, MatchOptions};
use crate::openapi::OpenApi;
use crate::registry::{self, Resolve};
use crate::schema;
use crate::term::Term;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Engine<R> {
    resolver: R,
    options: MatchOptions,
}

impl<R: Resolve> Engine<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver, options: MatchOptions::default() }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Resolve `type_ref` and make sure everything it reaches is usable.
    fn descriptor(&self, type_ref: &TypeRef) -> Result<Arc<TypeDescriptor>, ConfigError> {
        registry::check(&self.resolver, type_ref).inspect_err(|error| {
            tracing::debug!(%type_ref, %error, "type declaration rejected");
        })
    }

    /// Match against an already checked descriptor.
    fn decode_checked(&self, descriptor: &TypeDescriptor, type_ref: &TypeRef, value: &Value) -> Result<Checked<Term>, ConfigError> {
        let out = matcher::decode(&self.resolver, &self.options, descriptor, value)?;
        log_outcome("decode", type_ref, &out);
        Ok(out)
    }

    fn encode_checked(&self, descriptor: &TypeDescriptor, type_ref: &TypeRef, term: &Term) -> Result<Checked<Value>, ConfigError> {
        let out = matcher::encode(&self.resolver, &self.options, descriptor, term)?;
        log_outcome("encode", type_ref, &out);
        Ok(out)
    }

    // ————————————————————————————————————————————————————————————————————————
    // ENCODE
    // ————————————————————————————————————————————————————————————————————————

    pub fn encode_value(&self, term: &Term, type_ref: &TypeRef) -> Result<Checked<Value>, ConfigError> {
        let descriptor = self.descriptor(type_ref)?;
        self.encode_checked(&descriptor, type_ref, term)
    }

    pub fn encode(&self, term: &Term, type_ref: &TypeRef) -> Result<Checked<Vec<u8>>, ConfigError> {
        Ok(self.encode_value(term, type_ref)?.map(|value| codec::serialize(&value)))
    }

    // ————————————————————————————————————————————————————————————————————————
    // DECODE
    // ————————————————————————————————————————————————————————————————————————

    pub fn decode_value(&self, value: &Value, type_ref: &TypeRef) -> Result<Checked<Term>, ConfigError> {
        let descriptor = self.descriptor(type_ref)?;
        self.decode_checked(&descriptor, type_ref, value)
    }

    /// Parse, then match. A parse failure short-circuits with one `decode_error`.
    pub fn decode(&self, data: &[u8], type_ref: &TypeRef) -> Result<Checked<Term>, ConfigError> {
        // Config problems win over data problems, even for unparseable input.
        let descriptor = self.descriptor(type_ref)?;
        match codec::parse(data) {
            Ok(value) => self.decode_checked(&descriptor, type_ref, &value),
            Err(error) => Ok(Err(vec![error])),
        }
    }

    pub fn validate(&self, data: &[u8], type_ref: &TypeRef) -> Result<Checked<()>, ConfigError> {
        Ok(self.decode(data, type_ref)?.map(drop))
    }

    /// Validate, then hand the same data to serde for a typed view. Anything
    /// serde still refuses keeps its path.
    pub fn decode_into<T: DeserializeOwned>(&self, data: &[u8], type_ref: &TypeRef) -> Result<Checked<T>, ConfigError> {
        let descriptor = self.descriptor(type_ref)?;
        let value = match codec::parse(data) {
            Ok(value) => value,
            Err(error) => return Ok(Err(vec![error])),
        };
        if let Err(errors) = self.decode_checked(&descriptor, type_ref, &value)? {
            return Ok(Err(errors));
        }
        Ok(codec::from_value_with_path(&value).map_err(|e| vec![e]))
    }

    /// Decode then encode: canonical bytes for any accepted input.
    pub fn normalize(&self, data: &[u8], type_ref: &TypeRef) -> Result<Checked<Vec<u8>>, ConfigError> {
        let descriptor = self.descriptor(type_ref)?;
        let value = match codec::parse(data) {
            Ok(value) => value,
            Err(error) => return Ok(Err(vec![error])),
        };
        let term = match self.decode_checked(&descriptor, type_ref, &value)? {
            Ok(term) => term,
            Err(errors) => return Ok(Err(errors)),
        };
        Ok(self.encode_checked(&descriptor, type_ref, &term)?.map(|value| codec::serialize(&value)))
    }

    // ————————————————————————————————————————————————————————————————————————
    // SCHEMA
    // ————————————————————————————————————————————————————————————————————————

    pub fn schema_value(&self, type_ref: &TypeRef) -> Result<serde_json::Value, ConfigError> {
        self.descriptor(type_ref)?;
        schema::json_schema(&self.resolver, type_ref)
    }

    /// Schema generation has no data to be wrong about; the inner result is
    /// always `Ok` and exists for a uniform contract.
    pub fn schema(&self, type_ref: &TypeRef) -> Result<Checked<Vec<u8>>, ConfigError> {
        let doc = self.schema_value(type_ref)?;
        Ok(Ok(doc.to_string().into_bytes()))
    }

    pub fn openapi(&self, api: &OpenApi) -> Result<serde_json::Value, ConfigError> {
        for type_ref in api.body_types() {
            self.descriptor(&type_ref)?;
        }
        api.to_document(&self.resolver)
    }

    // ————————————————————————————————————————————————————————————————————————
    // RAISING VARIANTS
    // ————————————————————————————————————————————————————————————————————————

    pub fn encode_strict(&self, term: &Term, type_ref: &TypeRef) -> Result<Vec<u8>, Error> {
        error::raise(self.encode(term, type_ref))
    }

    pub fn decode_strict(&self, data: &[u8], type_ref: &TypeRef) -> Result<Term, Error> {
        error::raise(self.decode(data, type_ref))
    }

    pub fn schema_strict(&self, type_ref: &TypeRef) -> Result<Vec<u8>, Error> {
        error::raise(self.schema(type_ref))
    }
}

fn log_outcome<T>(operation: &'static str, type_ref: &TypeRef, outcome: &Checked<T>) {
    match outcome {
        Ok(_) => tracing::trace!(operation, %type_ref, "ok"),
        Err(errors) => tracing::debug!(operation, %type_ref, errors = errors.len(), "validation failed"),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{ErrorKind, ValidationError};
    use crate::location;
    use crate::matcher::fixtures::{self, user_ref};
    use crate::matcher::{ErrorMode, UnknownKeys};
    use crate::registry::Registry;

    fn engine() -> Engine<Registry> {
        Engine::new(fixtures::registry())
    }

    fn errors(outcome: Result<Checked<Term>, ConfigError>) -> Vec<ValidationError> {
        outcome.unwrap().unwrap_err()
    }

    /// Counts lookups on the way to a registry.
    struct Counting {
        inner: Registry,
        calls: AtomicUsize,
    }

    impl Counting {
        fn take(&self) -> usize {
            self.calls.swap(0, Ordering::SeqCst)
        }
    }

    impl Resolve for Counting {
        fn resolve(&self, type_ref: &TypeRef) -> Result<Arc<TypeDescriptor>, ConfigError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(type_ref)
        }
    }

    #[test]
    fn each_call_checks_the_declaration_once() {
        let e = Engine::new(Counting { inner: fixtures::registry(), calls: AtomicUsize::new(0) });
        let address = fixtures::address_ref();
        let data = br#"{"street":"X","city":"Berlin"}"#;

        assert!(e.decode(data, &address).unwrap().is_ok());
        assert_eq!(e.resolver().take(), 1);
        assert!(e.normalize(data, &address).unwrap().is_ok());
        assert_eq!(e.resolver().take(), 1);
        assert!(e.validate(data, &address).unwrap().is_ok());
        assert_eq!(e.resolver().take(), 1);
        assert!(e.decode_into::<serde_json::Value>(data, &address).unwrap().is_ok());
        assert_eq!(e.resolver().take(), 1);
    }

    fn alice() -> Term {
        Term::structure("App.User", [
            ("name", Term::from("Alice")),
            ("age", Term::from(30i64)),
            (
                "address",
                Term::structure("App.Address", [("street", Term::from("X")), ("city", Term::from("Berlin"))]),
            ),
        ])
    }

    #[test]
    fn golden_encoding() {
        let bytes = engine().encode(&alice(), &user_ref()).unwrap().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"address":{"city":"Berlin","street":"X"},"age":30,"name":"Alice"}"#
        );
    }

    #[test]
    fn round_trip() {
        let e = engine();
        let bytes = e.encode_strict(&alice(), &user_ref()).unwrap();
        assert_eq!(e.decode_strict(&bytes, &user_ref()).unwrap(), alice());
    }

    #[test]
    fn malformed_json_is_exactly_one_decode_error() {
        let errs = errors(engine().decode(br#"{"name":"Alice",}"#, &user_ref()));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ErrorKind::DecodeError);
        assert!(errs[0].location.is_root());
    }

    #[test]
    fn malformed_json_is_one_error_even_when_collecting() {
        let e = engine().with_options(MatchOptions { error_mode: ErrorMode::CollectAll, ..MatchOptions::default() });
        assert_eq!(errors(e.decode(b"[1, 2", &user_ref())).len(), 1);
    }

    #[test]
    fn nil_forms_agree() {
        let e = engine();
        let without = e.decode_strict(br#"{"name":"Alice","age":30}"#, &user_ref()).unwrap();
        let explicit = e.decode_strict(br#"{"name":"Alice","age":30,"address":null}"#, &user_ref()).unwrap();
        let nil = Term::structure("App.User", [
            ("name", Term::from("Alice")),
            ("age", Term::from(30i64)),
            ("address", Term::Nil),
        ]);
        let encoded = e.encode_strict(&nil, &user_ref()).unwrap();
        assert!(!String::from_utf8_lossy(&encoded).contains("address"));
        let round = e.decode_strict(&encoded, &user_ref()).unwrap();
        assert_eq!(without, nil);
        assert_eq!(explicit, nil);
        assert_eq!(round, nil);
    }

    #[test]
    fn unknown_keys_leave_no_trace() {
        let t = engine()
            .decode_strict(br#"{"name":"Alice","age":30,"extra_field":"ignored"}"#, &user_ref())
            .unwrap();
        assert!(t.get("extra_field").is_none());
        assert_eq!(t.get("name"), Some(&Term::from("Alice")));
    }

    #[test]
    fn unknown_keys_can_be_rejected() {
        let e = engine().with_options(MatchOptions { unknown_keys: UnknownKeys::Reject, ..MatchOptions::default() });
        let errs = errors(e.decode(br#"{"name":"Alice","age":30,"extra_field":1}"#, &user_ref()));
        assert_eq!(errs[0].kind, ErrorKind::NotMatchedFields);
    }

    #[test]
    fn nested_errors_are_located() {
        let errs = errors(engine().decode(
            br#"{"name":"Alice","age":30,"address":{"street":123,"city":"Berlin"}}"#,
            &user_ref(),
        ));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].location, location!["address", "street"]);
        assert_eq!(errs[0].kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn refinement_versus_shape() {
        let e = engine();
        let negative = errors(e.decode(br#"{"name":"Alice","age":-5}"#, &user_ref()));
        assert_eq!((negative[0].kind, negative[0].location.clone()), (ErrorKind::NoMatch, location!["age"]));
        let text = errors(e.decode(br#"{"name":"Alice","age":"x"}"#, &user_ref()));
        assert_eq!((text[0].kind, text[0].location.clone()), (ErrorKind::TypeMismatch, location!["age"]));
    }

    #[test]
    fn missing_required_field() {
        let errs = errors(engine().decode(br#"{"age":30}"#, &user_ref()));
        assert_eq!(errs[0].kind, ErrorKind::MissingData);
        assert_eq!(errs[0].location, location!["name"]);
    }

    #[test]
    fn config_errors_win_over_data_errors() {
        let gone = TypeRef::new("App.Gone", "t");
        assert!(matches!(engine().decode(b"not json", &gone), Err(ConfigError::ModuleNotFound { .. })));
        assert!(matches!(
            engine().decode_strict(b"{}", &gone),
            Err(Error::Config(ConfigError::ModuleNotFound { .. }))
        ));
        assert!(matches!(engine().schema_strict(&gone), Err(Error::Config(_))));
    }

    #[test]
    fn strict_message_format() {
        let err = engine().decode_strict(br#"{"name":"Alice","age":-5}"#, &user_ref()).unwrap_err();
        assert_eq!(err.to_string(), "no_match at age");
        let err = engine().decode_strict(b"[", &user_ref()).unwrap_err();
        assert_eq!(err.to_string(), "decode_error at root");
    }

    #[test]
    fn schema_is_idempotent() {
        let e = engine();
        let first = e.schema_strict(&user_ref()).unwrap();
        let second = e.schema_strict(&user_ref()).unwrap();
        assert_eq!(first, second);
        assert_eq!(e.schema_value(&user_ref()).unwrap()["required"], serde_json::json!(["age", "name"]));
    }

    #[test]
    fn normalize_sorts_and_drops() {
        let out = engine()
            .normalize(br#"{"name":"Alice","extra":1,"address":null,"age":30}"#, &user_ref())
            .unwrap()
            .unwrap();
        assert_eq!(out, br#"{"age":30,"name":"Alice"}"#.to_vec());
    }

    #[test]
    fn decode_into_typed_view() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct User {
            name: String,
            age: u8,
        }
        let e = engine();
        let ok: User = e.decode_into(br#"{"name":"Bo","age":7}"#, &user_ref()).unwrap().unwrap();
        assert_eq!(ok, User { name: "Bo".into(), age: 7 });

        // Valid for the registry, too large for u8.
        let errs = e.decode_into::<User>(br#"{"name":"Bo","age":700}"#, &user_ref()).unwrap().unwrap_err();
        assert_eq!(errs[0].location, location!["age"]);

        // Registry validation runs first.
        let errs = e.decode_into::<User>(br#"{"name":"Bo","age":-1}"#, &user_ref()).unwrap().unwrap_err();
        assert_eq!(errs[0].kind, ErrorKind::NoMatch);
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let e = std::sync::Arc::new(engine());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let e = e.clone();
                std::thread::spawn(move || {
                    let doc = format!(r#"{{"name":"U{i}","age":{i}}}"#);
                    e.decode_strict(doc.as_bytes(), &user_ref()).is_ok()
                })
            })
            .collect();
        assert!(handles.into_iter().all(|h| h.join().unwrap()));
    }
}
