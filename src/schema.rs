//! Schema Generator.
//!
//! Same descriptor walk as the matcher, but without data: every node maps to
//! a schema fragment. Record properties are sorted by name, like encoded
//! objects, and `required` comes from the shared optionality rule in
//! [`crate::registry::is_optional`].
//!
//! Refs are inlined unless they sit on a cycle. Those become `$ref`s and their
//! bodies are emitted once in a definitions table, so recursive types produce
//! a finite document.
//!
//! Unions and nullable fields use `anyOf`: arms may overlap (an integer is
//! also a number), and the decoder accepts a value any arm accepts.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::{json, Map, Value};

use crate::descriptor::{PrimitiveKind, RecordDescriptor, TypeDescriptor, TypeRef};
use crate::error::ConfigError;
use crate::registry::{self, Resolve};

pub const JSON_SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    JsonSchema,
    OpenApi,
}

impl Dialect {
    fn ref_prefix(self) -> &'static str {
        match self {
            Dialect::JsonSchema => "#/$defs/",
            Dialect::OpenApi => "#/components/schemas/",
        }
    }

    pub fn ref_to(self, type_ref: &TypeRef) -> Value {
        json!({ "$ref": format!("{}{type_ref}", self.ref_prefix()) })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

/// Standalone JSON Schema document for `root`.
pub fn json_schema(resolver: &impl Resolve, root: &TypeRef) -> Result<Value, ConfigError> {
    let mut generator = Generator::new(resolver, Dialect::JsonSchema);
    let body = generator.named(root)?;
    let definitions = generator.into_definitions();

    let mut doc = Map::new();
    doc.insert("$schema".into(), Value::from(JSON_SCHEMA_DIALECT));
    match body {
        Value::Object(fields) => doc.extend(fields),
        other => {
            doc.insert("allOf".into(), Value::Array(vec![other]));
        }
    }
    if !definitions.is_empty() {
        doc.insert("$defs".into(), Value::Object(definitions.into_iter().collect()));
    }
    Ok(Value::Object(doc))
}

// ————————————————————————————————————————————————————————————————————————————
// GENERATOR
// ————————————————————————————————————————————————————————————————————————————

/// One generator per output document; definitions accumulate across calls.
pub struct Generator<'r, R: ?Sized> {
    resolver: &'r R,
    dialect: Dialect,
    /// Refs that must be emitted as `$ref` because they sit on a cycle.
    recursive: BTreeSet<TypeRef>,
    /// Refs whose reachable graph has already been scanned for cycles.
    scanned: HashSet<TypeRef>,
    definitions: BTreeMap<String, Value>,
    /// Named types currently being expanded; innermost last.
    owners: Vec<TypeRef>,
}

impl<'r, R: Resolve + ?Sized> Generator<'r, R> {
    pub fn new(resolver: &'r R, dialect: Dialect) -> Self {
        Self {
            resolver,
            dialect,
            recursive: BTreeSet::new(),
            scanned: HashSet::new(),
            definitions: BTreeMap::new(),
            owners: Vec::new(),
        }
    }

    /// Schema body for a named type. Recursive types are also registered as
    /// definitions so inner `$ref`s resolve.
    pub fn named(&mut self, type_ref: &TypeRef) -> Result<Value, ConfigError> {
        self.scan(type_ref)?;
        if self.recursive.contains(type_ref) {
            self.define(type_ref)?;
            if let Some(body) = self.definitions.get(&type_ref.to_string()) {
                return Ok(body.clone());
            }
        }
        self.expand(type_ref)
    }

    /// Schema for an anonymous descriptor (parameters, inline bodies).
    pub fn descriptor(&mut self, descriptor: &TypeDescriptor) -> Result<Value, ConfigError> {
        let mut refs = Vec::new();
        collect_refs(descriptor, &mut refs);
        for r in &refs {
            self.scan(r)?;
        }
        self.node(descriptor)
    }

    /// Emitted definitions, keyed `Module.name`, in sorted order.
    pub fn into_definitions(self) -> BTreeMap<String, Value> {
        self.definitions
    }

    fn node(&mut self, d: &TypeDescriptor) -> Result<Value, ConfigError> {
        match d {
            TypeDescriptor::Primitive(kind) => Ok(primitive(kind)),
            TypeDescriptor::Optional(inner) => Ok(nullable(self.node(inner)?)),
            TypeDescriptor::Union(variants) => self.union(variants),
            TypeDescriptor::Record(record) => self.record(record),
            TypeDescriptor::Collection(element) => Ok(json!({
                "type": "array",
                "items": self.node(element)?,
            })),
            TypeDescriptor::Ref(r) if self.recursive.contains(r) => {
                self.define(r)?;
                Ok(self.dialect.ref_to(r))
            }
            TypeDescriptor::Ref(r) => self.expand(r),
            TypeDescriptor::Unsupported(reason) => Err(match self.owners.last() {
                Some(owner) => ConfigError::UnsupportedType {
                    type_ref: owner.clone(),
                    description: reason.clone(),
                },
                None => ConfigError::UnsupportedShape { description: reason.clone() },
            }),
        }
    }

    fn union(&mut self, variants: &[TypeDescriptor]) -> Result<Value, ConfigError> {
        let literals: Option<Vec<&str>> = variants
            .iter()
            .map(|v| match v {
                TypeDescriptor::Primitive(PrimitiveKind::Atom(a)) => Some(a.as_str()),
                _ => None,
            })
            .collect();
        match literals {
            // All-literal unions read better as an enum.
            Some(values) if !values.is_empty() => Ok(json!({ "type": "string", "enum": values })),
            _ => {
                let arms = variants.iter().map(|v| self.node(v)).collect::<Result<Vec<_>, _>>()?;
                Ok(json!({ "anyOf": arms }))
            }
        }
    }

    fn record(&mut self, record: &RecordDescriptor) -> Result<Value, ConfigError> {
        let mut declared: Vec<(&String, &TypeDescriptor)> = record.fields.iter().collect();
        declared.sort_by(|a, b| a.0.cmp(b.0));

        let mut props = Vec::with_capacity(declared.len());
        let mut required = Vec::new();
        for (name, fd) in declared {
            if !registry::is_optional(self.resolver, fd)? {
                required.push(name.clone());
            }
            props.push((name.clone(), self.node(fd)?));
        }
        Ok(obj_of(&record.name, props, required))
    }

    fn expand(&mut self, type_ref: &TypeRef) -> Result<Value, ConfigError> {
        let target = self.resolver.resolve(type_ref)?;
        self.owners.push(type_ref.clone());
        let out = self.node(&target);
        self.owners.pop();
        out
    }

    fn define(&mut self, type_ref: &TypeRef) -> Result<(), ConfigError> {
        let key = type_ref.to_string();
        if self.definitions.contains_key(&key) {
            return Ok(());
        }
        // Placeholder first: the body refers back to itself.
        self.definitions.insert(key.clone(), Value::Null);
        match self.expand(type_ref) {
            Ok(body) => {
                self.definitions.insert(key, body);
                Ok(())
            }
            Err(error) => {
                self.definitions.remove(&key);
                Err(error)
            }
        }
    }

    /// Depth-first over the ref graph from `root`; every back edge marks the
    /// refs on the current path as recursive.
    fn scan(&mut self, root: &TypeRef) -> Result<(), ConfigError> {
        if self.scanned.contains(root) {
            return Ok(());
        }
        let mut path: Vec<TypeRef> = Vec::new();
        // (ref, children left to visit); a frame is entered when pushed.
        let mut frames: Vec<(TypeRef, Vec<TypeRef>)> = Vec::new();
        self.enter(root.clone(), &mut path, &mut frames)?;

        while let Some((_, pending)) = frames.last_mut() {
            let Some(next) = pending.pop() else {
                if let Some((done, _)) = frames.pop() {
                    path.pop();
                    self.scanned.insert(done);
                }
                continue;
            };
            if let Some(at) = path.iter().position(|r| *r == next) {
                self.recursive.extend(path[at..].iter().cloned());
            } else if !self.scanned.contains(&next) {
                self.enter(next, &mut path, &mut frames)?;
            }
        }
        Ok(())
    }

    fn enter(
        &self,
        type_ref: TypeRef,
        path: &mut Vec<TypeRef>,
        frames: &mut Vec<(TypeRef, Vec<TypeRef>)>,
    ) -> Result<(), ConfigError> {
        let target = self.resolver.resolve(&type_ref)?;
        let mut children = Vec::new();
        collect_refs(&target, &mut children);
        children.reverse();
        path.push(type_ref.clone());
        frames.push((type_ref, children));
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn primitive(kind: &PrimitiveKind) -> Value {
    match kind {
        PrimitiveKind::String => json!({ "type": "string" }),
        PrimitiveKind::Integer => json!({ "type": "integer" }),
        PrimitiveKind::NonNegativeInteger => json!({ "type": "integer", "minimum": 0 }),
        PrimitiveKind::Float => json!({ "type": "number" }),
        PrimitiveKind::Boolean => json!({ "type": "boolean" }),
        PrimitiveKind::Atom(value) => json!({ "type": "string", "const": value }),
    }
}

fn obj_of(title: &str, props: Vec<(String, Value)>, required: Vec<String>) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), Value::from("object"));
    map.insert("title".into(), Value::from(title));
    map.insert("properties".into(), Value::Object(props.into_iter().collect()));
    if !required.is_empty() {
        map.insert(
            "required".into(),
            Value::Array(required.into_iter().map(Value::from).collect()),
        );
    }
    map.insert("additionalProperties".into(), Value::Bool(false));
    Value::Object(map)
}

fn nullable(inner: Value) -> Value {
    json!({ "anyOf": [inner, { "type": "null" }] })
}

/// Refs appearing directly in `d`, in declaration order, without resolving.
fn collect_refs(d: &TypeDescriptor, out: &mut Vec<TypeRef>) {
    match d {
        TypeDescriptor::Primitive(_) | TypeDescriptor::Unsupported(_) => {}
        TypeDescriptor::Optional(inner) | TypeDescriptor::Collection(inner) => collect_refs(inner, out),
        TypeDescriptor::Union(variants) => variants.iter().for_each(|v| collect_refs(v, out)),
        TypeDescriptor::Record(record) => record.fields.values().for_each(|f| collect_refs(f, out)),
        TypeDescriptor::Ref(r) => out.push(r.clone()),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::fixtures::{self, address_ref, node_ref, user_ref};
    use crate::registry::Registry;

    #[test]
    fn user_schema_inlines_non_recursive_refs() {
        let doc = json_schema(&fixtures::registry(), &user_ref()).unwrap();
        assert_eq!(
            doc,
            json!({
                "$schema": JSON_SCHEMA_DIALECT,
                "type": "object",
                "title": "App.User",
                "properties": {
                    "address": { "anyOf": [
                        {
                            "type": "object",
                            "title": "App.Address",
                            "properties": {
                                "city": { "type": "string" },
                                "street": { "type": "string" }
                            },
                            "required": ["city", "street"],
                            "additionalProperties": false
                        },
                        { "type": "null" }
                    ]},
                    "age": { "type": "integer", "minimum": 0 },
                    "name": { "type": "string" }
                },
                "required": ["age", "name"],
                "additionalProperties": false
            })
        );
        assert!(doc.get("$defs").is_none());
    }

    #[test]
    fn properties_follow_encode_order() {
        let doc = json_schema(&fixtures::registry(), &user_ref()).unwrap();
        let keys: Vec<&String> = doc["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["address", "age", "name"]);
    }

    #[test]
    fn recursive_types_use_defs() {
        let doc = json_schema(&fixtures::registry(), &node_ref()).unwrap();
        let node_ref_json = json!({ "$ref": "#/$defs/App.Node.t" });
        assert_eq!(doc["properties"]["children"]["items"], node_ref_json);
        assert_eq!(doc["properties"]["parent"]["anyOf"][0], node_ref_json);
        assert_eq!(doc["required"], json!(["children", "value"]));

        let def = &doc["$defs"]["App.Node.t"];
        assert_eq!(def["title"], "App.Node");
        assert_eq!(def["properties"]["children"]["items"], node_ref_json);
    }

    #[test]
    fn mutual_recursion_is_finite() {
        let a = TypeRef::new("App.A", "t");
        let b = TypeRef::new("App.B", "t");
        let reg = Registry::new()
            .with_type(a.clone(), TypeDescriptor::record("App.A", [("b", TypeDescriptor::optional(TypeDescriptor::Ref(b.clone())))]))
            .with_type(b.clone(), TypeDescriptor::record("App.B", [("a", TypeDescriptor::Ref(a.clone()))]));
        let doc = json_schema(&reg, &a).unwrap();
        let defs = doc["$defs"].as_object().unwrap();
        assert_eq!(defs.keys().collect::<Vec<_>>(), ["App.A.t", "App.B.t"]);
        assert_eq!(defs["App.B.t"]["properties"]["a"], json!({ "$ref": "#/$defs/App.A.t" }));
    }

    #[test]
    fn openapi_dialect_points_at_components() {
        let reg = fixtures::registry();
        let mut generator = Generator::new(&reg, Dialect::OpenApi);
        let body = generator.named(&node_ref()).unwrap();
        assert_eq!(
            body["properties"]["children"]["items"],
            json!({ "$ref": "#/components/schemas/App.Node.t" })
        );
        assert!(generator.into_definitions().contains_key("App.Node.t"));
    }

    #[test]
    fn atom_unions_become_enums() {
        let reg = Registry::new();
        let mut generator = Generator::new(&reg, Dialect::JsonSchema);
        let status = TypeDescriptor::union([TypeDescriptor::atom("active"), TypeDescriptor::atom("banned")]);
        assert_eq!(generator.descriptor(&status).unwrap(), json!({ "type": "string", "enum": ["active", "banned"] }));

        let mixed = TypeDescriptor::union([TypeDescriptor::atom("none"), TypeDescriptor::integer()]);
        assert_eq!(
            generator.descriptor(&mixed).unwrap(),
            json!({ "anyOf": [{ "type": "string", "const": "none" }, { "type": "integer" }] })
        );
    }

    #[test]
    fn overlapping_unions_accept_any_arm() {
        let reg = Registry::new();
        let mut generator = Generator::new(&reg, Dialect::JsonSchema);
        let numeric = TypeDescriptor::union([TypeDescriptor::integer(), TypeDescriptor::float()]);
        let schema = generator.descriptor(&numeric).unwrap();
        assert_eq!(schema, json!({ "anyOf": [{ "type": "integer" }, { "type": "number" }] }));
        // 5 satisfies both arms; a oneOf would refuse it.
        assert!(schema.get("oneOf").is_none());

        let maybe = TypeDescriptor::optional(numeric);
        assert_eq!(
            generator.descriptor(&maybe).unwrap(),
            json!({ "anyOf": [{ "anyOf": [{ "type": "integer" }, { "type": "number" }] }, { "type": "null" }] })
        );
    }

    #[test]
    fn unsupported_is_a_config_error_naming_its_owner() {
        let conn = TypeRef::new("App.Conn", "t");
        let reg = fixtures::registry()
            .with_type(conn.clone(), TypeDescriptor::record("App.Conn", [("pid", TypeDescriptor::Unsupported("pid()".into()))]));
        assert_eq!(
            json_schema(&reg, &conn).unwrap_err(),
            ConfigError::UnsupportedType { type_ref: conn, description: "pid()".into() }
        );
        assert!(matches!(
            json_schema(&reg, &TypeRef::new("App.Gone", "t")),
            Err(ConfigError::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn output_is_byte_identical_across_calls() {
        let reg = fixtures::registry();
        for root in [user_ref(), address_ref(), node_ref()] {
            let first = json_schema(&reg, &root).unwrap().to_string();
            let second = json_schema(&reg, &root).unwrap().to_string();
            assert_eq!(first, second);
        }
    }
}
