//! OpenAPI 3.1 document composition.
//!
//! Endpoints name their bodies by [`TypeRef`]; every body type is emitted
//! once under `components.schemas` and referenced from operations. Parameter
//! and header schemas are generated inline from descriptors.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::descriptor::{TypeDescriptor, TypeRef};
use crate::error::ConfigError;
use crate::registry::{self, Resolve};
use crate::schema::{Dialect, Generator};

pub const OPENAPI_VERSION: &str = "3.1.0";
const JSON_MEDIA_TYPE: &str = "application/json";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
            Method::Patch => "patch",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub schema: TypeDescriptor,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub description: String,
    pub body: Option<TypeRef>,
    pub headers: IndexMap<String, TypeDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub summary: Option<String>,
    pub operation_id: Option<String>,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<TypeRef>,
    pub responses: BTreeMap<u16, Response>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenApi {
    pub title: String,
    pub version: String,
    pub endpoints: Vec<Endpoint>,
    /// Types listed under `components.schemas` even if no endpoint uses them.
    pub components: Vec<TypeRef>,
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDERS
// ————————————————————————————————————————————————————————————————————————————

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation, schema: TypeDescriptor) -> Self {
        Self { name: name.into(), location, schema, description: None }
    }

    pub fn path(name: impl Into<String>, schema: TypeDescriptor) -> Self {
        Self::new(name, ParameterLocation::Path, schema)
    }

    pub fn query(name: impl Into<String>, schema: TypeDescriptor) -> Self {
        Self::new(name, ParameterLocation::Query, schema)
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

impl Response {
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into(), body: None, headers: IndexMap::new() }
    }

    pub fn body(mut self, type_ref: TypeRef) -> Self {
        self.body = Some(type_ref);
        self
    }

    pub fn header(mut self, name: impl Into<String>, schema: TypeDescriptor) -> Self {
        self.headers.insert(name.into(), schema);
        self
    }
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            summary: None,
            operation_id: None,
            parameters: Vec::new(),
            request_body: None,
            responses: BTreeMap::new(),
        }
    }

    pub fn summary(mut self, text: impl Into<String>) -> Self {
        self.summary = Some(text.into());
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn request_body(mut self, type_ref: TypeRef) -> Self {
        self.request_body = Some(type_ref);
        self
    }

    pub fn response(mut self, status: u16, response: Response) -> Self {
        self.responses.insert(status, response);
        self
    }
}

impl OpenApi {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            endpoints: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn component(mut self, type_ref: TypeRef) -> Self {
        self.components.push(type_ref);
        self
    }

    /// Every named component plus every body type, deduplicated and sorted.
    pub fn body_types(&self) -> Vec<TypeRef> {
        let mut out: Vec<TypeRef> = self
            .endpoints
            .iter()
            .flat_map(|e| e.request_body.iter().chain(e.responses.values().filter_map(|r| r.body.as_ref())))
            .chain(&self.components)
            .cloned()
            .collect();
        out.sort();
        out.dedup();
        out
    }

    // ————————————————————————————————————————————————————————————————————————
    // DOCUMENT
    // ————————————————————————————————————————————————————————————————————————

    pub fn to_document(&self, resolver: &impl Resolve) -> Result<Value, ConfigError> {
        let mut generator = Generator::new(resolver, Dialect::OpenApi);

        let mut schemas = BTreeMap::new();
        for type_ref in self.body_types() {
            schemas.insert(type_ref.to_string(), generator.named(&type_ref)?);
        }

        let mut paths: BTreeMap<&str, BTreeMap<Method, Value>> = BTreeMap::new();
        for endpoint in &self.endpoints {
            let operation = operation(&mut generator, resolver, endpoint)?;
            let slot = paths.entry(endpoint.path.as_str()).or_default();
            if slot.insert(endpoint.method, operation).is_some() {
                tracing::warn!(method = %endpoint.method, path = %endpoint.path, "duplicate endpoint; keeping the last one");
            }
        }

        // Recursive bodies are already present; definitions only add what is missing.
        for (name, body) in generator.into_definitions() {
            schemas.entry(name).or_insert(body);
        }

        let paths: Map<String, Value> = paths
            .into_iter()
            .map(|(path, methods)| {
                let item: Map<String, Value> = methods.into_iter().map(|(m, op)| (m.to_string(), op)).collect();
                (path.to_string(), Value::Object(item))
            })
            .collect();

        tracing::debug!(endpoints = self.endpoints.len(), schemas = schemas.len(), "composed OpenAPI document");
        Ok(json!({
            "openapi": OPENAPI_VERSION,
            "info": { "title": self.title, "version": self.version },
            "paths": paths,
            "components": { "schemas": schemas },
        }))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn operation<R: Resolve + ?Sized>(
    generator: &mut Generator<'_, R>,
    resolver: &R,
    endpoint: &Endpoint,
) -> Result<Value, ConfigError> {
    let mut op = Map::new();
    if let Some(summary) = &endpoint.summary {
        op.insert("summary".into(), Value::from(summary.as_str()));
    }
    if let Some(id) = &endpoint.operation_id {
        op.insert("operationId".into(), Value::from(id.as_str()));
    }

    if !endpoint.parameters.is_empty() {
        let params = endpoint
            .parameters
            .iter()
            .map(|p| parameter(generator, resolver, p))
            .collect::<Result<Vec<_>, _>>()?;
        op.insert("parameters".into(), Value::Array(params));
    }

    if let Some(body) = &endpoint.request_body {
        op.insert("requestBody".into(), json!({
            "required": true,
            "content": json_content(body),
        }));
    }

    let mut responses = Map::new();
    for (status, response) in &endpoint.responses {
        let mut r = Map::new();
        r.insert("description".into(), Value::from(response.description.as_str()));
        if !response.headers.is_empty() {
            let mut headers = Map::new();
            for (name, schema) in &response.headers {
                headers.insert(name.clone(), json!({ "schema": generator.descriptor(schema)? }));
            }
            r.insert("headers".into(), Value::Object(headers));
        }
        if let Some(body) = &response.body {
            r.insert("content".into(), json_content(body));
        }
        responses.insert(status.to_string(), Value::Object(r));
    }
    op.insert("responses".into(), Value::Object(responses));
    Ok(Value::Object(op))
}

fn parameter<R: Resolve + ?Sized>(
    generator: &mut Generator<'_, R>,
    resolver: &R,
    p: &Parameter,
) -> Result<Value, ConfigError> {
    let required = p.location == ParameterLocation::Path || !registry::is_optional(resolver, &p.schema)?;
    let mut out = Map::new();
    out.insert("name".into(), Value::from(p.name.as_str()));
    out.insert("in".into(), Value::from(p.location.as_str()));
    out.insert("required".into(), Value::Bool(required));
    if let Some(description) = &p.description {
        out.insert("description".into(), Value::from(description.as_str()));
    }
    out.insert("schema".into(), generator.descriptor(&p.schema)?);
    Ok(Value::Object(out))
}

fn json_content(type_ref: &TypeRef) -> Value {
    json!({ JSON_MEDIA_TYPE: { "schema": Dialect::OpenApi.ref_to(type_ref) } })
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
