//! Type descriptor source.
//!
//! The engine never extracts types itself; it asks a [`Resolve`] for an
//! already-normalized tree. [`Registry`] is the in-memory implementation:
//! built once (by hand or from a JSON document) and read-only afterwards, so
//! one instance can serve any number of threads.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::descriptor::{TypeDescriptor, TypeRef};
use crate::error::ConfigError;

pub trait Resolve: Send + Sync {
    fn resolve(&self, type_ref: &TypeRef) -> Result<Arc<TypeDescriptor>, ConfigError>;
}

impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, type_ref: &TypeRef) -> Result<Arc<TypeDescriptor>, ConfigError> {
        (**self).resolve(type_ref)
    }
}

impl<R: Resolve + ?Sized> Resolve for &R {
    fn resolve(&self, type_ref: &TypeRef) -> Result<Arc<TypeDescriptor>, ConfigError> {
        (**self).resolve(type_ref)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: IndexMap<String, IndexMap<String, Arc<TypeDescriptor>>>,
}

/// On-disk shape: `{"modules": {"App.User": {"types": {"t": <descriptor>}}}}`.
#[derive(Debug, Deserialize)]
struct RegistryDocument {
    modules: IndexMap<String, ModuleDocument>,
}

#[derive(Debug, Deserialize)]
struct ModuleDocument {
    types: IndexMap<String, TypeDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable insert for building registries in code.
    pub fn with_type(mut self, type_ref: TypeRef, descriptor: TypeDescriptor) -> Self {
        self.insert(type_ref, descriptor);
        self
    }

    pub fn insert(&mut self, type_ref: TypeRef, descriptor: TypeDescriptor) {
        self.modules
            .entry(type_ref.module)
            .or_default()
            .insert(type_ref.name, Arc::new(descriptor));
    }

    pub fn from_json_str(src: &str) -> Result<Self, ConfigError> {
        let de = &mut serde_json::Deserializer::from_str(src);
        let doc: RegistryDocument = serde_path_to_error::deserialize(de).map_err(|err| {
            let path = err.path().to_string();
            ConfigError::Load { reason: format!("at JSON path {path} → {}", err.into_inner()) }
        })?;
        let mut out = Self::new();
        for (module, m) in doc.modules {
            for (name, descriptor) in m.types {
                out.insert(TypeRef::new(module.clone(), name), descriptor);
            }
        }
        tracing::debug!(modules = out.modules.len(), "loaded type registry");
        Ok(out)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
            reason: format!("{}: {error}", path.display()),
        })?;
        Self::from_json_str(&src)
    }
}

impl Resolve for Registry {
    fn resolve(&self, type_ref: &TypeRef) -> Result<Arc<TypeDescriptor>, ConfigError> {
        let types = self.modules.get(&type_ref.module).ok_or_else(|| ConfigError::ModuleNotFound {
            module: type_ref.module.clone(),
        })?;
        types.get(&type_ref.name).cloned().ok_or_else(|| ConfigError::TypeNotFound {
            module: type_ref.module.clone(),
            name: type_ref.name.clone(),
        })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHARED POLICY
// ————————————————————————————————————————————————————————————————————————————

/// Ref → Ref chains longer than this are treated as a bad declaration.
const MAX_REF_CHAIN: usize = 32;

/// Whether a record field with this descriptor may be absent (or nil),
/// looking through refs. Matcher and schema generator agree through this.
pub fn is_optional(resolver: &(impl Resolve + ?Sized), descriptor: &TypeDescriptor) -> Result<bool, ConfigError> {
    let mut current = match descriptor {
        TypeDescriptor::Optional(_) => return Ok(true),
        TypeDescriptor::Ref(r) => resolver.resolve(r)?,
        _ => return Ok(false),
    };
    for _ in 0..MAX_REF_CHAIN {
        current = match &*current {
            TypeDescriptor::Optional(_) => return Ok(true),
            TypeDescriptor::Ref(r) => resolver.resolve(r)?,
            _ => return Ok(false),
        };
    }
    Err(ConfigError::UnsupportedShape {
        description: format!("{} does not reach a concrete type", descriptor.describe()),
    })
}

// ————————————————————————————————————————————————————————————————————————————
// CONFIGURATION CHECK
// ————————————————————————————————————————————————————————————————————————————

/// Walk everything reachable from `root` and fail on the first unresolvable
/// ref or `Unsupported` node. Each named type is visited once, so recursive
/// types terminate.
pub fn check(resolver: &impl Resolve, root: &TypeRef) -> Result<Arc<TypeDescriptor>, ConfigError> {
    let descriptor = resolver.resolve(root)?;
    let mut seen = HashSet::from([root.clone()]);
    let mut pending = vec![(root.clone(), descriptor.clone())];
    while let Some((owner, node)) = pending.pop() {
        let mut refs = Vec::new();
        check_node(&owner, &node, &mut refs)?;
        for r in refs {
            if seen.insert(r.clone()) {
                let next = resolver.resolve(&r)?;
                pending.push((r, next));
            }
        }
    }
    Ok(descriptor)
}

fn check_node(owner: &TypeRef, node: &TypeDescriptor, refs: &mut Vec<TypeRef>) -> Result<(), ConfigError> {
    match node {
        TypeDescriptor::Primitive(_) => Ok(()),
        TypeDescriptor::Optional(inner) | TypeDescriptor::Collection(inner) => check_node(owner, inner, refs),
        TypeDescriptor::Union(variants) => variants.iter().try_for_each(|v| check_node(owner, v, refs)),
        TypeDescriptor::Record(record) => record.fields.values().try_for_each(|f| check_node(owner, f, refs)),
        TypeDescriptor::Ref(r) => {
            refs.push(r.clone());
            Ok(())
        }
        TypeDescriptor::Unsupported(reason) => {
            tracing::warn!(type_ref = %owner, %reason, "type declaration uses an unsupported type");
            Err(ConfigError::UnsupportedType {
                type_ref: owner.clone(),
                description: reason.clone(),
            })
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
