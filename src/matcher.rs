//! Structural Matcher.
//!
//! Walks a [`TypeDescriptor`] in lock-step with a value:
//!
//! - decode: Dynamic [`Value`] → native [`Term`], validating on the way;
//! - encode: native [`Term`] → wire-ready [`Value`], with nil omission and
//!   lexicographic key order for records.
//!
//! Policy that holds in both directions:
//! - wrong shape is `type_mismatch`; right shape failing a refinement is `no_match`;
//! - a union reports one `no_match`, never one error per variant;
//! - refs are resolved at the moment they are reached, so recursive types are fine.
pub mod accumulator;
mod decode;
mod encode;

use std::sync::Arc;

use crate::descriptor::{TypeDescriptor, TypeRef};
use crate::error::{Checked, ConfigError};
use crate::registry::{self, Resolve};
use crate::term::Term;
use crate::value::Value;

pub use accumulator::Accumulator;
use accumulator::Step;

// ------------------------------- Policy ---------------------------------- //

/// Nested match steps allowed per call before failing closed.
pub const DEFAULT_MAX_DEPTH: usize = 256;

// ------------------------------- Options --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Forward compatible: extra keys are dropped.
    #[default]
    Ignore,
    /// Extra keys are reported as `not_matched_fields`.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// One error per call.
    #[default]
    FirstError,
    /// Keep going past failed record fields and collection elements.
    CollectAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOptions {
    pub max_depth: usize,
    pub unknown_keys: UnknownKeys,
    pub error_mode: ErrorMode,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_keys: UnknownKeys::default(),
            error_mode: ErrorMode::default(),
        }
    }
}

// ------------------------------- Front API -------------------------------- //

/// Decode external data against `descriptor`.
pub fn decode<R: Resolve + ?Sized>(
    resolver: &R,
    options: &MatchOptions,
    descriptor: &TypeDescriptor,
    value: &Value,
) -> Result<Checked<Term>, ConfigError> {
    let mut acc = Accumulator::new(options);
    let result = Walk { resolver }.decode(&mut acc, descriptor, value);
    acc.one_or_many(result)
}

/// Encode a native value against `descriptor`.
pub fn encode<R: Resolve + ?Sized>(
    resolver: &R,
    options: &MatchOptions,
    descriptor: &TypeDescriptor,
    term: &Term,
) -> Result<Checked<Value>, ConfigError> {
    let mut acc = Accumulator::new(options);
    let result = Walk { resolver }.encode(&mut acc, descriptor, term);
    acc.one_or_many(result)
}

// ------------------------------- Shared ---------------------------------- //

/// Borrowed view over the resolver for the duration of one walk.
struct Walk<'r, R: ?Sized> {
    resolver: &'r R,
}

impl<R: Resolve + ?Sized> Walk<'_, R> {
    fn resolve(&self, type_ref: &TypeRef) -> Step<Arc<TypeDescriptor>> {
        Ok(self.resolver.resolve(type_ref)?)
    }

    fn is_optional(&self, descriptor: &TypeDescriptor) -> Step<bool> {
        Ok(registry::is_optional(self.resolver, descriptor)?)
    }

    fn unsupported<T>(&self, reason: &str) -> Step<T> {
        // Only reachable when the caller skipped `registry::check`.
        Err(ConfigError::UnsupportedShape { description: reason.to_string() }.into())
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::descriptor::{TypeDescriptor, TypeRef};
    use crate::registry::Registry;

    pub fn user_ref() -> TypeRef { TypeRef::new("App.User", "t") }
    pub fn address_ref() -> TypeRef { TypeRef::new("App.Address", "t") }
    pub fn node_ref() -> TypeRef { TypeRef::new("App.Node", "t") }

    /// `App.User{name, age: non_neg_integer, address: App.Address | nil}`,
    /// `App.Address{street, city}`, and the self-referential `App.Node`.
    pub fn registry() -> Registry {
        Registry::new()
            .with_type(
                user_ref(),
                TypeDescriptor::record("App.User", [
                    ("name", TypeDescriptor::string()),
                    ("age", TypeDescriptor::non_negative_integer()),
                    ("address", TypeDescriptor::optional(TypeDescriptor::Ref(address_ref()))),
                ]),
            )
            .with_type(
                address_ref(),
                TypeDescriptor::record("App.Address", [
                    ("street", TypeDescriptor::string()),
                    ("city", TypeDescriptor::string()),
                ]),
            )
            .with_type(
                node_ref(),
                TypeDescriptor::record("App.Node", [
                    ("value", TypeDescriptor::integer()),
                    ("children", TypeDescriptor::collection(TypeDescriptor::Ref(node_ref()))),
                    ("parent", TypeDescriptor::optional(TypeDescriptor::Ref(node_ref()))),
                ]),
            )
    }
}
