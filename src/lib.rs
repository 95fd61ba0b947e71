//! Type-driven JSON interchange.
//!
//! Given a [`TypeDescriptor`] (obtained through [`Resolve`]), the [`Engine`]
//! encodes native [`Term`]s to JSON, decodes JSON back into terms while
//! collecting located [`ValidationError`]s, and derives JSON Schema and
//! OpenAPI documents from the same descriptor.
//!
//! ```
//! use json_shape::{Engine, Registry, TypeDescriptor, TypeRef};
//!
//! let tag = TypeRef::new("App.Tag", "t");
//! let engine = Engine::new(Registry::new().with_type(
//!     tag.clone(),
//!     TypeDescriptor::record("App.Tag", [("label", TypeDescriptor::string())]),
//! ));
//! let errors = engine.decode(br#"{"label": 1}"#, &tag).unwrap().unwrap_err();
//! assert_eq!(errors[0].message(), "type_mismatch at label");
//! ```
pub mod cli;
pub mod codec;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod openapi;
pub mod registry;
pub mod schema;
pub mod term;
pub mod value;

pub use descriptor::{PrimitiveKind, RecordDescriptor, TypeDescriptor, TypeRef};
pub use engine::Engine;
pub use error::{Checked, ConfigError, Error, ErrorContext, ErrorKind, Location, Segment, ValidationError};
pub use matcher::{ErrorMode, MatchOptions, UnknownKeys};
pub use openapi::{Endpoint, Method, OpenApi, Parameter, ParameterLocation, Response};
pub use registry::{Registry, Resolve};
pub use term::Term;
pub use value::Value;
