//! Schema subsystem
//!
//! A schema is a flat map from generic field path (`owner.email`,
//! `tags.$`) to field definition, compiled once from one or more sources.
//!
//! # Design Principles
//!
//! - Keys are generic paths; array indices never appear in a schema
//! - Implied keys (ancestors, array items) are always present after compile
//! - Computed options resolve at lookup time, never at compile time
//! - Definition problems are configuration errors, raised at compile time

mod compiler;
mod errors;
mod inflect;
mod loader;
mod simple_schema;
mod types;

pub use compiler::DefinitionMap;
pub use errors::{SchemaError, SchemaResult};
pub use inflect::{default_label, humanize};
pub use loader::SchemaLoader;
pub use simple_schema::SimpleSchema;
pub use types::{
    AutoValueFn, Bound, CustomFn, FieldDefinition, FieldType, Limit, OptionContext, OptionFn,
    RegExSpec, ResolvedDefinition, SchemaSource,
};
