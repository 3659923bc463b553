//! docschema - schema-driven cleaning and validation of JSON documents and
//! update modifiers
//!
//! - `mongo_object`: flat position index over a document or modifier
//! - `schema`: field definitions compiled into a `SimpleSchema`
//! - `clean`: filtering, type coercion, empty strings, auto-values
//! - `validation`: one error per field, plus a stateful `ValidationContext`

pub mod clean;
pub mod cli;
pub mod messages;
pub mod mongo_object;
pub mod regex_presets;
pub mod registry;
pub mod schema;
pub mod validation;
pub mod value;

pub use clean::{clean, AutoValueContext, CleanOptions};
pub use messages::MessageBook;
pub use mongo_object::MongoObject;
pub use registry::Registry;
pub use schema::{FieldDefinition, FieldType, SchemaError, SchemaLoader, SchemaResult, SimpleSchema};
pub use validation::{
    validate, CustomContext, ErrorKind, InvalidFieldError, ValidateOptions, ValidationContext,
};
