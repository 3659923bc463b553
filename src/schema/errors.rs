//! Schema error types
//!
//! Error codes:
//! - DOCSCHEMA_INVALID_DEFINITION: a field definition cannot be compiled
//! - DOCSCHEMA_MALFORMED_SCHEMA: a schema file cannot be read or parsed
//! - DOCSCHEMA_UNKNOWN_SCHEMA: no schema registered under a name
//! - DOCSCHEMA_SCHEMA_IMMUTABLE: a schema name is registered twice
//! - DOCSCHEMA_INVALID_INPUT: the object handed to validate/clean has the wrong shape
//!
//! These are configuration errors. Invalid field values are never errors;
//! they are reported as data by the validator.

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Definition without a type
    #[error("Invalid definition for {key} field: no type specified")]
    MissingType { key: String },

    /// `autoValue`/`defaultValue` on an array item
    #[error("Invalid definition for {key} field: autoValue and defaultValue cannot be used on array items")]
    AutoValueOnArrayItem { key: String },

    /// A bound of the wrong kind for the field type
    #[error("Invalid definition for {key} field: {reason}")]
    InvalidBound { key: String, reason: String },

    /// Unrecognized type name in a schema file
    #[error("Invalid definition for {key} field: unknown type '{name}'")]
    UnknownType { key: String, name: String },

    /// Regular expression that does not compile
    #[error("Invalid definition for {key} field: bad regular expression '{pattern}': {reason}")]
    InvalidRegex {
        key: String,
        pattern: String,
        reason: String,
    },

    /// Unreadable or unparsable schema file
    #[error("Malformed schema file '{path}': {reason}")]
    MalformedSchema { path: String, reason: String },

    /// No schema under the name
    #[error("Schema '{0}' not found")]
    UnknownSchema(String),

    /// Name already registered
    #[error("Schema '{0}' is already registered")]
    SchemaImmutable(String),

    /// Validate/clean input of the wrong shape
    #[error("{0}")]
    InvalidInput(String),
}

impl SchemaError {
    pub fn malformed_schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::MalformedSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_bound(key: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidBound {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        SchemaError::InvalidInput(message.into())
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::MissingType { .. }
            | SchemaError::AutoValueOnArrayItem { .. }
            | SchemaError::InvalidBound { .. }
            | SchemaError::UnknownType { .. }
            | SchemaError::InvalidRegex { .. } => "DOCSCHEMA_INVALID_DEFINITION",
            SchemaError::MalformedSchema { .. } => "DOCSCHEMA_MALFORMED_SCHEMA",
            SchemaError::UnknownSchema(_) => "DOCSCHEMA_UNKNOWN_SCHEMA",
            SchemaError::SchemaImmutable(_) => "DOCSCHEMA_SCHEMA_IMMUTABLE",
            SchemaError::InvalidInput(_) => "DOCSCHEMA_INVALID_INPUT",
        }
    }
}
