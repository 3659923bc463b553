//! CLI error types
//!
//! Every CLI error is fatal: it is written to stdout as a JSON error object
//! and the process exits non-zero.

use std::io;

use thiserror::Error;

use crate::schema::SchemaError;

/// CLI error. Each variant carries its rendered message.
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    #[error("DOCSCHEMA_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    /// stdin/stdout failures and malformed input JSON
    #[error("DOCSCHEMA_CLI_IO_ERROR: {0}")]
    Io(String),

    /// Schema could not be compiled, or input had the wrong shape
    #[error("DOCSCHEMA_CLI_SCHEMA_ERROR: {0}")]
    Schema(String),

    #[error("DOCSCHEMA_CLI_UNKNOWN_SCHEMA: {0}")]
    UnknownSchema(String),
}

impl CliError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Stable code reported in the JSON error object.
    pub fn code_str(&self) -> &'static str {
        match self {
            Self::Config(_) => "DOCSCHEMA_CLI_CONFIG_ERROR",
            Self::Io(_) => "DOCSCHEMA_CLI_IO_ERROR",
            Self::Schema(_) => "DOCSCHEMA_CLI_SCHEMA_ERROR",
            Self::UnknownSchema(_) => "DOCSCHEMA_CLI_UNKNOWN_SCHEMA",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Config(m) | Self::Io(m) | Self::Schema(m) | Self::UnknownSchema(m) => m,
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        let message = format!("{} ({})", e, e.code());
        match e {
            SchemaError::UnknownSchema(_) => Self::UnknownSchema(message),
            _ => Self::Schema(message),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_codes() {
        let err = CliError::from(SchemaError::UnknownSchema("users".into()));
        assert_eq!(err.code_str(), "DOCSCHEMA_CLI_UNKNOWN_SCHEMA");
        assert!(err.message().contains("users"));

        let err = CliError::from(SchemaError::invalid_input("not an object"));
        assert!(matches!(err, CliError::Schema(_)));
    }

    #[test]
    fn test_display_includes_code() {
        let err = CliError::config_error("bad config");
        assert_eq!(err.to_string(), "DOCSCHEMA_CLI_CONFIG_ERROR: bad config");
        assert_eq!(err.message(), "bad config");
    }
}
