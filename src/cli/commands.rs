//! CLI command implementations
//!
//! Each command reads one JSON value from stdin and writes one JSON response
//! to stdout. Schemas are loaded by name from the configured directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::clean::CleanOptions;
use crate::mongo_object::MongoObject;
use crate::schema::SchemaLoader;
use crate::validation::{ValidateOptions, ValidationContext};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding `<name>.json` schema files (default `./schemas`)
    #[serde(default = "default_schema_dir")]
    pub schema_dir: String,

    /// Default cleaning switches; command flags can only turn them off
    #[serde(default)]
    pub clean: CleanDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanDefaults {
    pub filter: bool,
    pub auto_convert: bool,
    pub remove_empty_strings: bool,
    pub get_auto_values: bool,
}

impl Default for CleanDefaults {
    fn default() -> Self {
        Self {
            filter: true,
            auto_convert: true,
            remove_empty_strings: true,
            get_auto_values: true,
        }
    }
}

fn default_schema_dir() -> String {
    "./schemas".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_dir: default_schema_dir(),
            clean: CleanDefaults::default(),
        }
    }
}

impl Config {
    /// Load configuration from file. A missing file means defaults.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.schema_dir.trim().is_empty() {
            return Err(CliError::config_error("schema_dir must not be empty"));
        }
        Ok(())
    }

    /// Get schema directory as Path
    pub fn schema_path(&self) -> PathBuf {
        PathBuf::from(&self.schema_dir)
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let input = read_request()?;
    let output = execute(&config, cmd, input)?;
    write_response(output)
}

/// Runs a command against an already read input value.
pub fn execute(config: &Config, cmd: Command, input: Value) -> CliResult<Value> {
    match cmd {
        Command::Clean {
            schema,
            modifier,
            upsert,
            no_filter,
            no_auto_convert,
            keep_empty_strings,
            no_auto_values,
        } => {
            let options = CleanOptions {
                filter: config.clean.filter && !no_filter,
                auto_convert: config.clean.auto_convert && !no_auto_convert,
                remove_empty_strings: config.clean.remove_empty_strings && !keep_empty_strings,
                get_auto_values: config.clean.get_auto_values && !no_auto_values,
                is_modifier: modifier || upsert,
                is_upsert: upsert,
                ..CleanOptions::default()
            };
            clean(config, &schema, input, &options)
        }
        Command::Validate {
            schema,
            modifier,
            upsert,
            key,
        } => {
            let options = ValidateOptions {
                is_modifier: modifier || upsert,
                is_upsert: upsert,
                ..ValidateOptions::default()
            };
            validate(config, &schema, &input, &options, key.as_deref())
        }
        Command::Flatten { keep_arrays } => Ok(flatten(input, keep_arrays)),
    }
}

/// Cleans the input and returns it.
pub fn clean(config: &Config, schema_name: &str, mut input: Value, options: &CleanOptions) -> CliResult<Value> {
    let mut loader = SchemaLoader::new(&config.schema_path());
    let schema = loader.load(schema_name)?;
    schema.clean(&mut input, options);
    Ok(input)
}

/// Validates the input and returns `{valid, errors}` with rendered messages.
pub fn validate(
    config: &Config,
    schema_name: &str,
    input: &Value,
    options: &ValidateOptions,
    key: Option<&str>,
) -> CliResult<Value> {
    let mut loader = SchemaLoader::new(&config.schema_path());
    let schema = loader.load(schema_name)?;
    let mut context = ValidationContext::new(schema);

    let valid = match key {
        Some(key) => context.validate_one(input, key, options)?,
        None => context.validate(input, options)?,
    };
    Ok(json!({
        "valid": valid,
        "errors": serde_json::to_value(context.invalid_keys())?,
    }))
}

/// Flattens the input into `key -> value` form.
pub fn flatten(input: Value, keep_arrays: bool) -> Value {
    let flat = MongoObject::from_value(input).get_flat_object(keep_arrays);
    Value::Object(flat)
}
