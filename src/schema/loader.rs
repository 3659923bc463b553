//! Schema loader for JSON schema files
//!
//! - Schemas stored at `<schema_dir>/<name>.json`
//! - A file is an object mapping field paths to field specs, in order
//! - `{"schema": "<name>"}` types refer to other files in the same directory
//! - Loaded schemas are compiled once and shared

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::regex_presets;
use crate::registry::Registry;
use crate::value::as_date;

use super::errors::{SchemaError, SchemaResult};
use super::types::{Bound, FieldDefinition, FieldType, Limit, RegExSpec, SchemaSource};
use super::SimpleSchema;

/// One field as written in a schema file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct FieldSpec {
    #[serde(rename = "type")]
    field_type: Option<TypeSpec>,
    label: Option<String>,
    optional: Option<bool>,
    min: Option<Value>,
    max: Option<Value>,
    min_count: Option<usize>,
    max_count: Option<usize>,
    allowed_values: Option<Vec<Value>>,
    decimal: Option<bool>,
    #[serde(rename = "regEx")]
    regex: Option<RegExField>,
    blackbox: Option<bool>,
    default_value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TypeSpec {
    Name(String),
    List(Vec<TypeSpec>),
    Custom { custom: String },
    Schema { schema: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PatternSpec {
    Pattern(String),
    Preset { preset: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RegExField {
    One(PatternSpec),
    Many(Vec<PatternSpec>),
}

/// Loads schema files from a directory and keeps the compiled schemas by name.
pub struct SchemaLoader {
    /// Directory containing schema files
    schema_dir: PathBuf,
    /// Registry every loaded schema is compiled against
    registry: Arc<Registry>,
    /// Compiled schemas by name
    schemas: HashMap<String, Arc<SimpleSchema>>,
}

impl SchemaLoader {
    /// Creates a loader for `<schema_dir>/<name>.json` files.
    pub fn new(schema_dir: &Path) -> Self {
        Self::with_registry(schema_dir, Arc::new(Registry::default()))
    }

    pub fn with_registry(schema_dir: &Path, registry: Arc<Registry>) -> Self {
        Self {
            schema_dir: schema_dir.to_path_buf(),
            registry,
            schemas: HashMap::new(),
        }
    }

    /// Returns the schema directory path.
    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Loads every `.json` file in the schema directory.
    ///
    /// A missing directory holds no schemas.
    pub fn load_all(&mut self) -> SchemaResult<()> {
        if !self.schema_dir.exists() {
            return Ok(());
        }

        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            SchemaError::malformed_schema(
                self.schema_dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed_schema(
                    self.schema_dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();

            // Skip non-JSON files
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();

        for name in names {
            self.load(&name)?;
        }
        debug!(count = self.schemas.len(), dir = %self.schema_dir.display(), "loaded schemas");
        Ok(())
    }

    /// Returns the named schema, loading it from disk on first use.
    pub fn load(&mut self, name: &str) -> SchemaResult<Arc<SimpleSchema>> {
        let mut loading = Vec::new();
        self.load_inner(name, &mut loading)
    }

    fn load_inner(&mut self, name: &str, loading: &mut Vec<String>) -> SchemaResult<Arc<SimpleSchema>> {
        if let Some(schema) = self.schemas.get(name) {
            return Ok(Arc::clone(schema));
        }
        let Some(path) = self.path_for(name) else {
            return Err(SchemaError::UnknownSchema(name.to_string()));
        };
        if loading.iter().any(|n| n == name) {
            return Err(SchemaError::malformed_schema(
                path.display().to_string(),
                format!("circular schema reference: {} -> {}", loading.join(" -> "), name),
            ));
        }

        if !path.exists() {
            return Err(SchemaError::UnknownSchema(name.to_string()));
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            SchemaError::malformed_schema(
                path.display().to_string(),
                format!("Failed to read file: {}", e),
            )
        })?;
        let doc: Map<String, Value> = serde_json::from_str(&content).map_err(|e| {
            SchemaError::malformed_schema(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;

        loading.push(name.to_string());
        let defs = self.parse_definitions(&doc, &path, loading);
        loading.pop();
        let defs = defs?;

        let schema = SimpleSchema::with_registry(
            vec![SchemaSource::Definitions(defs)],
            Arc::clone(&self.registry),
        )?;
        let schema = Arc::new(schema);
        self.schemas.insert(name.to_string(), Arc::clone(&schema));
        debug!(schema = name, keys = schema.keys().len(), "loaded schema file");
        Ok(schema)
    }

    /// File of a schema name. Names that could leave `schema_dir` have none.
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(|c: char| c == '/' || c == '\\')
            && Path::new(name).components().count() == 1;
        plain.then(|| self.schema_dir.join(format!("{}.json", name)))
    }

    fn parse_definitions(
        &mut self,
        doc: &Map<String, Value>,
        path: &Path,
        loading: &mut Vec<String>,
    ) -> SchemaResult<Vec<(String, FieldDefinition)>> {
        let mut defs = Vec::with_capacity(doc.len());
        for (key, raw) in doc {
            let spec: FieldSpec = serde_json::from_value(raw.clone()).map_err(|e| {
                SchemaError::malformed_schema(
                    path.display().to_string(),
                    format!("field '{}': {}", key, e),
                )
            })?;
            let def = self.field_definition(key, spec, loading)?;
            defs.push((key.clone(), def));
        }
        Ok(defs)
    }

    fn field_definition(
        &mut self,
        key: &str,
        spec: FieldSpec,
        loading: &mut Vec<String>,
    ) -> SchemaResult<FieldDefinition> {
        let field_type = match spec.field_type {
            Some(t) => Some(self.field_type(key, t, loading)?),
            None => None,
        };

        Ok(FieldDefinition {
            field_type,
            label: spec.label.map(Bound::Static),
            optional: spec.optional.map(Bound::Static),
            min: spec.min.map(|v| parse_limit(key, "min", &v)).transpose()?.map(Bound::Static),
            max: spec.max.map(|v| parse_limit(key, "max", &v)).transpose()?.map(Bound::Static),
            min_count: spec.min_count.map(Bound::Static),
            max_count: spec.max_count.map(Bound::Static),
            allowed_values: spec.allowed_values.map(Bound::Static),
            decimal: spec.decimal,
            regex: spec.regex.map(|r| parse_regex(key, r)).transpose()?,
            blackbox: spec.blackbox,
            custom: None,
            auto_value: None,
            default_value: spec.default_value,
        })
    }

    fn field_type(&mut self, key: &str, spec: TypeSpec, loading: &mut Vec<String>) -> SchemaResult<FieldType> {
        match spec {
            TypeSpec::Name(name) => parse_type_name(key, &name),
            TypeSpec::Custom { custom } => Ok(FieldType::Custom(custom)),
            TypeSpec::Schema { schema } => Ok(FieldType::Schema(self.load_inner(&schema, loading)?)),
            TypeSpec::List(mut items) => {
                if items.len() != 1 {
                    return Err(SchemaError::UnknownType {
                        key: key.to_string(),
                        name: "array types take exactly one element type".to_string(),
                    });
                }
                let inner = self.field_type(key, items.remove(0), loading)?;
                Ok(FieldType::array_of(inner))
            }
        }
    }

    /// Registers a compiled schema under a name.
    pub fn register(&mut self, name: &str, schema: SimpleSchema) -> SchemaResult<Arc<SimpleSchema>> {
        if self.schemas.contains_key(name) {
            return Err(SchemaError::SchemaImmutable(name.to_string()));
        }
        let schema = Arc::new(schema);
        self.schemas.insert(name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Gets an already loaded schema.
    pub fn get(&self, name: &str) -> Option<&Arc<SimpleSchema>> {
        self.schemas.get(name)
    }

    /// Checks if a schema is loaded.
    pub fn exists(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Returns the number of loaded schemas.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Names of loaded schemas, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn parse_type_name(key: &str, name: &str) -> SchemaResult<FieldType> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "string" => FieldType::String,
        "number" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "object" => FieldType::Object,
        "array" => FieldType::Array,
        "date" => FieldType::Date,
        "any" => FieldType::Any,
        _ => {
            return Err(SchemaError::UnknownType {
                key: key.to_string(),
                name: name.to_string(),
            })
        }
    })
}

fn parse_limit(key: &str, name: &str, value: &Value) -> SchemaResult<Limit> {
    if let Some(n) = value.as_f64() {
        return Ok(Limit::Number(n));
    }
    if let Some(d) = as_date(value) {
        return Ok(Limit::Date(d));
    }
    Err(SchemaError::invalid_bound(
        key,
        format!("{} must be a number or a {{\"$date\": ..}} value", name),
    ))
}

fn parse_regex(key: &str, field: RegExField) -> SchemaResult<RegExSpec> {
    Ok(match field {
        RegExField::One(p) => RegExSpec::One(compile_pattern(key, p)?),
        RegExField::Many(list) => RegExSpec::Many(
            list.into_iter()
                .map(|p| compile_pattern(key, p))
                .collect::<SchemaResult<Vec<_>>>()?,
        ),
    })
}

fn compile_pattern(key: &str, spec: PatternSpec) -> SchemaResult<Regex> {
    let pattern = match spec {
        PatternSpec::Pattern(p) => p,
        PatternSpec::Preset { preset } => regex_presets::preset(&preset)
            .ok_or_else(|| SchemaError::InvalidRegex {
                key: key.to_string(),
                pattern: preset.clone(),
                reason: "unknown preset".to_string(),
            })?
            .to_string(),
    };
    Regex::new(&pattern).map_err(|e| SchemaError::InvalidRegex {
        key: key.to_string(),
        pattern: pattern.clone(),
        reason: e.to_string(),
    })
}
