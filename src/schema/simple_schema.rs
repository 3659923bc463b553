//! Compiled schema
//!
//! Built once from an ordered set of sources, immutable afterwards except for
//! labels, schema-level validators and messages.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clean::{self, AutoValueContext, CleanOptions};
use crate::messages::{self, MessageBook, UNKNOWN_ERROR};
use crate::mongo_object::{make_generic, parent_prefix, WILDCARD};
use crate::registry::Registry;
use crate::validation::{self, CustomContext, ErrorKind, InvalidFieldError, ValidateOptions, ValidationContext};

use super::compiler::{compile, DefinitionMap};
use super::errors::SchemaResult;
use super::inflect::default_label;
use super::types::{
    AutoValueFn, Bound, CustomFn, FieldDefinition, FieldType, OptionContext, ResolvedDefinition,
    SchemaSource,
};

/// Child keys of one object-typed field, by parent prefix (`"a."`, or `""`
/// for the root).
#[derive(Debug, Clone, Default)]
struct ObjectKeys {
    keys: Vec<String>,
    required: Vec<String>,
    custom: Vec<String>,
}

/// A compiled schema.
#[derive(Clone)]
pub struct SimpleSchema {
    definitions: DefinitionMap,
    first_level_keys: Vec<String>,
    required_keys: Vec<String>,
    first_level_required_keys: Vec<String>,
    custom_keys: Vec<String>,
    black_box_keys: Vec<String>,
    auto_values: Vec<(String, AutoValueFn)>,
    object_keys: HashMap<String, ObjectKeys>,
    validators: Vec<CustomFn>,
    messages: MessageBook,
    registry: Arc<Registry>,
}

impl SimpleSchema {
    /// Compiles the sources against a default registry.
    pub fn new<I>(sources: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = SchemaSource>,
    {
        Self::with_registry(sources, Arc::new(Registry::default()))
    }

    /// Compiles the sources against a shared registry.
    pub fn with_registry<I>(sources: I, registry: Arc<Registry>) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = SchemaSource>,
    {
        let definitions = compile(sources)?;
        let schema = Self::from_compiled(definitions, registry);
        debug!(
            keys = schema.definitions.len(),
            required = schema.required_keys.len(),
            auto_values = schema.auto_values.len(),
            "compiled schema"
        );
        Ok(schema)
    }

    /// Compiles a single definition list.
    pub fn from_definitions(defs: Vec<(String, FieldDefinition)>) -> SchemaResult<Self> {
        Self::new(vec![SchemaSource::Definitions(defs)])
    }

    fn from_compiled(definitions: DefinitionMap, registry: Arc<Registry>) -> Self {
        let mut schema = SimpleSchema {
            definitions,
            first_level_keys: Vec::new(),
            required_keys: Vec::new(),
            first_level_required_keys: Vec::new(),
            custom_keys: Vec::new(),
            black_box_keys: Vec::new(),
            auto_values: Vec::new(),
            object_keys: HashMap::new(),
            validators: Vec::new(),
            messages: MessageBook::new(),
            registry,
        };

        for (key, def) in schema.definitions.iter() {
            let first_level = !key.contains('.');
            let required = !def.is_statically_optional();

            if first_level {
                schema.first_level_keys.push(key.clone());
            }
            if required {
                schema.required_keys.push(key.clone());
                if first_level {
                    schema.first_level_required_keys.push(key.clone());
                }
            }
            if def.custom.is_some() {
                schema.custom_keys.push(key.clone());
            }
            if def.is_blackbox() {
                schema.black_box_keys.push(key.clone());
            }

            match (&def.auto_value, &def.default_value) {
                (Some(auto_value), default) => {
                    if default.is_some() {
                        warn!(key = %key, "both autoValue and defaultValue set; defaultValue ignored");
                    }
                    schema.auto_values.push((key.clone(), auto_value.clone()));
                }
                (None, Some(default)) => {
                    schema
                        .auto_values
                        .push((key.clone(), default_value_auto_value(default.clone())));
                }
                (None, None) => {}
            }

            let prefix = parent_prefix(key);
            let child = &key[prefix.len()..];
            if child != WILDCARD {
                let entry = schema.object_keys.entry(prefix.to_string()).or_default();
                entry.keys.push(child.to_string());
                if required {
                    entry.required.push(child.to_string());
                }
                if def.custom.is_some() {
                    entry.custom.push(child.to_string());
                }
            }
        }

        schema
    }

    pub(crate) fn definitions(&self) -> &DefinitionMap {
        &self.definitions
    }

    /// All generic keys in declaration order.
    pub fn keys(&self) -> &[String] {
        self.definitions.keys()
    }

    pub fn first_level_keys(&self) -> &[String] {
        &self.first_level_keys
    }

    /// Keys not statically optional.
    pub fn required_keys(&self) -> &[String] {
        &self.required_keys
    }

    pub fn first_level_required_keys(&self) -> &[String] {
        &self.first_level_required_keys
    }

    pub fn custom_keys(&self) -> &[String] {
        &self.custom_keys
    }

    pub fn black_box_keys(&self) -> &[String] {
        &self.black_box_keys
    }

    /// Auto-value functions by generic key, defaults included.
    pub fn auto_values(&self) -> &[(String, AutoValueFn)] {
        &self.auto_values
    }

    /// Immediate child names under a prefix (`"address."`, `""` for the root).
    pub fn object_keys(&self, prefix: &str) -> &[String] {
        self.object_keys
            .get(prefix)
            .map_or(&[][..], |k| k.keys.as_slice())
    }

    pub fn required_object_keys(&self, prefix: &str) -> &[String] {
        self.object_keys
            .get(prefix)
            .map_or(&[][..], |k| k.required.as_slice())
    }

    pub fn custom_object_keys(&self, prefix: &str) -> &[String] {
        self.object_keys
            .get(prefix)
            .map_or(&[][..], |k| k.custom.as_slice())
    }

    /// Raw definition for a key, concrete or generic.
    pub fn schema(&self, key: &str) -> Option<&FieldDefinition> {
        self.definitions.get(&make_generic(key))
    }

    /// Whether a generic key may appear in a document: it is defined, or it
    /// lies beneath a black-box object. The array-item companion of a
    /// black-box key (`meta.$`) is never allowed.
    pub fn allows_key(&self, key: &str) -> bool {
        self.definitions.keys().iter().any(|schema_key| {
            if schema_key == key {
                return true;
            }
            let black_box = self
                .definitions
                .get(schema_key)
                .map_or(false, FieldDefinition::is_blackbox);
            if !black_box {
                return false;
            }
            if key.starts_with(&format!("{}.{}", schema_key, WILDCARD)) {
                return false;
            }
            key.starts_with(&format!("{}.", schema_key))
        })
    }

    /// Whether the nearest defined ancestor of the key is a black box.
    pub fn key_is_in_black_box(&self, key: &str) -> bool {
        let mut path = make_generic(key);
        while let Some(idx) = path.rfind('.') {
            path.truncate(idx);
            if let Some(def) = self.definitions.get(&path) {
                return def.is_blackbox();
            }
        }
        false
    }

    /// Resolves the definition for a concrete key, evaluating computed
    /// options in `ctx` (or a context naming just the key).
    pub fn get_definition(&self, key: &str, ctx: Option<&OptionContext>) -> Option<ResolvedDefinition> {
        let generic = make_generic(key);
        let def = self.definitions.get(&generic)?;
        let owned;
        let ctx = match ctx {
            Some(ctx) => ctx,
            None => {
                owned = OptionContext::for_key(key);
                &owned
            }
        };

        Some(ResolvedDefinition {
            field_type: def.field_type.clone().unwrap_or(FieldType::Any),
            label: def
                .label
                .as_ref()
                .map(|l| l.resolve(ctx))
                .unwrap_or_else(|| default_label(&generic)),
            optional: def.optional.as_ref().map_or(false, |o| o.resolve(ctx)),
            min: def.min.as_ref().map(|b| b.resolve(ctx)),
            max: def.max.as_ref().map(|b| b.resolve(ctx)),
            min_count: def.min_count.as_ref().map(|b| b.resolve(ctx)),
            max_count: def.max_count.as_ref().map(|b| b.resolve(ctx)),
            allowed_values: def.allowed_values.as_ref().map(|b| b.resolve(ctx)),
            decimal: def.decimal == Some(true),
            regex: def.regex.clone(),
            blackbox: def.is_blackbox(),
            custom: def.custom.clone(),
        })
    }

    /// Label for a key, defined or derived from its name.
    pub fn label(&self, key: &str) -> String {
        match self.get_definition(key, None) {
            Some(def) => def.label,
            None => default_label(&make_generic(key)),
        }
    }

    /// Overrides labels. Keys without a definition are ignored.
    pub fn set_labels<I, K, L>(&mut self, labels: I)
    where
        I: IntoIterator<Item = (K, L)>,
        K: AsRef<str>,
        L: Into<String>,
    {
        for (key, label) in labels {
            if let Some(def) = self.definitions.get_mut(key.as_ref()) {
                def.label = Some(Bound::Static(label.into()));
            }
        }
    }

    /// Adds a schema-level validator, run for every field after the field's
    /// own validator.
    pub fn add_validator<F>(&mut self, f: F)
    where
        F: Fn(&CustomContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
    }

    pub fn validators(&self) -> &[CustomFn] {
        &self.validators
    }

    /// Adds or replaces schema-level message templates.
    pub fn set_messages(&mut self, messages: MessageBook) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &MessageBook {
        &self.messages
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Renders the message for an error on `key`.
    pub fn message_for_error(&self, kind: &ErrorKind, key: &str, value: Option<&Value>) -> String {
        let books = [&self.messages, self.registry.messages()];
        let Some(template) = messages::find_template(&books, kind, key) else {
            return UNKNOWN_ERROR.to_string();
        };
        let def = self.get_definition(key, None);
        let label = match &def {
            Some(d) => d.label.clone(),
            None => default_label(&make_generic(key)),
        };
        messages::render(template, kind, &label, def.as_ref(), value)
    }

    /// Validates a document or modifier. `target_key` restricts the errors
    /// to one key.
    pub fn validate(
        &self,
        obj: &Value,
        options: &ValidateOptions,
        target_key: Option<&str>,
    ) -> SchemaResult<Vec<InvalidFieldError>> {
        validation::validate(self, obj, options, target_key)
    }

    /// Validates a single key of a document or modifier.
    pub fn validate_one(
        &self,
        obj: &Value,
        key: &str,
        options: &ValidateOptions,
    ) -> SchemaResult<Vec<InvalidFieldError>> {
        self.validate(obj, options, Some(key))
    }

    /// Cleans a document or modifier in place.
    pub fn clean(&self, doc: &mut Value, options: &CleanOptions) {
        clean::clean(self, doc, options)
    }

    /// A validation context bound to this schema.
    pub fn new_context(self: &Arc<Self>) -> ValidationContext {
        ValidationContext::new(Arc::clone(self))
    }
}

/// Wraps a default value as an auto-value: filled in on insert, and on
/// upsert via `$setOnInsert`; never on a plain update.
fn default_value_auto_value(default: Value) -> AutoValueFn {
    Arc::new(move |ctx: &AutoValueContext<'_>| {
        if ctx.is_set {
            return None;
        }
        match ctx.operator {
            None if !ctx.is_modifier => Some(default.clone()),
            Some("$pull") => None,
            Some("$push") => Some(default.clone()),
            _ if ctx.is_upsert => Some(json!({ "$setOnInsert": default.clone() })),
            _ => None,
        }
    })
}

impl fmt::Debug for SimpleSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleSchema")
            .field("keys", &self.definitions.keys())
            .field("validators", &self.validators.len())
            .field("registry", &self.registry)
            .finish()
    }
}
