//! Stateful validation bound to one schema
//!
//! A context keeps the errors of the last pass so a form or record can ask
//! about single keys. Keys whose error status changed are collected and can
//! be drained with `take_changed_keys`.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::mongo_object::make_generic;
use crate::schema::{SchemaResult, SimpleSchema};

use super::{ErrorKind, InvalidFieldError, ValidateOptions};

/// An error together with its rendered message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidKey {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub message: String,
}

/// Validation state for one schema.
#[derive(Debug)]
pub struct ValidationContext {
    schema: Arc<SimpleSchema>,
    invalid_keys: Vec<InvalidFieldError>,
    changed_keys: BTreeSet<String>,
}

impl ValidationContext {
    pub fn new(schema: Arc<SimpleSchema>) -> Self {
        Self {
            schema,
            invalid_keys: Vec::new(),
            changed_keys: BTreeSet::new(),
        }
    }

    pub fn schema(&self) -> &Arc<SimpleSchema> {
        &self.schema
    }

    /// Validates the whole input, replacing every stored error. Returns
    /// whether the input is valid.
    pub fn validate(&mut self, obj: &Value, options: &ValidateOptions) -> SchemaResult<bool> {
        let errors = self.schema.validate(obj, options, None)?;
        let previous = std::mem::replace(&mut self.invalid_keys, errors);

        for error in previous.iter().chain(&self.invalid_keys) {
            self.changed_keys.insert(error.name.clone());
        }
        Ok(self.invalid_keys.is_empty())
    }

    /// Validates one key only, replacing just that key's stored errors.
    /// A generic key (`tags.$`) covers every stored error of its elements.
    /// Returns whether the key is valid.
    pub fn validate_one(&mut self, obj: &Value, key: &str, options: &ValidateOptions) -> SchemaResult<bool> {
        let errors = self.schema.validate(obj, options, Some(key))?;

        let changed = &mut self.changed_keys;
        self.invalid_keys.retain(|e| {
            let covered = e.name == key || make_generic(&e.name) == key;
            if covered {
                changed.insert(e.name.clone());
            }
            !covered
        });
        self.changed_keys.insert(key.to_string());
        let valid = errors.is_empty();
        for error in errors {
            self.changed_keys.insert(error.name.clone());
            self.invalid_keys.push(error);
        }
        Ok(valid)
    }

    /// Clears all errors.
    pub fn reset_validation(&mut self) {
        for error in self.invalid_keys.drain(..) {
            self.changed_keys.insert(error.name);
        }
    }

    /// Adds errors found elsewhere. An error replaces the stored one for the
    /// same key.
    pub fn add_invalid_keys<I>(&mut self, errors: I)
    where
        I: IntoIterator<Item = InvalidFieldError>,
    {
        for error in errors {
            self.invalid_keys.retain(|e| e.name != error.name);
            self.changed_keys.insert(error.name.clone());
            self.invalid_keys.push(error);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_keys.is_empty()
    }

    pub fn errors(&self) -> &[InvalidFieldError] {
        &self.invalid_keys
    }

    /// Stored errors with their messages.
    pub fn invalid_keys(&self) -> Vec<InvalidKey> {
        self.invalid_keys
            .iter()
            .map(|e| InvalidKey {
                name: e.name.clone(),
                kind: e.kind.clone(),
                value: e.value.clone(),
                message: self.message(e),
            })
            .collect()
    }

    /// Whether an error is stored for the key or for its generic form.
    pub fn key_is_invalid(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Message of the error stored for the key, if any.
    pub fn key_error_message(&self, key: &str) -> Option<String> {
        self.find(key).map(|e| self.message(e))
    }

    /// Drains the keys whose error status changed since the last call.
    pub fn take_changed_keys(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changed_keys).into_iter().collect()
    }

    fn find(&self, key: &str) -> Option<&InvalidFieldError> {
        let generic = make_generic(key);
        self.invalid_keys
            .iter()
            .find(|e| e.name == key || e.name == generic)
    }

    fn message(&self, error: &InvalidFieldError) -> String {
        self.schema
            .message_for_error(&error.kind, &error.name, error.value.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType};
    use serde_json::json;

    fn context() -> ValidationContext {
        let schema = SimpleSchema::from_definitions(vec![
            ("name".into(), FieldDefinition::of(FieldType::String).max(5.0)),
            ("age".into(), FieldDefinition::of(FieldType::Number).optional()),
        ])
        .unwrap();
        Arc::new(schema).new_context()
    }

    #[test]
    fn test_validate_replaces_errors() {
        let mut ctx = context();
        let options = ValidateOptions::default();

        assert!(!ctx.validate(&json!({ "age": "x" }), &options).unwrap());
        assert!(ctx.key_is_invalid("name"));
        assert!(ctx.key_is_invalid("age"));
        assert_eq!(ctx.take_changed_keys(), vec!["age", "name"]);

        assert!(ctx.validate(&json!({ "name": "Ann" }), &options).unwrap());
        assert!(ctx.is_valid());
        assert_eq!(ctx.take_changed_keys(), vec!["age", "name"]);
        assert!(ctx.take_changed_keys().is_empty());
    }

    #[test]
    fn test_validate_one_splices() {
        let mut ctx = context();
        let options = ValidateOptions::default();
        ctx.validate(&json!({ "age": "x" }), &options).unwrap();

        assert!(ctx.validate_one(&json!({ "age": 3 }), "age", &options).unwrap());
        assert!(!ctx.key_is_invalid("age"));
        assert!(ctx.key_is_invalid("name"));
        assert_eq!(ctx.errors().len(), 1);
    }

    #[test]
    fn test_validate_one_generic_key_clears_elements() {
        let schema = SimpleSchema::from_definitions(vec![
            ("name".into(), FieldDefinition::of(FieldType::String)),
            ("tags".into(), FieldDefinition::of(FieldType::array_of(FieldType::String))),
        ])
        .unwrap();
        let mut ctx = Arc::new(schema).new_context();
        let options = ValidateOptions::default();

        assert!(!ctx.validate(&json!({ "name": "x", "tags": ["a", 1] }), &options).unwrap());
        assert!(ctx.key_is_invalid("tags.1"));
        ctx.take_changed_keys();

        assert!(ctx.validate_one(&json!({ "name": "x", "tags": ["a", "b"] }), "tags.$", &options).unwrap());
        assert!(ctx.is_valid());
        assert_eq!(ctx.take_changed_keys(), vec!["tags.$", "tags.1"]);
    }

    #[test]
    fn test_validate_one_concrete_key_keeps_siblings() {
        let schema = SimpleSchema::from_definitions(vec![
            ("name".into(), FieldDefinition::of(FieldType::String)),
            ("tags".into(), FieldDefinition::of(FieldType::array_of(FieldType::String))),
        ])
        .unwrap();
        let mut ctx = Arc::new(schema).new_context();
        let options = ValidateOptions::default();
        ctx.add_invalid_keys(vec![
            InvalidFieldError::new("tags.0", ErrorKind::ExpectedString, Some(json!(1))),
            InvalidFieldError::new("tags.1", ErrorKind::ExpectedString, Some(json!(2))),
        ]);

        assert!(ctx.validate_one(&json!({ "name": "x", "tags": ["a", 2] }), "tags.0", &options).unwrap());
        assert!(!ctx.key_is_invalid("tags.0"));
        assert!(ctx.key_is_invalid("tags.1"));
    }

    #[test]
    fn test_messages() {
        let mut ctx = context();
        ctx.validate(&json!({ "name": "Alexander" }), &ValidateOptions::default())
            .unwrap();
        assert_eq!(
            ctx.key_error_message("name").as_deref(),
            Some("Name cannot exceed 5 characters")
        );
        assert_eq!(ctx.key_error_message("age"), None);

        let keys = ctx.invalid_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].kind, ErrorKind::MaxString);
        assert_eq!(keys[0].value, Some(json!("Alexander")));
    }

    #[test]
    fn test_add_and_reset() {
        let mut ctx = context();
        ctx.add_invalid_keys(vec![InvalidFieldError::new(
            "name",
            ErrorKind::Custom("taken".into()),
            Some(json!("Ann")),
        )]);
        assert!(ctx.key_is_invalid("name"));
        assert_eq!(ctx.key_error_message("name").as_deref(), Some("Unknown validation error"));

        ctx.reset_validation();
        assert!(ctx.is_valid());
        assert_eq!(ctx.take_changed_keys(), vec!["name"]);
    }
}
