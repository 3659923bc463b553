//! Validation Invariant Tests
//!
//! - A missing required field reports exactly one `required` error
//! - An unknown field reports `keyNotInSchema` exactly once
//! - Number checks run type, then max, then min, then decimal
//! - Black-box subtrees are allowed and never validated
//! - Validation is deterministic

use docschema::schema::{FieldDefinition, FieldType, SchemaLoader, SimpleSchema};
use docschema::{ErrorKind, InvalidFieldError, ValidateOptions};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn name_tags_schema() -> SimpleSchema {
    SimpleSchema::from_definitions(vec![
        ("name".into(), FieldDefinition::of(FieldType::String)),
        (
            "tags".into(),
            FieldDefinition::of(FieldType::array_of(FieldType::String)).optional(),
        ),
    ])
    .unwrap()
}

fn number_schema(decimal: bool) -> SimpleSchema {
    let mut def = FieldDefinition::of(FieldType::Number).min(1.0).max(10.0);
    if decimal {
        def = def.decimal();
    }
    SimpleSchema::from_definitions(vec![("n".into(), def)]).unwrap()
}

fn errors(schema: &SimpleSchema, obj: Value, options: &ValidateOptions) -> Vec<InvalidFieldError> {
    schema.validate(&obj, options, None).unwrap()
}

fn kind_of(schema: &SimpleSchema, obj: Value) -> Option<ErrorKind> {
    let found = errors(schema, obj, &ValidateOptions::default());
    assert!(found.len() <= 1, "{:?}", found);
    found.into_iter().next().map(|e| e.kind)
}

// =============================================================================
// Name / Tags Scenario
// =============================================================================

#[test]
fn test_empty_document_requires_name() {
    let found = errors(&name_tags_schema(), json!({}), &ValidateOptions::default());
    assert_eq!(found, vec![InvalidFieldError::new("name", ErrorKind::Required, None)]);
}

#[test]
fn test_valid_document_has_no_errors() {
    let found = errors(
        &name_tags_schema(),
        json!({ "name": "x", "tags": ["a", "b"] }),
        &ValidateOptions::default(),
    );
    assert!(found.is_empty(), "{:?}", found);
}

#[test]
fn test_set_with_wrong_element_types_reports_one_error() {
    let found = errors(
        &name_tags_schema(),
        json!({ "$set": { "name": "x", "tags": [1, 2] } }),
        &ValidateOptions::modifier(),
    );
    assert_eq!(found.len(), 1, "{:?}", found);
    assert_eq!(found[0].name, "tags.0");
    assert_eq!(found[0].kind, ErrorKind::ExpectedString);
    assert_eq!(found[0].value, Some(json!(1)));
}

// =============================================================================
// Required / Unknown Key Tests
// =============================================================================

#[test]
fn test_missing_required_field_has_single_required_error() {
    let schema = SimpleSchema::from_definitions(vec![(
        "email".into(),
        FieldDefinition::of(FieldType::String).min(5.0).max(50.0),
    )])
    .unwrap();

    for doc in [json!({}), json!({ "email": null }), json!({ "email": "" })] {
        let found = errors(&schema, doc, &ValidateOptions::default());
        assert_eq!(found.len(), 1, "{:?}", found);
        assert_eq!(found[0].kind, ErrorKind::Required);
    }
}

#[test]
fn test_unknown_key_reported_once() {
    let found = errors(
        &name_tags_schema(),
        json!({ "name": "x", "color": "red" }),
        &ValidateOptions::default(),
    );
    assert_eq!(
        found,
        vec![InvalidFieldError::new("color", ErrorKind::KeyNotInSchema, Some(json!("red")))]
    );
}

#[test]
fn test_unknown_nested_keys_reported_per_field() {
    let found = errors(
        &name_tags_schema(),
        json!({ "name": "x", "extra": { "a": 1, "b": [1, 2] } }),
        &ValidateOptions::default(),
    );
    let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["extra", "extra.a", "extra.b", "extra.b.0"]);
    assert!(found.iter().all(|e| e.kind == ErrorKind::KeyNotInSchema));
}

// =============================================================================
// Check Precedence Tests
// =============================================================================

#[test]
fn test_number_check_precedence() {
    let schema = number_schema(false);
    assert_eq!(kind_of(&schema, json!({ "n": "5" })), Some(ErrorKind::ExpectedNumber));
    assert_eq!(kind_of(&schema, json!({ "n": 11 })), Some(ErrorKind::MaxNumber));
    assert_eq!(kind_of(&schema, json!({ "n": 0 })), Some(ErrorKind::MinNumber));
    assert_eq!(kind_of(&schema, json!({ "n": 5.5 })), Some(ErrorKind::NoDecimal));
    assert_eq!(kind_of(&schema, json!({ "n": 10.5 })), Some(ErrorKind::MaxNumber));
    assert_eq!(kind_of(&schema, json!({ "n": 0.5 })), Some(ErrorKind::MinNumber));
    assert_eq!(kind_of(&schema, json!({ "n": 5 })), None);

    assert_eq!(kind_of(&number_schema(true), json!({ "n": 5.5 })), None);
}

#[test]
fn test_allowed_values() {
    let schema = SimpleSchema::from_definitions(vec![(
        "status".into(),
        FieldDefinition::of(FieldType::String).allowed_values(vec![json!("draft"), json!("live")]),
    )])
    .unwrap();
    assert_eq!(kind_of(&schema, json!({ "status": "live" })), None);
    assert_eq!(kind_of(&schema, json!({ "status": "gone" })), Some(ErrorKind::NotAllowed));
}

#[test]
fn test_array_item_inherits_allowed_values() {
    let schema = SimpleSchema::from_definitions(vec![(
        "sizes".into(),
        FieldDefinition::of(FieldType::array_of(FieldType::String))
            .allowed_values(vec![json!("S"), json!("M")])
            .min_count(1),
    )])
    .unwrap();

    let found = errors(&schema, json!({ "sizes": ["S", "XL"] }), &ValidateOptions::default());
    assert_eq!(found, vec![InvalidFieldError::new("sizes.1", ErrorKind::NotAllowed, Some(json!("XL")))]);

    assert_eq!(kind_of(&schema, json!({ "sizes": [] })), Some(ErrorKind::MinCount));
}

// =============================================================================
// Black Box Tests
// =============================================================================

#[test]
fn test_black_box_subtree_allowed_and_unchecked() {
    let schema = SimpleSchema::from_definitions(vec![(
        "settings".into(),
        FieldDefinition::of(FieldType::Object).blackbox(),
    )])
    .unwrap();

    assert!(schema.allows_key("settings"));
    assert!(schema.allows_key("settings.theme"));
    assert!(schema.allows_key("settings.a.b.c.d"));
    assert!(!schema.allows_key("settings.$"));
    assert!(!schema.allows_key("other"));

    let found = errors(
        &schema,
        json!({ "settings": { "theme": { "dark": true }, "list": [1, "a"] } }),
        &ValidateOptions::default(),
    );
    assert!(found.is_empty(), "{:?}", found);

    let found = errors(
        &schema,
        json!({ "$set": { "settings.theme.dark": false } }),
        &ValidateOptions::modifier(),
    );
    assert!(found.is_empty(), "{:?}", found);
}

// =============================================================================
// Modifier Tests
// =============================================================================

#[test]
fn test_nested_required_under_set_object() {
    let schema = SimpleSchema::from_definitions(vec![
        ("address".into(), FieldDefinition::of(FieldType::Object).optional()),
        ("address.street".into(), FieldDefinition::of(FieldType::String)),
        ("address.zip".into(), FieldDefinition::of(FieldType::String).optional()),
    ])
    .unwrap();

    let found = errors(
        &schema,
        json!({ "$set": { "address": { "zip": "0150" } } }),
        &ValidateOptions::modifier(),
    );
    assert_eq!(found, vec![InvalidFieldError::new("address.street", ErrorKind::Required, None)]);

    let found = errors(
        &schema,
        json!({ "$set": { "address.zip": "0150" } }),
        &ValidateOptions::modifier(),
    );
    assert!(found.is_empty(), "{:?}", found);
}

#[test]
fn test_set_on_insert_only_counts_for_upsert() {
    let schema = name_tags_schema();
    let modifier = json!({ "$setOnInsert": { "name": 5 } });

    assert!(errors(&schema, modifier.clone(), &ValidateOptions::modifier()).is_empty());

    let found = errors(&schema, modifier, &ValidateOptions::upsert());
    assert_eq!(found, vec![InvalidFieldError::new("name", ErrorKind::ExpectedString, Some(json!(5)))]);
}

#[test]
fn test_validation_is_deterministic() {
    let schema = name_tags_schema();
    let doc = json!({ "tags": [1, "a"], "x": 1 });
    let first = errors(&schema, doc.clone(), &ValidateOptions::default());
    for _ in 0..50 {
        assert_eq!(errors(&schema, doc.clone(), &ValidateOptions::default()), first);
    }
}

// =============================================================================
// Loader Tests
// =============================================================================

#[test]
fn test_schema_file_drives_validation() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("posts.json"),
        r#"{
            "title": { "type": "string", "label": "Headline", "max": 20 },
            "slug": { "type": "string", "regEx": { "preset": "id" }, "optional": true },
            "publishedAt": { "type": "date", "min": { "$date": "2020-01-01T00:00:00Z" }, "optional": true }
        }"#,
    )
    .unwrap();
    let mut loader = SchemaLoader::new(tmp.path());
    let schema = loader.load("posts").unwrap();

    let found = schema
        .validate(
            &json!({
                "title": "A title that is far too long to fit",
                "publishedAt": { "$date": "2019-06-01T00:00:00Z" }
            }),
            &ValidateOptions::default(),
            None,
        )
        .unwrap();
    let kinds: Vec<(&str, String)> = found.iter().map(|e| (e.name.as_str(), e.kind.to_string())).collect();
    assert_eq!(kinds, vec![("title", "maxString".to_string()), ("publishedAt", "minDate".to_string())]);
    assert_eq!(
        schema.message_for_error(&found[0].kind, "title", None),
        "Headline cannot exceed 20 characters"
    );
    assert_eq!(
        schema.message_for_error(&found[1].kind, "publishedAt", None),
        "Published at must be on or after 2020-01-01"
    );
}
