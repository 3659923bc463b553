//! Cleaning Behavior Tests
//!
//! - Default values fill in on insert and via `$setOnInsert` on upsert
//! - Auto-values see the field, its siblings and the operator
//! - `None` leaves a field alone; `unset()` removes it
//! - Array-item auto-values run once per element
//! - Cleaning is idempotent

use docschema::schema::{FieldDefinition, FieldType, SimpleSchema};
use docschema::{AutoValueContext, CleanOptions};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn schema(defs: Vec<(&str, FieldDefinition)>) -> SimpleSchema {
    SimpleSchema::from_definitions(defs.into_iter().map(|(k, d)| (k.to_string(), d)).collect()).unwrap()
}

fn cleaned(schema: &SimpleSchema, doc: Value, options: &CleanOptions) -> Value {
    let mut doc = doc;
    schema.clean(&mut doc, options);
    doc
}

fn post_schema() -> SimpleSchema {
    schema(vec![
        ("title", FieldDefinition::of(FieldType::String)),
        (
            "status",
            FieldDefinition::of(FieldType::String).default_value(json!("draft")),
        ),
        (
            "slug",
            FieldDefinition::of(FieldType::String).optional().auto_value(|ctx: &AutoValueContext<'_>| {
                if ctx.is_set {
                    return None;
                }
                let title = ctx.sibling_field("title");
                title
                    .value
                    .and_then(|v| v.as_str().map(|s| s.to_lowercase().replace(' ', "-")))
                    .filter(|slug| !slug.is_empty())
                    .map(Value::String)
            }),
        ),
    ])
}

// =============================================================================
// Default Value Tests
// =============================================================================

#[test]
fn test_default_value_on_insert() {
    let doc = cleaned(&post_schema(), json!({ "title": "Hello World" }), &CleanOptions::default());
    assert_eq!(doc, json!({ "title": "Hello World", "status": "draft", "slug": "hello-world" }));
}

#[test]
fn test_default_value_keeps_existing() {
    let doc = cleaned(
        &post_schema(),
        json!({ "title": "A", "status": "live", "slug": "custom" }),
        &CleanOptions::default(),
    );
    assert_eq!(doc, json!({ "title": "A", "status": "live", "slug": "custom" }));
}

#[test]
fn test_default_value_on_upsert_uses_set_on_insert() {
    let doc = cleaned(
        &post_schema(),
        json!({ "$set": { "title": "Up Sert" } }),
        &CleanOptions::upsert(),
    );
    assert_eq!(
        doc,
        json!({
            "$set": { "title": "Up Sert", "slug": "up-sert" },
            "$setOnInsert": { "status": "draft" }
        })
    );
}

#[test]
fn test_default_value_not_applied_on_plain_update() {
    let doc = cleaned(
        &post_schema(),
        json!({ "$set": { "status": "live" } }),
        &CleanOptions::modifier(),
    );
    assert_eq!(doc, json!({ "$set": { "status": "live" } }));
}

// =============================================================================
// Auto Value Tests
// =============================================================================

#[test]
fn test_auto_value_none_leaves_field_untouched() {
    let s = schema(vec![(
        "count",
        FieldDefinition::of(FieldType::Number).auto_value(|_| None),
    )]);
    let doc = cleaned(&s, json!({ "count": 3 }), &CleanOptions::default());
    assert_eq!(doc, json!({ "count": 3 }));
}

#[test]
fn test_auto_value_unset_removes_field() {
    let s = schema(vec![
        ("name", FieldDefinition::of(FieldType::String)),
        (
            "createdAt",
            FieldDefinition::of(FieldType::Date).optional().auto_value(|ctx| {
                ctx.unset();
                None
            }),
        ),
    ]);
    let doc = cleaned(
        &s,
        json!({ "name": "x", "createdAt": { "$date": "2024-01-01T00:00:00Z" } }),
        &CleanOptions::default(),
    );
    assert_eq!(doc, json!({ "name": "x" }));
}

#[test]
fn test_auto_value_operator_result() {
    let s = schema(vec![
        ("name", FieldDefinition::of(FieldType::String)),
        (
            "edits",
            FieldDefinition::of(FieldType::Number).optional().auto_value(|ctx| {
                ctx.is_modifier.then(|| json!({ "$inc": 1 }))
            }),
        ),
    ]);
    let doc = cleaned(&s, json!({ "$set": { "name": "y" } }), &CleanOptions::modifier());
    assert_eq!(doc, json!({ "$set": { "name": "y" }, "$inc": { "edits": 1 } }));

    let doc = cleaned(&s, json!({ "name": "y" }), &CleanOptions::default());
    assert_eq!(doc, json!({ "name": "y" }));
}

#[test]
fn test_auto_value_sees_extended_context() {
    let s = schema(vec![(
        "owner",
        FieldDefinition::of(FieldType::String).auto_value(|ctx| ctx.extra.get("userId").cloned()),
    )]);
    let mut options = CleanOptions::default();
    options.extend_auto_value_context.insert("userId".into(), json!("u42"));

    let doc = cleaned(&s, json!({}), &options);
    assert_eq!(doc, json!({ "owner": "u42" }));
}

#[test]
fn test_array_item_auto_value_runs_per_element() {
    let s = schema(vec![
        ("items", FieldDefinition::of(FieldType::Array)),
        ("items.$", FieldDefinition::of(FieldType::Object)),
        ("items.$.name", FieldDefinition::of(FieldType::String)),
        (
            "items.$.qty",
            FieldDefinition::of(FieldType::Number).optional().auto_value(|ctx| {
                (!ctx.is_set).then(|| json!(1))
            }),
        ),
    ]);
    let doc = cleaned(
        &s,
        json!({ "items": [{ "name": "a" }, { "name": "b", "qty": 4 }] }),
        &CleanOptions::default(),
    );
    assert_eq!(
        doc,
        json!({ "items": [{ "name": "a", "qty": 1 }, { "name": "b", "qty": 4 }] })
    );
}

// =============================================================================
// Idempotence Tests
// =============================================================================

#[test]
fn test_clean_twice_equals_clean_once() {
    let s = post_schema();
    for (doc, options) in [
        (json!({ "title": 12, "junk": [1, 2], "status": "" }), CleanOptions::default()),
        (json!({ "$set": { "title": "", "junk": 1 } }), CleanOptions::modifier()),
        (json!({ "$set": { "title": "T" } }), CleanOptions::upsert()),
    ] {
        let once = cleaned(&s, doc, &options);
        let twice = cleaned(&s, once.clone(), &options);
        assert_eq!(once, twice);
    }
}

// =============================================================================
// Conversion Tests
// =============================================================================

#[test]
fn test_large_integer_converted_to_string_exactly() {
    let s = schema(vec![("label", FieldDefinition::of(FieldType::String))]);
    let doc = cleaned(&s, json!({ "label": 9007199254740993i64 }), &CleanOptions::default());
    assert_eq!(doc, json!({ "label": "9007199254740993" }));
}
