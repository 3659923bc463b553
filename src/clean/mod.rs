//! Document and modifier cleaning
//!
//! Runs before validation and repairs what can be repaired:
//!
//! 1. `$pushAll` is rewritten as `$push` with `$each`
//! 2. keys the schema does not allow are dropped (never under `$unset`)
//! 3. scalars are coerced toward String and Number field types
//! 4. empty strings are dropped, or turned into `$unset` under `$set`
//! 5. auto-values and default values are filled in
//! 6. operators left empty are removed
//!
//! Cleaning twice gives the same result as cleaning once.

mod auto_value;
mod convert;

pub use auto_value::AutoValueContext;
pub use convert::type_convert;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::mongo_object::{child_position, wrapped_segment_count, MongoObject};
use crate::schema::SimpleSchema;

/// Cleaning switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    /// Drop keys the schema does not allow
    pub filter: bool,
    /// Coerce values toward the declared type
    pub auto_convert: bool,
    pub remove_empty_strings: bool,
    pub get_auto_values: bool,
    pub is_modifier: bool,
    pub is_upsert: bool,
    /// Extra values handed to auto-value functions
    pub extend_auto_value_context: Map<String, Value>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            filter: true,
            auto_convert: true,
            remove_empty_strings: true,
            get_auto_values: true,
            is_modifier: false,
            is_upsert: false,
            extend_auto_value_context: Map::new(),
        }
    }
}

impl CleanOptions {
    /// Defaults for cleaning an update modifier.
    pub fn modifier() -> Self {
        Self {
            is_modifier: true,
            ..Self::default()
        }
    }

    /// Defaults for cleaning an upsert modifier.
    pub fn upsert() -> Self {
        Self {
            is_modifier: true,
            is_upsert: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct CleanStats {
    filtered: usize,
    converted: usize,
    emptied: usize,
}

/// Cleans `doc` in place against the schema.
pub fn clean(schema: &SimpleSchema, doc: &mut Value, options: &CleanOptions) {
    let mut obj = std::mem::take(doc);
    if let Value::Object(map) = &mut obj {
        normalize_push_all(map);
    }

    let mut mdoc = MongoObject::new(obj, schema.black_box_keys().iter().cloned());
    let mut stats = CleanStats::default();

    if options.filter || options.auto_convert || options.remove_empty_strings {
        mdoc.for_each_node(false, |node| {
            if options.filter && node.operator != Some("$unset") && !schema.allows_key(node.generic_key) {
                trace!(key = node.key, position = node.position, "filtered key not in schema");
                stats.filtered += 1;
                match node.position.strip_suffix("[$each]") {
                    Some(parent) => {
                        let parent = parent.to_string();
                        node.set_value_at(parent, None);
                    }
                    None => node.remove(),
                }
                return;
            }

            let Some(value) = node.value else {
                return;
            };
            let mut value = value.clone();

            if options.auto_convert {
                let converted = schema
                    .schema(node.generic_key)
                    .and_then(|def| def.field_type.as_ref())
                    .and_then(|t| type_convert(&value, t));
                if let Some(converted) = converted {
                    trace!(key = node.key, from = %value, to = %converted, "converted value");
                    stats.converted += 1;
                    node.update_value(converted.clone());
                    value = converted;
                }
            }

            let under_set = matches!(node.operator, None | Some("$set"));
            if options.remove_empty_strings && under_set && value.as_str() == Some("") {
                stats.emptied += 1;
                node.remove();
                if node.operator == Some("$set") && wrapped_segment_count(node.position) < 2 {
                    let unset = child_position("$unset", node.key);
                    node.set_value_at(unset, Some(Value::String(String::new())));
                }
            }
        });
    }

    if options.get_auto_values {
        auto_value::apply_auto_values(schema, &mut mdoc, options);
    }

    let mut obj = mdoc.into_value();
    if options.is_modifier {
        if let Value::Object(map) = &mut obj {
            map.retain(|_, v| !matches!(v, Value::Object(inner) if inner.is_empty()));
        }
    }

    debug!(
        filtered = stats.filtered,
        converted = stats.converted,
        emptied = stats.emptied,
        modifier = options.is_modifier,
        "cleaned"
    );
    *doc = obj;
}

/// Rewrites `{$pushAll: {f: [..]}}` as `{$push: {f: {$each: [..]}}}`.
fn normalize_push_all(modifier: &mut Map<String, Value>) {
    let Some(push_all) = modifier.shift_remove("$pushAll") else {
        return;
    };
    warn!("$pushAll is deprecated; converting to $push with $each");

    let Value::Object(push_all) = push_all else {
        return;
    };
    let push = modifier
        .entry("$push")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(push) = push else {
        return;
    };

    for (field, values) in push_all {
        let values = match values {
            Value::Array(items) => items,
            other => vec![other],
        };
        let each = match push.remove(&field) {
            Some(Value::Object(mut existing)) if existing.contains_key("$each") => {
                if let Some(Value::Array(items)) = existing.get_mut("$each") {
                    items.extend(values);
                }
                Value::Object(existing)
            }
            Some(single) => {
                let mut items = vec![single];
                items.extend(values);
                serde_json::json!({ "$each": items })
            }
            None => serde_json::json!({ "$each": values }),
        };
        push.insert(field, each);
    }
}
