//! Auto-value injection
//!
//! Every field with an auto-value (or a default value) runs once per concrete
//! key it affects. Fields beneath an array item (`items.$.createdAt`) run once
//! per element present in the nearest array.

use std::cell::Cell;
use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::trace;

use crate::mongo_object::{child_position, extract_operator, parent_prefix, path_to_position, KeyInfo, MongoObject};
use crate::schema::SimpleSchema;
use crate::value::is_basic_object;

use super::CleanOptions;

/// What an auto-value function sees.
pub struct AutoValueContext<'a> {
    /// Concrete key being computed
    pub key: &'a str,
    pub is_set: bool,
    pub value: Option<&'a Value>,
    pub operator: Option<&'a str>,
    pub is_upsert: bool,
    pub is_modifier: bool,
    /// Caller-supplied values (user id, request data, ...)
    pub extra: &'a Map<String, Value>,
    doc: &'a MongoObject,
    unset: Cell<bool>,
}

impl<'a> AutoValueContext<'a> {
    /// Looks up another field of the document being cleaned.
    pub fn field(&self, name: &str) -> KeyInfo {
        self.doc.get_info_for_key(name).unwrap_or_default()
    }

    /// Looks up a field next to this one.
    pub fn sibling_field(&self, name: &str) -> KeyInfo {
        self.field(&format!("{}{}", parent_prefix(self.key), name))
    }

    /// Requests removal of the field when the function returns `None`.
    pub fn unset(&self) {
        self.unset.set(true);
    }

    /// The whole document or modifier as currently cleaned.
    pub fn document(&self) -> &Value {
        self.doc.object()
    }
}

struct Target {
    key: String,
    position: String,
    operator: Option<String>,
}

pub(super) fn apply_auto_values(schema: &SimpleSchema, mdoc: &mut MongoObject, options: &CleanOptions) {
    let mut done: HashSet<String> = HashSet::new();

    for (field, func) in schema.auto_values() {
        let targets = targets_for(field, mdoc, options);

        for target in targets {
            if !done.insert(target.key.clone()) {
                continue;
            }

            let current = mdoc.get_value_for_position(&target.position).cloned();
            let (result, unset) = {
                let ctx = AutoValueContext {
                    key: &target.key,
                    is_set: current.is_some(),
                    value: current.as_ref(),
                    operator: target.operator.as_deref(),
                    is_upsert: options.is_upsert,
                    is_modifier: options.is_modifier,
                    extra: &options.extend_auto_value_context,
                    doc: mdoc,
                    unset: Cell::new(false),
                };
                let result = func(&ctx);
                (result, ctx.unset.get())
            };

            let Some(result) = result else {
                if unset {
                    trace!(key = %target.key, "auto value unset");
                    mdoc.remove_value_for_position(&target.position);
                }
                continue;
            };

            let (op, new_value) = match split_pseudo_modifier(result) {
                Ok((op, v)) => (Some(op), v),
                Err(v) if options.is_modifier && !target.position.starts_with('$') => {
                    (Some("$set".to_string()), v)
                }
                Err(v) => (None, v),
            };

            trace!(key = %target.key, operator = ?op, "auto value applied");
            match op {
                Some(op) => {
                    mdoc.remove_value_for_position(&target.position);
                    mdoc.set_value_for_position(&child_position(&op, &target.key), Some(new_value));
                }
                None => mdoc.set_value_for_position(&target.position, Some(new_value)),
            }
        }
    }
}

fn targets_for(field: &str, mdoc: &MongoObject, options: &CleanOptions) -> Vec<Target> {
    if let Some(idx) = field.rfind('$') {
        let array_item = &field[..=idx];
        let suffix = field.get(idx + 2..).unwrap_or_default();
        let position_suffix = path_to_position(suffix, true);

        return mdoc
            .positions_for_generic_key(array_item)
            .into_iter()
            .filter_map(|position| {
                let key = mdoc.key_for_position(&position)?;
                Some(Target {
                    key: format!("{}.{}", key, suffix),
                    operator: extract_operator(&position).map(str::to_string),
                    position: format!("{}{}", position, position_suffix),
                })
            })
            .collect();
    }

    let positions = mdoc.positions_for_generic_key(field);
    if positions.is_empty() {
        let position = if options.is_modifier {
            child_position("$set", field)
        } else {
            path_to_position(field, false)
        };
        return vec![Target {
            key: field.to_string(),
            position,
            operator: None,
        }];
    }

    positions
        .into_iter()
        .map(|position| Target {
            key: mdoc
                .key_for_position(&position)
                .unwrap_or(field)
                .to_string(),
            operator: extract_operator(&position).map(str::to_string),
            position,
        })
        .collect()
}

/// `{"$op": v}` splits into `("$op", v)`; anything else comes back as is.
fn split_pseudo_modifier(value: Value) -> Result<(String, Value), Value> {
    if !is_basic_object(&value) {
        return Err(value);
    }
    let op = value
        .as_object()
        .and_then(|map| map.keys().find(|k| k.starts_with('$')).cloned());
    match (op, value) {
        (Some(op), Value::Object(mut map)) => {
            let inner = map.remove(&op).unwrap_or(Value::Null);
            Ok((op, inner))
        }
        (_, value) => Err(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_pseudo_modifier() {
        assert_eq!(
            split_pseudo_modifier(json!({ "$setOnInsert": 5 })),
            Ok(("$setOnInsert".to_string(), json!(5)))
        );
        assert_eq!(split_pseudo_modifier(json!({ "a": 1 })), Err(json!({ "a": 1 })));
        assert_eq!(
            split_pseudo_modifier(json!({ "$date": 0 })),
            Err(json!({ "$date": 0 }))
        );
        assert_eq!(split_pseudo_modifier(json!("x")), Err(json!("x")));
    }

    #[test]
    fn test_targets_for_wildcard_field() {
        let mdoc = MongoObject::from_value(json!({
            "$set": { "items": [{ "name": "a" }, { "name": "b", "at": 1 }] }
        }));
        let options = CleanOptions {
            is_modifier: true,
            ..Default::default()
        };
        let targets = targets_for("items.$.at", &mdoc, &options);
        let found: Vec<_> = targets
            .iter()
            .map(|t| (t.key.as_str(), t.position.as_str(), t.operator.as_deref()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("items.0.at", "$set[items][0][at]", Some("$set")),
                ("items.1.at", "$set[items][1][at]", Some("$set")),
            ]
        );
    }

    #[test]
    fn test_targets_for_absent_field() {
        let mdoc = MongoObject::from_value(json!({ "$inc": { "n": 1 } }));
        let modifier = CleanOptions {
            is_modifier: true,
            ..Default::default()
        };
        let targets = targets_for("stats.updatedAt", &mdoc, &modifier);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].position, "$set[stats.updatedAt]");
        assert!(targets[0].operator.is_none());

        let doc = MongoObject::from_value(json!({}));
        let targets = targets_for("stats.updatedAt", &doc, &CleanOptions::default());
        assert_eq!(targets[0].position, "stats[updatedAt]");
    }
}
