//! Value helpers shared by the indexer, cleaner and validator
//!
//! Documents are plain `serde_json::Value` trees. A few single-purpose objects
//! follow the EJSON convention and are leaves, never "basic objects":
//!
//! - `{"$date": "2024-01-01T00:00:00Z"}` or `{"$date": 1704067200000}`
//! - `{"$type": "Money", "$value": ...}` (constructor-typed values)
//! - `{"$binary": "..."}`

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Number, Value};

/// Returns true for a plain key/value object that the engine may descend into.
pub fn is_basic_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => !is_special_object(map),
        _ => false,
    }
}

fn is_special_object(map: &Map<String, Value>) -> bool {
    match map.len() {
        1 => map.contains_key("$date") || map.contains_key("$binary"),
        2 => map.contains_key("$type") && map.contains_key("$value"),
        _ => false,
    }
}

/// Reads an EJSON date.
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    match map.get("$date")? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Builds an EJSON date value.
pub fn date_value(date: &DateTime<Utc>) -> Value {
    json!({ "$date": date.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

/// Returns the type name of an EJSON constructor-typed value.
pub fn custom_type_name(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 2 || !map.contains_key("$value") {
        return None;
    }
    map.get("$type")?.as_str()
}

/// A string with no visible content.
pub fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

/// Builds a JSON number, keeping integral values integral.
pub fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        return Some(Value::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number)
}

/// Structural equality where numbers compare by magnitude (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Renders a value the way it appears inside a message.
pub fn display_value(value: &Value) -> String {
    if let Some(date) = as_date(value) {
        return date.to_rfc3339_opts(SecondsFormat::Millis, true);
    }
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
