//! Value coercion toward a field's declared type

use serde_json::Value;

use crate::schema::FieldType;
use crate::value::{is_blank, number_value};

/// Converts a scalar toward `field_type`. Returns `None` when nothing changes
/// (already the right type, not convertible, or not a scalar).
///
/// - String fields: numbers and booleans are stringified
/// - Number fields: non-blank numeric strings are parsed; integral results
///   stay integers
///
/// Integers keep every digit in both directions; only floats are normalized.
pub fn type_convert(value: &Value, field_type: &FieldType) -> Option<Value> {
    match (field_type, value) {
        (FieldType::String, Value::Number(n)) if n.is_i64() || n.is_u64() => {
            Some(Value::String(n.to_string()))
        }
        (FieldType::String, Value::Number(n)) => {
            let text = match n.as_f64().and_then(number_value) {
                Some(Value::Number(normalized)) => normalized.to_string(),
                _ => n.to_string(),
            };
            Some(Value::String(text))
        }
        (FieldType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (FieldType::Number, Value::String(s)) if !is_blank(value) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Some(Value::from(n));
            }
            if let Ok(n) = s.parse::<u64>() {
                return Some(Value::from(n));
            }
            let parsed = s.parse::<f64>().ok().filter(|n| n.is_finite())?;
            number_value(parsed)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_string() {
        assert_eq!(type_convert(&json!(5), &FieldType::String), Some(json!("5")));
        assert_eq!(type_convert(&json!(2.0), &FieldType::String), Some(json!("2")));
        assert_eq!(type_convert(&json!(2.5), &FieldType::String), Some(json!("2.5")));
        assert_eq!(type_convert(&json!(true), &FieldType::String), Some(json!("true")));
        assert_eq!(type_convert(&json!("x"), &FieldType::String), None);
        assert_eq!(type_convert(&json!(null), &FieldType::String), None);
    }

    #[test]
    fn test_large_integers_keep_precision() {
        assert_eq!(
            type_convert(&json!(9007199254740993i64), &FieldType::String),
            Some(json!("9007199254740993"))
        );
        assert_eq!(
            type_convert(&json!(18446744073709551615u64), &FieldType::String),
            Some(json!("18446744073709551615"))
        );
        assert_eq!(
            type_convert(&json!("9007199254740993"), &FieldType::Number),
            Some(json!(9007199254740993i64))
        );
        assert_eq!(
            type_convert(&json!("18446744073709551615"), &FieldType::Number),
            Some(json!(18446744073709551615u64))
        );
    }

    #[test]
    fn test_to_number() {
        assert_eq!(type_convert(&json!("42"), &FieldType::Number), Some(json!(42)));
        assert_eq!(type_convert(&json!(" 1.5 "), &FieldType::Number), Some(json!(1.5)));
        assert_eq!(type_convert(&json!("abc"), &FieldType::Number), None);
        assert_eq!(type_convert(&json!("   "), &FieldType::Number), None);
        assert_eq!(type_convert(&json!("inf"), &FieldType::Number), None);
        assert_eq!(type_convert(&json!(3), &FieldType::Number), None);
    }

    #[test]
    fn test_containers_and_dates_untouched() {
        assert_eq!(type_convert(&json!([1]), &FieldType::String), None);
        assert_eq!(type_convert(&json!({ "a": 1 }), &FieldType::String), None);
        assert_eq!(type_convert(&json!({ "$date": 0 }), &FieldType::String), None);
        assert_eq!(type_convert(&json!("1"), &FieldType::Boolean), None);
    }
}
