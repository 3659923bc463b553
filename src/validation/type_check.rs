//! Type and bound checks for one present, non-null value

use serde_json::Value;

use crate::schema::{FieldType, ResolvedDefinition};
use crate::value::{as_date, custom_type_name, is_basic_object};

use super::ErrorKind;

/// Returns the first failed check, in type then max then min order.
pub(super) fn check_type(def: &ResolvedDefinition, value: &Value, operator: Option<&str>) -> Option<ErrorKind> {
    match &def.field_type {
        FieldType::String => check_string(def, value),
        FieldType::Number => check_number(def, value, operator == Some("$inc")),
        FieldType::Boolean => (!value.is_boolean()).then_some(ErrorKind::ExpectedBoolean),
        FieldType::Object | FieldType::Schema(_) => {
            (!is_basic_object(value)).then_some(ErrorKind::ExpectedObject)
        }
        FieldType::Array | FieldType::ArrayOf(_) => check_array(def, value),
        FieldType::Date => check_date(def, value),
        FieldType::Custom(name) => {
            (custom_type_name(value) != Some(name.as_str())).then_some(ErrorKind::ExpectedConstructor)
        }
        FieldType::Any => None,
    }
}

fn check_string(def: &ResolvedDefinition, value: &Value) -> Option<ErrorKind> {
    let Value::String(s) = value else {
        return Some(ErrorKind::ExpectedString);
    };
    let len = s.chars().count() as f64;
    if def.max.as_ref().and_then(|m| m.as_number()).map_or(false, |max| max < len) {
        return Some(ErrorKind::MaxString);
    }
    if def.min.as_ref().and_then(|m| m.as_number()).map_or(false, |min| min > len) {
        return Some(ErrorKind::MinString);
    }
    let regex = def.regex.as_ref()?;
    regex
        .patterns()
        .into_iter()
        .find(|(_, re)| !re.is_match(s))
        .map(|(index, _)| ErrorKind::RegEx(index))
}

// `$inc` carries a delta, so bounds on the stored value do not apply.
fn check_number(def: &ResolvedDefinition, value: &Value, is_inc: bool) -> Option<ErrorKind> {
    let Some(n) = value.as_f64() else {
        return Some(ErrorKind::ExpectedNumber);
    };
    if !is_inc {
        if def.max.as_ref().and_then(|m| m.as_number()).map_or(false, |max| max < n) {
            return Some(ErrorKind::MaxNumber);
        }
        if def.min.as_ref().and_then(|m| m.as_number()).map_or(false, |min| min > n) {
            return Some(ErrorKind::MinNumber);
        }
    }
    if !def.decimal && n.fract() != 0.0 {
        return Some(ErrorKind::NoDecimal);
    }
    None
}

fn check_array(def: &ResolvedDefinition, value: &Value) -> Option<ErrorKind> {
    let Value::Array(items) = value else {
        return Some(ErrorKind::ExpectedArray);
    };
    if def.min_count.map_or(false, |min| items.len() < min) {
        return Some(ErrorKind::MinCount);
    }
    if def.max_count.map_or(false, |max| items.len() > max) {
        return Some(ErrorKind::MaxCount);
    }
    None
}

fn check_date(def: &ResolvedDefinition, value: &Value) -> Option<ErrorKind> {
    let Some(date) = as_date(value) else {
        return Some(ErrorKind::ExpectedConstructor);
    };
    if def.min.as_ref().and_then(|m| m.as_date()).map_or(false, |min| *min > date) {
        return Some(ErrorKind::MinDate);
    }
    if def.max.as_ref().and_then(|m| m.as_date()).map_or(false, |max| *max < date) {
        return Some(ErrorKind::MaxDate);
    }
    None
}
