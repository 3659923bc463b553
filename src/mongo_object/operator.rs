//! Update operators and the traversal rules they imply
//!
//! Both the indexer and the validator walk modifiers field by field. Array
//! operators do not address the field itself but an element of it, so the
//! walk rewrites key and value before descending. Those rules live here.

use std::fmt;

use serde_json::Value;

use crate::value::is_basic_object;

/// A modifier verb (`$set`, `$push`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Set,
    Unset,
    SetOnInsert,
    Inc,
    Push,
    PushAll,
    AddToSet,
    Pull,
    PullAll,
    Pop,
    Rename,
    /// Any other `$`-prefixed verb (`$min`, `$currentDate`, ...)
    Other(String),
}

impl Operator {
    /// Parses a `$`-prefixed key. Returns `None` for plain field names.
    pub fn parse(name: &str) -> Option<Self> {
        if !name.starts_with('$') {
            return None;
        }
        Some(match name {
            "$set" => Operator::Set,
            "$unset" => Operator::Unset,
            "$setOnInsert" => Operator::SetOnInsert,
            "$inc" => Operator::Inc,
            "$push" => Operator::Push,
            "$pushAll" => Operator::PushAll,
            "$addToSet" => Operator::AddToSet,
            "$pull" => Operator::Pull,
            "$pullAll" => Operator::PullAll,
            "$pop" => Operator::Pop,
            "$rename" => Operator::Rename,
            other => Operator::Other(other.to_string()),
        })
    }

    /// Returns the operator as written in a modifier.
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Set => "$set",
            Operator::Unset => "$unset",
            Operator::SetOnInsert => "$setOnInsert",
            Operator::Inc => "$inc",
            Operator::Push => "$push",
            Operator::PushAll => "$pushAll",
            Operator::AddToSet => "$addToSet",
            Operator::Pull => "$pull",
            Operator::PullAll => "$pullAll",
            Operator::Pop => "$pop",
            Operator::Rename => "$rename",
            Operator::Other(name) => name,
        }
    }

    /// Whether the values under this operator are document data the
    /// validator should check. `$pop` and `$pullAll` carry directions and
    /// match lists, not data.
    pub fn carries_data(&self) -> bool {
        !matches!(self, Operator::Pop | Operator::PullAll)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a field under an operator is addressed by a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment<'v> {
    /// The value is the field's value.
    Unchanged,
    /// `{ $each: [...] }`: the array is walked as the field's value and the
    /// position gains `[$each]`. Siblings such as `$slice` are never visited.
    Each(&'v Value),
    /// The value stands for one element: the key gains an implicit `.0`.
    /// With `stop`, nothing beneath it is data (object-shaped `$pull` criteria).
    FirstElement { stop: bool },
}

/// Computes the adjustment for a field whose value sits directly under `op`.
pub fn adjust_for_operator<'v>(op: Option<&Operator>, value: &'v Value) -> Adjustment<'v> {
    match op {
        Some(Operator::Push) | Some(Operator::AddToSet) | Some(Operator::Pop) => {
            match each_array(value) {
                Some(each) => Adjustment::Each(each),
                None => Adjustment::FirstElement { stop: false },
            }
        }
        Some(Operator::Pull) => Adjustment::FirstElement {
            stop: is_basic_object(value),
        },
        _ => Adjustment::Unchanged,
    }
}

fn each_array(value: &Value) -> Option<&Value> {
    if !is_basic_object(value) {
        return None;
    }
    value.get("$each")
}

/// Returns true if any top-level key of the value is an operator.
pub fn looks_like_modifier(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |map| map.keys().any(|k| k.starts_with('$')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_round_trip() {
        for name in ["$set", "$unset", "$push", "$addToSet", "$pull", "$pop", "$rename", "$inc", "$setOnInsert", "$min"] {
            assert_eq!(Operator::parse(name).unwrap().as_str(), name);
        }
        assert!(Operator::parse("set").is_none());
    }

    #[test]
    fn test_push_each_adjustment() {
        let v = json!({ "$each": [1, 2], "$slice": -5 });
        assert_eq!(
            adjust_for_operator(Some(&Operator::Push), &v),
            Adjustment::Each(&json!([1, 2]))
        );
        assert_eq!(
            adjust_for_operator(Some(&Operator::AddToSet), &json!("x")),
            Adjustment::FirstElement { stop: false }
        );
    }

    #[test]
    fn test_pull_criteria_stop() {
        assert_eq!(
            adjust_for_operator(Some(&Operator::Pull), &json!({ "score": { "$gt": 5 } })),
            Adjustment::FirstElement { stop: true }
        );
        assert_eq!(
            adjust_for_operator(Some(&Operator::Pull), &json!("a")),
            Adjustment::FirstElement { stop: false }
        );
    }

    #[test]
    fn test_other_operators_unchanged() {
        assert_eq!(adjust_for_operator(Some(&Operator::Set), &json!([1])), Adjustment::Unchanged);
        assert_eq!(adjust_for_operator(None, &json!([1])), Adjustment::Unchanged);
    }

    #[test]
    fn test_looks_like_modifier() {
        assert!(looks_like_modifier(&json!({ "$set": { "a": 1 } })));
        assert!(!looks_like_modifier(&json!({ "a": 1 })));
    }
}
