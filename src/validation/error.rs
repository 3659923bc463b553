//! Validation error taxonomy
//!
//! Validation errors are data: they are collected and returned, never raised.
//! Each kind has a stable name (`required`, `maxString`, `regEx.1`, ...) used
//! for message lookup and for serialized output.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Kind of a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    KeyNotInSchema,
    Required,
    ExpectedString,
    ExpectedNumber,
    ExpectedBoolean,
    ExpectedObject,
    ExpectedArray,
    /// Wrong constructor-typed value, or not a date for a date field
    ExpectedConstructor,
    MinString,
    MaxString,
    MinNumber,
    MaxNumber,
    MinDate,
    MaxDate,
    MinCount,
    MaxCount,
    NoDecimal,
    NotAllowed,
    /// Failed regular expression; the index is set for expression lists
    RegEx(Option<usize>),
    /// Kind returned by a custom validator
    Custom(String),
}

impl ErrorKind {
    /// Parses a kind name. Unknown names become `Custom`.
    pub fn parse(name: &str) -> Self {
        match name {
            "keyNotInSchema" => ErrorKind::KeyNotInSchema,
            "required" => ErrorKind::Required,
            "expectedString" => ErrorKind::ExpectedString,
            "expectedNumber" => ErrorKind::ExpectedNumber,
            "expectedBoolean" => ErrorKind::ExpectedBoolean,
            "expectedObject" => ErrorKind::ExpectedObject,
            "expectedArray" => ErrorKind::ExpectedArray,
            "expectedConstructor" => ErrorKind::ExpectedConstructor,
            "minString" => ErrorKind::MinString,
            "maxString" => ErrorKind::MaxString,
            "minNumber" => ErrorKind::MinNumber,
            "maxNumber" => ErrorKind::MaxNumber,
            "minDate" => ErrorKind::MinDate,
            "maxDate" => ErrorKind::MaxDate,
            "minCount" => ErrorKind::MinCount,
            "maxCount" => ErrorKind::MaxCount,
            "noDecimal" => ErrorKind::NoDecimal,
            "notAllowed" => ErrorKind::NotAllowed,
            "regEx" => ErrorKind::RegEx(None),
            other => match other.strip_prefix("regEx.").and_then(|i| i.parse().ok()) {
                Some(index) => ErrorKind::RegEx(Some(index)),
                None => ErrorKind::Custom(other.to_string()),
            },
        }
    }

    /// Name used to look up message templates. All `regEx` variants share
    /// one template list.
    pub fn message_name(&self) -> &str {
        match self {
            ErrorKind::KeyNotInSchema => "keyNotInSchema",
            ErrorKind::Required => "required",
            ErrorKind::ExpectedString => "expectedString",
            ErrorKind::ExpectedNumber => "expectedNumber",
            ErrorKind::ExpectedBoolean => "expectedBoolean",
            ErrorKind::ExpectedObject => "expectedObject",
            ErrorKind::ExpectedArray => "expectedArray",
            ErrorKind::ExpectedConstructor => "expectedConstructor",
            ErrorKind::MinString => "minString",
            ErrorKind::MaxString => "maxString",
            ErrorKind::MinNumber => "minNumber",
            ErrorKind::MaxNumber => "maxNumber",
            ErrorKind::MinDate => "minDate",
            ErrorKind::MaxDate => "maxDate",
            ErrorKind::MinCount => "minCount",
            ErrorKind::MaxCount => "maxCount",
            ErrorKind::NoDecimal => "noDecimal",
            ErrorKind::NotAllowed => "notAllowed",
            ErrorKind::RegEx(_) => "regEx",
            ErrorKind::Custom(name) => name,
        }
    }

    /// List index of the failing expression, for `regEx.N`.
    pub fn regex_index(&self) -> Option<usize> {
        match self {
            ErrorKind::RegEx(index) => *index,
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::RegEx(Some(index)) => write!(f, "regEx.{}", index),
            other => f.write_str(other.message_name()),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One failed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidFieldError {
    /// Concrete field path
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Offending value, absent for missing fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl InvalidFieldError {
    pub fn new(name: impl Into<String>, kind: ErrorKind, value: Option<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }
}

impl fmt::Display for InvalidFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.kind)
    }
}
