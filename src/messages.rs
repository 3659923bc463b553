//! Validation message templates
//!
//! A message book maps an error kind (optionally qualified by a field key) to
//! a template. Lookup goes from most to least specific:
//!
//! 1. `"<kind> <key>"`, e.g. `"required owner.email"`
//! 2. `"<kind> <genericKey>"`, e.g. `"minString tags.$"`
//! 3. `"<kind>"`
//!
//! first in the schema's own book, then in the registry's.
//!
//! `regEx` entries are lists: the entry whose pattern equals the failing
//! expression wins, else the entry without a pattern.

use std::collections::HashMap;

use serde_json::Value;

use crate::mongo_object::make_generic;
use crate::regex_presets;
use crate::schema::ResolvedDefinition;
use crate::validation::ErrorKind;
use crate::value::display_value;

pub const UNKNOWN_ERROR: &str = "Unknown validation error";

/// One entry of a `regEx` message list.
#[derive(Debug, Clone, PartialEq)]
pub struct RegExMessage {
    /// Pattern text this message is for; `None` for the fallback
    pub pattern: Option<String>,
    pub message: String,
}

impl RegExMessage {
    pub fn new(pattern: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            pattern: pattern.map(str::to_string),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageTemplate {
    Text(String),
    RegExList(Vec<RegExMessage>),
}

/// Message templates by name.
#[derive(Debug, Clone, Default)]
pub struct MessageBook {
    entries: HashMap<String, MessageTemplate>,
}

impl MessageBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in English messages.
    pub fn defaults() -> Self {
        let mut book = Self::new();
        for (name, text) in [
            ("required", "[label] is required"),
            ("minString", "[label] must be at least [min] characters"),
            ("maxString", "[label] cannot exceed [max] characters"),
            ("minNumber", "[label] must be at least [min]"),
            ("maxNumber", "[label] cannot exceed [max]"),
            ("minDate", "[label] must be on or after [min]"),
            ("maxDate", "[label] cannot be after [max]"),
            ("minCount", "You must specify at least [minCount] values"),
            ("maxCount", "You cannot specify more than [maxCount] values"),
            ("noDecimal", "[label] must be an integer"),
            ("notAllowed", "[value] is not an allowed value"),
            ("expectedString", "[label] must be a string"),
            ("expectedNumber", "[label] must be a number"),
            ("expectedBoolean", "[label] must be a boolean"),
            ("expectedArray", "[label] must be an array"),
            ("expectedObject", "[label] must be an object"),
            ("expectedConstructor", "[label] must be a [type]"),
            ("keyNotInSchema", "[label] is not allowed by the schema"),
        ] {
            book.set(name, text);
        }
        book.set_regex_list(
            "regEx",
            vec![
                RegExMessage::new(None, "[label] failed regular expression validation"),
                RegExMessage::new(Some(regex_presets::EMAIL), "[label] must be a valid e-mail address"),
                RegExMessage::new(Some(regex_presets::WEAK_EMAIL), "[label] must be a valid e-mail address"),
                RegExMessage::new(Some(regex_presets::DOMAIN), "[label] must be a valid domain"),
                RegExMessage::new(Some(regex_presets::WEAK_DOMAIN), "[label] must be a valid domain"),
                RegExMessage::new(Some(regex_presets::IP), "[label] must be a valid IPv4 or IPv6 address"),
                RegExMessage::new(Some(regex_presets::IPV4), "[label] must be a valid IPv4 address"),
                RegExMessage::new(Some(regex_presets::IPV6), "[label] must be a valid IPv6 address"),
                RegExMessage::new(Some(regex_presets::URL), "[label] must be a valid URL"),
                RegExMessage::new(Some(regex_presets::ID), "[label] must be a valid alphanumeric ID"),
                RegExMessage::new(Some(regex_presets::ZIP_CODE), "[label] must be a valid ZIP code"),
            ],
        );
        book
    }

    /// Sets a text template. `name` is a kind, optionally followed by a space
    /// and a key.
    pub fn set(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.entries
            .insert(name.into(), MessageTemplate::Text(text.into()));
        self
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.set(name, text);
        self
    }

    pub fn set_regex_list(&mut self, name: impl Into<String>, list: Vec<RegExMessage>) -> &mut Self {
        self.entries
            .insert(name.into(), MessageTemplate::RegExList(list));
        self
    }

    pub fn get(&self, name: &str) -> Option<&MessageTemplate> {
        self.entries.get(name)
    }

    /// Adds or replaces every entry of `other`.
    pub fn extend(&mut self, other: MessageBook) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Finds the most specific template for an error across books, in order.
pub fn find_template<'b>(
    books: &[&'b MessageBook],
    kind: &ErrorKind,
    key: &str,
) -> Option<&'b MessageTemplate> {
    let name = kind.message_name();
    let generic = make_generic(key);
    let candidates = [
        format!("{} {}", name, key),
        format!("{} {}", name, generic),
        name.to_string(),
    ];
    books
        .iter()
        .find_map(|book| candidates.iter().find_map(|c| book.get(c)))
}

/// Renders a template for one error.
pub fn render(
    template: &MessageTemplate,
    kind: &ErrorKind,
    label: &str,
    def: Option<&ResolvedDefinition>,
    value: Option<&Value>,
) -> String {
    let text = match template {
        MessageTemplate::Text(text) => text.as_str(),
        MessageTemplate::RegExList(list) => {
            let failing = def
                .and_then(|d| d.regex.as_ref())
                .and_then(|r| r.get(kind.regex_index()))
                .map(|re| re.as_str());
            let entry = list
                .iter()
                .find(|m| m.pattern.is_some() && m.pattern.as_deref() == failing)
                .or_else(|| list.iter().find(|m| m.pattern.is_none()));
            match entry {
                Some(entry) => entry.message.as_str(),
                None => return UNKNOWN_ERROR.to_string(),
            }
        }
    };

    let mut message = text.replacen("[label]", label, 1);
    if let Some(def) = def {
        if let Some(min) = &def.min {
            message = message.replacen("[min]", &min.to_string(), 1);
        }
        if let Some(max) = &def.max {
            message = message.replacen("[max]", &max.to_string(), 1);
        }
        if let Some(n) = def.min_count {
            message = message.replacen("[minCount]", &n.to_string(), 1);
        }
        if let Some(n) = def.max_count {
            message = message.replacen("[maxCount]", &n.to_string(), 1);
        }
        message = message.replacen("[type]", def.field_type.name(), 1);
    }
    if let Some(value) = value {
        message = message.replacen("[value]", &display_value(value), 1);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, Limit, RegExSpec};
    use regex::Regex;
    use serde_json::json;

    fn def(field_type: FieldType) -> ResolvedDefinition {
        ResolvedDefinition {
            field_type,
            label: "Name".into(),
            optional: false,
            min: None,
            max: None,
            min_count: None,
            max_count: None,
            allowed_values: None,
            decimal: false,
            regex: None,
            blackbox: false,
            custom: None,
        }
    }

    #[test]
    fn test_lookup_prefers_specific_key() {
        let schema_book = MessageBook::new().with("required name", "Tell us your name");
        let defaults = MessageBook::defaults();
        let books = [&schema_book, &defaults];

        let t = find_template(&books, &ErrorKind::Required, "name").unwrap();
        assert_eq!(t, &MessageTemplate::Text("Tell us your name".into()));

        let t = find_template(&books, &ErrorKind::Required, "email").unwrap();
        assert_eq!(t, &MessageTemplate::Text("[label] is required".into()));
    }

    #[test]
    fn test_lookup_by_generic_key() {
        let book = MessageBook::new().with("minString tags.$", "Tags are too short");
        let t = find_template(&[&book], &ErrorKind::MinString, "tags.3").unwrap();
        assert_eq!(t, &MessageTemplate::Text("Tags are too short".into()));
        assert!(find_template(&[&book], &ErrorKind::Required, "tags.3").is_none());
    }

    #[test]
    fn test_render_placeholders() {
        let mut d = def(FieldType::String);
        d.min = Some(Limit::Number(3.0));
        let t = MessageTemplate::Text("[label] must be at least [min] characters".into());
        assert_eq!(
            render(&t, &ErrorKind::MinString, "Name", Some(&d), None),
            "Name must be at least 3 characters"
        );

        let t = MessageTemplate::Text("[value] is not an allowed value".into());
        assert_eq!(
            render(&t, &ErrorKind::NotAllowed, "Name", Some(&d), Some(&json!("x"))),
            "x is not an allowed value"
        );
    }

    #[test]
    fn test_render_regex_list() {
        let defaults = MessageBook::defaults();
        let template = defaults.get("regEx").unwrap();

        let mut d = def(FieldType::String);
        d.regex = Some(RegExSpec::One(Regex::new(regex_presets::EMAIL).unwrap()));
        assert_eq!(
            render(template, &ErrorKind::RegEx(None), "Email", Some(&d), None),
            "Email must be a valid e-mail address"
        );

        d.regex = Some(RegExSpec::Many(vec![
            Regex::new("^a").unwrap(),
            Regex::new(regex_presets::URL).unwrap(),
        ]));
        assert_eq!(
            render(template, &ErrorKind::RegEx(Some(1)), "Site", Some(&d), None),
            "Site must be a valid URL"
        );
        assert_eq!(
            render(template, &ErrorKind::RegEx(Some(0)), "Site", Some(&d), None),
            "Site failed regular expression validation"
        );
    }
}
