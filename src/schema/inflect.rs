//! Default labels derived from field names

use crate::mongo_object::WILDCARD;

/// Label for a key without an explicit one: the last non-wildcard segment,
/// humanized. An `_id` leaf is labelled "ID".
pub fn default_label(key: &str) -> String {
    let segment = key
        .rsplit('.')
        .find(|s| *s != WILDCARD)
        .unwrap_or(key);
    if segment == "_id" {
        return "ID".to_string();
    }
    humanize(segment)
}

/// `firstName` -> `First name`, `owner_id` -> `Owner`, `zip-code` -> `Zip code`
pub fn humanize(name: &str) -> String {
    let underscored = underscore(name.trim());
    let stripped = underscored.strip_suffix("_id").unwrap_or(&underscored);
    let spaced = stripped.replace('_', " ");
    capitalize(spaced.trim())
}

/// Word boundaries fall before an uppercase letter that follows a lowercase
/// letter or digit, and before the last capital of an acronym (`HTMLBody`).
fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    let mut prev_upper = false;
    let mut in_separator = false;
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-' || c.is_whitespace() {
            if !in_separator {
                out.push('_');
            }
            in_separator = true;
            prev_lower_or_digit = false;
            prev_upper = false;
            continue;
        }
        in_separator = false;
        let next_lower = chars.peek().map_or(false, |n| n.is_lowercase());
        if c.is_uppercase() && (prev_lower_or_digit || (prev_upper && next_lower)) {
            out.push('_');
        }
        prev_lower_or_digit = c.is_lowercase() || c.is_ascii_digit();
        prev_upper = c.is_uppercase();
        out.extend(c.to_lowercase());
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
