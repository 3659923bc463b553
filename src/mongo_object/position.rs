//! Position addressing
//!
//! A position is the indexer's addressing unit: `a[b][0][c]` for the field
//! `a.b.0.c`, or `$set[a.b]` for the same logical field under an operator.
//! The first segment is bare, every following segment is wrapped in brackets.
//! Brackets and backslashes inside a segment are escaped with a backslash, so
//! the key `junk[0]` is addressed as `junk\[0\]`.

use std::borrow::Cow;

/// Marker used in generic keys in place of array indices.
pub const WILDCARD: &str = "$";

/// Escapes the bracket and backslash characters of one segment.
pub fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains(|c: char| matches!(c, '[' | ']' | '\\')) {
        return Cow::Borrowed(segment);
    }
    let mut escaped = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        if matches!(c, '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Appends one wrapped segment to a position.
pub fn child_position(parent: &str, segment: &str) -> String {
    format!("{}[{}]", parent, escape_segment(segment))
}

/// Converts a dotted field path into a position.
pub fn path_to_position(path: &str, wrap_first: bool) -> String {
    let mut position = String::with_capacity(path.len() + 8);
    for (i, piece) in path.split('.').enumerate() {
        if i == 0 && !wrap_first {
            position.push_str(&escape_segment(piece));
        } else {
            position.push('[');
            position.push_str(&escape_segment(piece));
            position.push(']');
        }
    }
    position
}

/// Splits a position into its unescaped segments.
///
/// A leading empty segment (from a fully wrapped position such as `[a][b]`)
/// is dropped.
pub fn position_segments(position: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = position.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '[' => segments.push(std::mem::take(&mut current)),
            ']' => {}
            _ => current.push(c),
        }
    }
    segments.push(current);
    if segments.first().map_or(false, String::is_empty) {
        segments.remove(0);
    }
    segments
}

/// Byte offsets of the brackets that open a segment.
fn segment_openings(position: &str) -> impl Iterator<Item = usize> + '_ {
    let mut escaped = false;
    position.char_indices().filter_map(move |(i, c)| {
        if escaped {
            escaped = false;
            return None;
        }
        match c {
            '\\' => {
                escaped = true;
                None
            }
            '[' => Some(i),
            _ => None,
        }
    })
}

/// Number of wrapped segments in a position.
pub fn wrapped_segment_count(position: &str) -> usize {
    segment_openings(position).count()
}

/// The position without its last wrapped segment.
pub fn parent_position(position: &str) -> Option<&str> {
    segment_openings(position).last().map(|idx| &position[..idx])
}

/// Returns the update operator a position lives under, if any.
pub fn extract_operator(position: &str) -> Option<&str> {
    let first = match segment_openings(position).next() {
        Some(idx) => &position[..idx],
        None => position,
    };
    if first.starts_with('$') {
        Some(first)
    } else {
        None
    }
}

/// Replaces every array-index segment with the wildcard.
pub fn make_generic(key: &str) -> String {
    key.split('.')
        .map(|piece| if is_index(piece) { WILDCARD } else { piece })
        .collect::<Vec<_>>()
        .join(".")
}

/// True when the segment is a non-empty run of ASCII digits.
pub fn is_index(piece: &str) -> bool {
    !piece.is_empty() && piece.bytes().all(|b| b.is_ascii_digit())
}

/// Appends an object key to a field path. `$each` never extends a path.
pub fn append_key(parent: Option<&str>, key: &str) -> Option<String> {
    if key == "$each" {
        return parent.map(str::to_string);
    }
    Some(match parent {
        Some(p) => format!("{}.{}", p, key),
        None => key.to_string(),
    })
}

/// Returns the parent prefix of a key including the trailing dot, or an empty
/// string for a first-level key. Used by sibling-field lookups.
pub fn parent_prefix(key: &str) -> &str {
    match key.rfind('.') {
        Some(idx) => &key[..=idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_position() {
        assert_eq!(path_to_position("a.b.0.c", false), "a[b][0][c]");
        assert_eq!(path_to_position("a.b", true), "[a][b]");
        assert_eq!(path_to_position("name", false), "name");
    }

    #[test]
    fn test_position_segments() {
        assert_eq!(position_segments("a[b][0][c]"), vec!["a", "b", "0", "c"]);
        assert_eq!(position_segments("$set[a.b]"), vec!["$set", "a.b"]);
        assert_eq!(position_segments("[a][b]"), vec!["a", "b"]);
        assert_eq!(position_segments("a"), vec!["a"]);
    }

    #[test]
    fn test_bracketed_keys_are_escaped() {
        assert_eq!(path_to_position("junk[0].x", false), "junk\\[0\\][x]");
        assert_eq!(position_segments("junk\\[0\\][x]"), vec!["junk[0]", "x"]);
        assert_eq!(position_segments(&child_position("$set", "a\\b]")), vec!["$set", "a\\b]"]);
        assert_eq!(extract_operator("$x\\[y\\]"), Some("$x\\[y\\]"));
        assert_eq!(parent_position("a[b\\[c\\]]"), Some("a"));
        assert_eq!(parent_position("a"), None);
        assert_eq!(wrapped_segment_count("$set[a\\[0\\]]"), 1);
    }

    #[test]
    fn test_extract_operator() {
        assert_eq!(extract_operator("$set[a][b]"), Some("$set"));
        assert_eq!(extract_operator("a[b]"), None);
        assert_eq!(extract_operator("$unset"), Some("$unset"));
        assert_eq!(extract_operator("name"), None);
    }

    #[test]
    fn test_make_generic() {
        assert_eq!(make_generic("tags.0.label"), "tags.$.label");
        assert_eq!(make_generic("a.10.b.2"), "a.$.b.$");
        assert_eq!(make_generic("0.a"), "$.a");
        assert_eq!(make_generic("a1.b2"), "a1.b2");
        assert_eq!(make_generic(&make_generic("x.3.y")), "x.$.y");
    }

    #[test]
    fn test_append_key() {
        assert_eq!(append_key(None, "a").as_deref(), Some("a"));
        assert_eq!(append_key(Some("a"), "b").as_deref(), Some("a.b"));
        assert_eq!(append_key(Some("a"), "$each").as_deref(), Some("a"));
        assert_eq!(append_key(None, "$each"), None);
    }

    #[test]
    fn test_parent_prefix() {
        assert_eq!(parent_prefix("a.b.c"), "a.b.");
        assert_eq!(parent_prefix("a"), "");
    }
}
