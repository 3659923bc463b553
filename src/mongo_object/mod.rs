//! Document and modifier indexer
//!
//! `MongoObject` walks a document (`{ name: "x", tags: ["a"] }`) or a modifier
//! (`{ $set: { name: "x" }, $push: { tags: "b" } }`) once and records, for
//! every addressable position, which field it affects:
//!
//! | position             | key        | generic key |
//! |----------------------|------------|-------------|
//! | `name`               | `name`     | `name`      |
//! | `tags[0]`            | `tags.0`   | `tags.$`    |
//! | `$set[name]`         | `name`     | `name`      |
//! | `$push[tags]`        | `tags.0`   | `tags.$`    |
//!
//! The schema works in generic keys; mutation works in positions. Every
//! structural mutation re-indexes, so the tables always describe the live
//! value.

mod operator;
mod position;

pub use operator::{adjust_for_operator, looks_like_modifier, Adjustment, Operator};
pub use position::{
    append_key, child_position, escape_segment, extract_operator, is_index, make_generic,
    parent_position, parent_prefix, path_to_position, position_segments, wrapped_segment_count,
    WILDCARD,
};

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::value::is_basic_object;

/// Value and operator found for a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyInfo {
    pub value: Option<Value>,
    pub operator: Option<String>,
}

impl KeyInfo {
    /// Whether the key currently has a value.
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone)]
struct Node {
    position: String,
    key: String,
    generic_key: String,
}

/// Lookup tables produced by one walk.
#[derive(Debug, Clone, Default)]
struct Index {
    /// Keyed positions in walk order
    nodes: Vec<Node>,
    by_position: HashMap<String, usize>,
    parent_positions: HashSet<String>,
    positions_inside_arrays: HashSet<String>,
    object_positions: HashSet<String>,
}

impl Index {
    fn build(obj: &Value, black_box_keys: &HashSet<String>) -> Self {
        let mut index = Index::default();
        index.walk(obj, None, None, None, false, false, black_box_keys);
        index
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        val: &Value,
        position: Option<String>,
        key: Option<String>,
        op: Option<Operator>,
        adjusted: bool,
        within_array: bool,
        black_box_keys: &HashSet<String>,
    ) {
        let mut val = val;
        let mut position = position;
        let mut key = key;
        let mut op = op;
        let mut adjusted = adjusted;

        // A first-level `$` key opens the operator context for its subtree.
        if op.is_none() {
            if let Some(name) = key.as_deref() {
                if let Some(parsed) = Operator::parse(name) {
                    op = Some(parsed);
                    key = None;
                }
            }
        }

        let mut is_black_box = false;
        let mut stop = false;

        if let Some(k) = key.as_mut() {
            if !adjusted {
                match adjust_for_operator(op.as_ref(), val) {
                    Adjustment::Each(each) => {
                        val = each;
                        position = position.map(|p| format!("{}[$each]", p));
                        adjusted = true;
                    }
                    Adjustment::FirstElement { stop: halt } => {
                        k.push_str(".0");
                        stop = halt;
                        adjusted = true;
                    }
                    Adjustment::Unchanged => {}
                }
            }

            let generic_key = make_generic(k);
            is_black_box = black_box_keys.contains(&generic_key);

            if let Some(p) = position.as_deref() {
                self.record(p, k, generic_key, within_array);
            }
        }

        if stop {
            return;
        }

        match val {
            Value::Array(items) if !items.is_empty() => {
                if let Some(p) = position.as_deref() {
                    self.parent_positions.insert(p.to_string());
                }
                for (i, item) in items.iter().enumerate() {
                    let item_position = match position.as_deref() {
                        Some(p) => format!("{}[{}]", p, i),
                        None => i.to_string(),
                    };
                    let child_key = match key.as_deref() {
                        Some(k) => format!("{}.{}", k, i),
                        None => i.to_string(),
                    };
                    self.walk(
                        item,
                        Some(item_position),
                        Some(child_key),
                        op.clone(),
                        adjusted,
                        true,
                        black_box_keys,
                    );
                }
            }
            Value::Object(map) if is_basic_object(val) && !is_black_box => {
                if let Some(p) = position.as_deref() {
                    if !map.is_empty() {
                        self.parent_positions.insert(p.to_string());
                        self.object_positions.insert(p.to_string());
                    }
                }
                for (k, v) in map {
                    if k == "$slice" {
                        continue;
                    }
                    let field_position = match position.as_deref() {
                        Some(p) => child_position(p, k),
                        None => escape_segment(k).into_owned(),
                    };
                    self.walk(
                        v,
                        Some(field_position),
                        append_key(key.as_deref(), k),
                        op.clone(),
                        adjusted,
                        within_array,
                        black_box_keys,
                    );
                }
            }
            _ => {}
        }
    }

    fn record(&mut self, position: &str, key: &str, generic_key: String, within_array: bool) {
        self.by_position
            .insert(position.to_string(), self.nodes.len());
        self.nodes.push(Node {
            position: position.to_string(),
            key: key.to_string(),
            generic_key,
        });
        if within_array {
            self.positions_inside_arrays.insert(position.to_string());
        }
    }

    fn node(&self, position: &str) -> Option<&Node> {
        self.by_position.get(position).map(|&i| &self.nodes[i])
    }
}

/// A mutation requested while visiting nodes.
#[derive(Debug, Clone)]
struct PendingWrite {
    position: String,
    value: Option<Value>,
}

/// One node handed to a [`MongoObject::for_each_node`] visitor.
///
/// Mutations are queued and applied once the walk is complete.
pub struct NodeVisit<'a> {
    pub value: Option<&'a Value>,
    pub operator: Option<&'a str>,
    pub position: &'a str,
    pub key: &'a str,
    pub generic_key: &'a str,
    writes: &'a mut Vec<PendingWrite>,
}

impl NodeVisit<'_> {
    /// Replaces the value at this node.
    pub fn update_value(&mut self, value: Value) {
        self.writes.push(PendingWrite {
            position: self.position.to_string(),
            value: Some(value),
        });
    }

    /// Removes this node.
    pub fn remove(&mut self) {
        self.writes.push(PendingWrite {
            position: self.position.to_string(),
            value: None,
        });
    }

    /// Queues a write to another position. `None` removes it.
    pub fn set_value_at(&mut self, position: impl Into<String>, value: Option<Value>) {
        self.writes.push(PendingWrite {
            position: position.into(),
            value,
        });
    }
}

/// Indexed view over a document or modifier.
#[derive(Debug, Clone)]
pub struct MongoObject {
    obj: Value,
    black_box_keys: HashSet<String>,
    index: Index,
}

impl MongoObject {
    /// Indexes `obj`. Generic keys in `black_box_keys` are recorded but never
    /// descended into.
    pub fn new<I, S>(obj: Value, black_box_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let black_box_keys: HashSet<String> =
            black_box_keys.into_iter().map(Into::into).collect();
        let index = Index::build(&obj, &black_box_keys);
        Self {
            obj,
            black_box_keys,
            index,
        }
    }

    /// Indexes `obj` without black-box keys.
    pub fn from_value(obj: Value) -> Self {
        Self::new(obj, std::iter::empty::<String>())
    }

    fn reindex(&mut self) {
        self.index = Index::build(&self.obj, &self.black_box_keys);
    }

    /// The live value.
    pub fn object(&self) -> &Value {
        &self.obj
    }

    /// Consumes the indexer and returns the value.
    pub fn into_value(self) -> Value {
        self.obj
    }

    /// Number of keyed positions.
    pub fn len(&self) -> usize {
        self.index.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.nodes.is_empty()
    }

    /// Visits every keyed position in walk order, skipping parents unless
    /// `endpoints_only` is false.
    ///
    /// Writes requested by the visitor are applied after the walk: value
    /// updates in the order requested, then removals in reverse order so that
    /// removing array elements never shifts a position still to be removed.
    pub fn for_each_node<F>(&mut self, endpoints_only: bool, mut visitor: F)
    where
        F: FnMut(&mut NodeVisit<'_>),
    {
        let mut writes = Vec::new();

        for node in &self.index.nodes {
            if endpoints_only && self.index.parent_positions.contains(&node.position) {
                continue;
            }
            let mut visit = NodeVisit {
                value: read_position(&self.obj, &node.position),
                operator: extract_operator(&node.position),
                position: &node.position,
                key: &node.key,
                generic_key: &node.generic_key,
                writes: &mut writes,
            };
            visitor(&mut visit);
        }

        if writes.is_empty() {
            return;
        }
        self.apply_writes(writes);
    }

    fn apply_writes(&mut self, writes: Vec<PendingWrite>) {
        let (sets, removals): (Vec<_>, Vec<_>) =
            writes.into_iter().partition(|w| w.value.is_some());
        for write in sets {
            write_position(&mut self.obj, &write.position, write.value);
        }
        for write in removals.into_iter().rev() {
            write_position(&mut self.obj, &write.position, None);
        }
        self.reindex();
    }

    /// Returns the value at a position, if present.
    pub fn get_value_for_position(&self, position: &str) -> Option<&Value> {
        read_position(&self.obj, position)
    }

    /// Writes the value at a position, creating missing containers. `None`
    /// deletes the key (array elements are removed, later ones shift down).
    pub fn set_value_for_position(&mut self, position: &str, value: Option<Value>) {
        write_position(&mut self.obj, position, value);
        self.reindex();
    }

    /// Deletes the value at a position.
    pub fn remove_value_for_position(&mut self, position: &str) {
        self.set_value_for_position(position, None);
    }

    pub fn key_for_position(&self, position: &str) -> Option<&str> {
        self.index.node(position).map(|n| n.key.as_str())
    }

    pub fn generic_key_for_position(&self, position: &str) -> Option<&str> {
        self.index.node(position).map(|n| n.generic_key.as_str())
    }

    /// First position affecting the concrete key.
    pub fn position_for_key(&self, key: &str) -> Option<&str> {
        self.index
            .nodes
            .iter()
            .find(|n| n.key == key)
            .map(|n| n.position.as_str())
    }

    /// All positions affecting the generic key, in walk order.
    pub fn positions_for_generic_key(&self, generic_key: &str) -> Vec<String> {
        self.index
            .nodes
            .iter()
            .filter(|n| n.generic_key == generic_key)
            .map(|n| n.position.clone())
            .collect()
    }

    /// Value of the first position affecting the concrete key.
    pub fn value_for_key(&self, key: &str) -> Option<&Value> {
        self.position_for_key(key)
            .and_then(|p| self.get_value_for_position(p))
    }

    /// Looks up the value and operator for a concrete key.
    ///
    /// When no position matches exactly, the key may name an array whose
    /// elements were indexed (`tags` via `tags.$`); the first element found
    /// answers for it.
    pub fn get_info_for_key(&self, key: &str) -> Option<KeyInfo> {
        if let Some(position) = self.position_for_key(key) {
            return Some(KeyInfo {
                value: self.get_value_for_position(position).cloned(),
                operator: extract_operator(position).map(str::to_string),
            });
        }

        let element_key = format!("{}.{}", key, WILDCARD);
        for position in self.positions_for_generic_key(&element_key) {
            let value = self.get_value_for_position(&position).or_else(|| {
                parent_position(&position).and_then(|p| self.get_value_for_position(p))
            });
            if let Some(value) = value {
                return Some(KeyInfo {
                    value: Some(value.clone()),
                    operator: extract_operator(&position).map(str::to_string),
                });
            }
        }
        None
    }

    /// Projects the indexed positions into a single-level `key -> value` map.
    ///
    /// Without `keep_arrays` every leaf is its own entry (`a.b.0`, `a.b.1`).
    /// With `keep_arrays` arrays are kept whole (`a.b: [..]`), since writing
    /// `a.b.0` is not the same update as replacing `a.b`.
    pub fn get_flat_object(&self, keep_arrays: bool) -> Map<String, Value> {
        let mut flat = Map::new();
        for node in &self.index.nodes {
            let include = if keep_arrays {
                !self.index.positions_inside_arrays.contains(&node.position)
                    && !self.index.object_positions.contains(&node.position)
            } else {
                !self.index.parent_positions.contains(&node.position)
            };
            if !include {
                continue;
            }
            if let Some(value) = self.get_value_for_position(&node.position) {
                flat.insert(node.key.clone(), value.clone());
            }
        }
        flat
    }

    pub fn affects_key(&self, key: &str) -> bool {
        self.position_for_key(key).is_some()
    }

    pub fn affects_generic_key(&self, generic_key: &str) -> bool {
        self.index.nodes.iter().any(|n| n.generic_key == generic_key)
    }

    /// Like [`affects_generic_key`](Self::affects_generic_key), but a key is
    /// also affected when a descendant is, or when it is an array-item key
    /// (`a.$`) and the array itself (`a`) is affected.
    pub fn affects_generic_key_implicit(&self, generic_key: &str) -> bool {
        let prefix = format!("{}.", generic_key);
        let array_key = generic_key.strip_suffix(".$");
        self.index.nodes.iter().any(|n| {
            n.generic_key == generic_key
                || n.generic_key.starts_with(&prefix)
                || array_key == Some(n.generic_key.as_str())
        })
    }

    /// Adds a value for a key, optionally under an operator.
    pub fn add_key(&mut self, key: &str, value: Value, operator: Option<&str>) {
        let position = match operator {
            Some(op) => child_position(op, key),
            None => path_to_position(key, false),
        };
        self.set_value_for_position(&position, Some(value));
    }

    /// Removes every position affecting the concrete key.
    pub fn remove_key(&mut self, key: &str) {
        self.remove_keys(&[key]);
    }

    pub fn remove_keys<S: AsRef<str>>(&mut self, keys: &[S]) {
        let positions = self.positions_where(|n| keys.iter().any(|k| k.as_ref() == n.key));
        self.remove_positions(positions);
    }

    /// Removes every position affecting the generic key.
    pub fn remove_generic_key(&mut self, generic_key: &str) {
        self.remove_generic_keys(&[generic_key]);
    }

    pub fn remove_generic_keys<S: AsRef<str>>(&mut self, generic_keys: &[S]) {
        let positions = self.positions_where(|n| {
            generic_keys
                .iter()
                .any(|k| k.as_ref() == n.generic_key)
        });
        self.remove_positions(positions);
    }

    /// Removes all positions whose generic key fails the predicate. Each
    /// distinct generic key is tested once.
    pub fn filter_generic_keys<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        let mut checked = HashSet::new();
        let mut rejected = Vec::new();
        for node in &self.index.nodes {
            if checked.insert(node.generic_key.as_str()) && !keep(&node.generic_key) {
                rejected.push(node.generic_key.clone());
            }
        }
        if !rejected.is_empty() {
            self.remove_generic_keys(&rejected);
        }
    }

    /// Sets the value of every position affecting the concrete key.
    pub fn set_value_for_key(&mut self, key: &str, value: Value) {
        let positions = self.positions_where(|n| n.key == key);
        self.set_positions(positions, value);
    }

    /// Sets the value of every position affecting the generic key.
    pub fn set_value_for_generic_key(&mut self, generic_key: &str, value: Value) {
        let positions = self.positions_where(|n| n.generic_key == generic_key);
        self.set_positions(positions, value);
    }

    fn positions_where<F>(&self, matches: F) -> Vec<String>
    where
        F: Fn(&Node) -> bool,
    {
        self.index
            .nodes
            .iter()
            .filter(|n| matches(n))
            .map(|n| n.position.clone())
            .collect()
    }

    fn remove_positions(&mut self, positions: Vec<String>) {
        if positions.is_empty() {
            return;
        }
        let writes = positions
            .into_iter()
            .map(|position| PendingWrite {
                position,
                value: None,
            })
            .collect();
        self.apply_writes(writes);
    }

    fn set_positions(&mut self, positions: Vec<String>, value: Value) {
        if positions.is_empty() {
            return;
        }
        let writes = positions
            .into_iter()
            .map(|position| PendingWrite {
                position,
                value: Some(value.clone()),
            })
            .collect();
        self.apply_writes(writes);
    }
}

/// Recovers the concrete key a position affects by replaying the indexer.
pub fn position_to_key(position: &str) -> Option<String> {
    let mut probe = MongoObject::from_value(Value::Object(Map::new()));
    probe.set_value_for_position(position, Some(Value::Bool(true)));
    probe.key_for_position(position).map(str::to_string)
}

/// Converts a document into a `$set`/`$unset` modifier.
///
/// Null leaves (and empty strings unless `keep_empty_strings`) are unset,
/// everything else is set by its flat key.
pub fn doc_to_modifier(doc: Value, keep_arrays: bool, keep_empty_strings: bool) -> Value {
    let flat = MongoObject::from_value(doc).get_flat_object(keep_arrays);

    let mut set = Map::new();
    let mut unset = Map::new();
    for (key, value) in flat {
        let empty = matches!(&value, Value::String(s) if s.is_empty());
        if value.is_null() || (empty && !keep_empty_strings) {
            unset.insert(key, Value::String(String::new()));
        } else {
            set.insert(key, value);
        }
    }

    let mut modifier = Map::new();
    if !set.is_empty() {
        modifier.insert("$set".into(), Value::Object(set));
    }
    if !unset.is_empty() {
        modifier.insert("$unset".into(), Value::Object(unset));
    }
    Value::Object(modifier)
}

/// Expands a flat `dotted.key -> value` map back into a nested document.
pub fn expand_obj(flat: &Map<String, Value>) -> Value {
    let mut doc = Value::Object(Map::new());
    for (key, value) in flat {
        write_position(&mut doc, &path_to_position(key, false), Some(value.clone()));
    }
    doc
}

fn read_position<'v>(root: &'v Value, position: &str) -> Option<&'v Value> {
    let mut current = root;
    for segment in position_segments(position) {
        current = match current {
            Value::Object(map) => map.get(segment.as_str())?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn write_position(root: &mut Value, position: &str, value: Option<Value>) {
    let segments = position_segments(position);
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let create = value.is_some();

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        let next_is_index = segments
            .get(i + 1)
            .map_or(false, |s| s.parse::<usize>().is_ok());
        current = match child_mut(current, segment, create, next_is_index) {
            Some(child) => child,
            None => return,
        };
    }

    match (current, value) {
        (Value::Object(map), Some(v)) => {
            map.insert(last.to_string(), v);
        }
        (Value::Object(map), None) => {
            map.shift_remove(last.as_str());
        }
        (Value::Array(items), Some(v)) => {
            if let Ok(idx) = last.parse::<usize>() {
                if idx < items.len() {
                    items[idx] = v;
                } else {
                    items.resize(idx, Value::Null);
                    items.push(v);
                }
            }
        }
        (Value::Array(items), None) => {
            if let Ok(idx) = last.parse::<usize>() {
                if idx < items.len() {
                    items.remove(idx);
                }
            }
        }
        _ => {}
    }
}

fn child_mut<'v>(
    node: &'v mut Value,
    segment: &str,
    create: bool,
    next_is_index: bool,
) -> Option<&'v mut Value> {
    let fresh = || {
        if next_is_index {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };
    match node {
        Value::Object(map) => {
            if create {
                Some(map.entry(segment.to_string()).or_insert_with(fresh))
            } else {
                map.get_mut(segment)
            }
        }
        Value::Array(items) => {
            let idx = segment.parse::<usize>().ok()?;
            if create && idx >= items.len() {
                items.resize(idx, Value::Null);
                items.push(fresh());
            }
            items.get_mut(idx)
        }
        _ => None,
    }
}
