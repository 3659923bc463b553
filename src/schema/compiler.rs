//! Schema compilation
//!
//! Turns an ordered set of definition maps into one flat map keyed by generic
//! path:
//!
//! 1. nested schemas are expanded into `key.child` entries
//! 2. ancestors implied by dotted keys are added as optional objects
//! 3. array types are unfolded into a bare `Array` plus a `key.$` item
//! 4. sources are merged field by field, later wins
//! 5. arrays are unfolded again for whatever the merge reintroduced
//!
//! The result is checked for definitions that cannot work at runtime.

use std::collections::HashMap;

use tracing::trace;

use crate::mongo_object::WILDCARD;

use super::errors::{SchemaError, SchemaResult};
use super::types::{Bound, FieldDefinition, FieldType, Limit, SchemaSource};

/// Definitions in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DefinitionMap {
    order: Vec<String>,
    map: HashMap<String, FieldDefinition>,
}

impl DefinitionMap {
    /// Builds a map from a list; a repeated key merges into the first.
    pub fn from_list(list: Vec<(String, FieldDefinition)>) -> Self {
        let mut defs = DefinitionMap::default();
        for (key, def) in list {
            defs.merge(key, def);
        }
        defs
    }

    pub fn keys(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, key: &str) -> Option<&FieldDefinition> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut FieldDefinition> {
        self.map.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDefinition)> {
        self.order.iter().filter_map(|k| self.map.get(k).map(|d| (k, d)))
    }

    /// Inserts unless the key is already defined.
    fn insert_if_absent(&mut self, key: String, def: FieldDefinition) -> bool {
        if self.map.contains_key(&key) {
            return false;
        }
        self.order.push(key.clone());
        self.map.insert(key, def);
        true
    }

    /// Overlays `def` onto an existing entry, or appends it.
    fn merge(&mut self, key: String, def: FieldDefinition) {
        match self.map.get_mut(&key) {
            Some(existing) => existing.merge_from(&def),
            None => {
                self.order.push(key.clone());
                self.map.insert(key, def);
            }
        }
    }
}

/// Compiles the sources into one checked definition map.
pub fn compile<I>(sources: I) -> SchemaResult<DefinitionMap>
where
    I: IntoIterator<Item = SchemaSource>,
{
    let mut merged = DefinitionMap::default();

    for source in sources {
        let defs = match source {
            SchemaSource::Compiled(schema) => schema.definitions().clone(),
            SchemaSource::Definitions(list) => {
                let mut defs = DefinitionMap::from_list(list);
                expand_schema(&mut defs);
                add_implicit_keys(&mut defs);
                adjust_array_fields(&mut defs);
                defs
            }
        };
        let DefinitionMap { order, mut map } = defs;
        for key in order {
            if let Some(def) = map.remove(&key) {
                merged.merge(key, def);
            }
        }
    }

    adjust_array_fields(&mut merged);
    check_definitions(&merged)?;
    Ok(merged)
}

/// Replaces nested schemas with their keys prefixed by the field.
fn expand_schema(defs: &mut DefinitionMap) {
    for key in defs.order.clone() {
        let Some(def) = defs.map.get_mut(&key) else {
            continue;
        };
        let (sub, prefix) = match def.field_type.take() {
            Some(FieldType::Schema(sub)) => {
                def.field_type = Some(FieldType::Object);
                (sub, key.clone())
            }
            Some(FieldType::ArrayOf(inner)) => match *inner {
                FieldType::Schema(sub) => {
                    def.field_type = Some(FieldType::array_of(FieldType::Object));
                    (sub, format!("{}.{}", key, WILDCARD))
                }
                other => {
                    def.field_type = Some(FieldType::ArrayOf(Box::new(other)));
                    continue;
                }
            },
            other => {
                def.field_type = other;
                continue;
            }
        };

        for (sub_key, sub_def) in sub.definitions().iter() {
            let new_key = format!("{}.{}", prefix, sub_key);
            if defs.insert_if_absent(new_key.clone(), sub_def.clone()) {
                trace!(key = %new_key, "expanded nested schema key");
            }
        }
    }
}

/// Adds the ancestors a dotted key implies: `a.$.b` implies `a` as an array
/// and `a.$` as an object, `a.b` implies `a` as an object. Declared keys are
/// never replaced.
fn add_implicit_keys(defs: &mut DefinitionMap) {
    let mut array_keys = Vec::new();
    let mut object_keys = Vec::new();

    for key in &defs.order {
        let mut pos = key.find('.');
        while let Some(p) = pos {
            let ancestor = &key[..p];
            let rest = &key[p..];
            if rest == ".$" {
                array_keys.push(ancestor.to_string());
                break;
            }
            if rest.starts_with(".$.") {
                array_keys.push(ancestor.to_string());
                object_keys.push(format!("{}.{}", ancestor, WILDCARD));
                pos = key[p + 3..].find('.').map(|i| i + p + 3);
            } else {
                object_keys.push(ancestor.to_string());
                pos = key[p + 1..].find('.').map(|i| i + p + 1);
            }
        }
    }

    for key in array_keys {
        defs.insert_if_absent(key, FieldDefinition::of(FieldType::Array).optional());
    }
    for key in object_keys {
        defs.insert_if_absent(key, FieldDefinition::of(FieldType::Object).optional());
    }
}

/// Unfolds every array-typed field into a bare `Array` and a `key.$` item.
///
/// The item inherits the element type and the value constraints, and is
/// always optional; the parent keeps only what applies to the array itself.
/// Repeats until nested array types are fully unfolded.
fn adjust_array_fields(defs: &mut DefinitionMap) {
    loop {
        let mut unfolded = false;

        for key in defs.order.clone() {
            let Some(def) = defs.map.get_mut(&key) else {
                continue;
            };
            let element_type = match &def.field_type {
                Some(FieldType::ArrayOf(inner)) => Some((**inner).clone()),
                Some(FieldType::Array) => None,
                _ => continue,
            };
            unfolded |= element_type.is_some();

            def.field_type = Some(FieldType::Array);
            let label = def.label.clone();
            let min = def.min.take();
            let max = def.max.take();
            let allowed_values = def.allowed_values.take();
            let decimal = def.decimal.take();
            let regex = def.regex.take();
            let blackbox = def.blackbox.take();

            let item_key = format!("{}.{}", key, WILDCARD);
            defs.insert_if_absent(item_key.clone(), FieldDefinition::default());
            let Some(item) = defs.map.get_mut(&item_key) else {
                continue;
            };

            match element_type {
                Some(t) => item.field_type = Some(t),
                None if item.field_type.is_none() => item.field_type = Some(FieldType::Any),
                None => {}
            }
            if item.label.is_none() {
                item.label = label;
            }
            item.optional = Some(Bound::Static(true));
            if min.is_some() {
                item.min = min;
            }
            if max.is_some() {
                item.max = max;
            }
            if allowed_values.is_some() {
                item.allowed_values = allowed_values;
            }
            if decimal.is_some() {
                item.decimal = decimal;
            }
            if regex.is_some() {
                item.regex = regex;
            }
            if blackbox.is_some() {
                item.blackbox = blackbox;
            }
        }

        if !unfolded {
            break;
        }
    }
}

fn check_definitions(defs: &DefinitionMap) -> SchemaResult<()> {
    for (key, def) in defs.iter() {
        let Some(field_type) = &def.field_type else {
            return Err(SchemaError::MissingType { key: key.clone() });
        };

        if key.ends_with(".$") && (def.auto_value.is_some() || def.default_value.is_some()) {
            return Err(SchemaError::AutoValueOnArrayItem { key: key.clone() });
        }

        for (name, bound) in [("min", &def.min), ("max", &def.max)] {
            let Some(Bound::Static(limit)) = bound else {
                continue;
            };
            match (field_type, limit) {
                (FieldType::Date, Limit::Number(_)) => {
                    return Err(SchemaError::invalid_bound(
                        key.clone(),
                        format!("{} must be a date for a Date field", name),
                    ));
                }
                (FieldType::Date, Limit::Date(_)) => {}
                (_, Limit::Date(_)) => {
                    return Err(SchemaError::invalid_bound(
                        key.clone(),
                        format!("{} can only be a date for a Date field", name),
                    ));
                }
                _ => {}
            }
        }
    }
    Ok(())
}
