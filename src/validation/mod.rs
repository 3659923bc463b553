//! Document and modifier validation
//!
//! Walks the input the same way the indexer does (operator context, `$each`,
//! implicit `.0` for array operators) and checks every reachable key against
//! the schema. Keys are checked in this order, stopping at the first failure:
//!
//! 1. the key is defined (`keyNotInSchema`)
//! 2. required-ness
//! 3. a `$rename` target is itself allowed
//! 4. type and bounds
//! 5. allowed values
//! 6. custom validators: the field's own, then the schema's, then the registry's
//!
//! Only the first error per concrete key is kept, and array elements failing
//! the same way report once.

mod context;
mod error;
mod type_check;

pub use context::{InvalidKey, ValidationContext};
pub use error::{ErrorKind, InvalidFieldError};

use std::cell::OnceCell;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::mongo_object::{
    adjust_for_operator, looks_like_modifier, make_generic, parent_prefix, Adjustment, KeyInfo,
    MongoObject, Operator,
};
use crate::schema::{
    FieldType, OptionContext, ResolvedDefinition, SchemaError, SchemaResult, SimpleSchema,
};
use crate::value::{is_basic_object, is_blank, values_equal};

/// How the input is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    pub is_modifier: bool,
    /// Validate the modifier as if it will insert
    pub is_upsert: bool,
    /// Extra values handed to custom validators and computed options
    pub extended_custom_context: Map<String, Value>,
}

impl ValidateOptions {
    pub fn modifier() -> Self {
        Self {
            is_modifier: true,
            ..Self::default()
        }
    }

    pub fn upsert() -> Self {
        Self {
            is_modifier: true,
            is_upsert: true,
            ..Self::default()
        }
    }
}

/// Lazily indexed view of the whole input, for `field`/`sibling_field`.
struct DocLookup<'a> {
    input: &'a Value,
    black_box_keys: &'a [String],
    index: OnceCell<MongoObject>,
}

impl<'a> DocLookup<'a> {
    fn info(&self, key: &str) -> KeyInfo {
        self.index
            .get_or_init(|| {
                MongoObject::new(self.input.clone(), self.black_box_keys.iter().cloned())
            })
            .get_info_for_key(key)
            .unwrap_or_default()
    }
}

/// What a custom validator sees.
pub struct CustomContext<'a> {
    /// Concrete key being validated
    pub key: &'a str,
    pub generic_key: &'a str,
    pub definition: &'a ResolvedDefinition,
    pub value: Option<&'a Value>,
    pub operator: Option<&'a str>,
    pub is_set: bool,
    pub extra: &'a Map<String, Value>,
    lookup: &'a DocLookup<'a>,
}

impl<'a> CustomContext<'a> {
    /// Looks up another field of the input.
    pub fn field(&self, name: &str) -> KeyInfo {
        self.lookup.info(name)
    }

    /// Looks up a field next to this one.
    pub fn sibling_field(&self, name: &str) -> KeyInfo {
        self.field(&format!("{}{}", parent_prefix(self.key), name))
    }
}

/// Validates a document or modifier. `target_key` (concrete or generic)
/// restricts the reported errors to that key.
pub fn validate(
    schema: &SimpleSchema,
    obj: &Value,
    options: &ValidateOptions,
    target_key: Option<&str>,
) -> SchemaResult<Vec<InvalidFieldError>> {
    let Value::Object(input) = obj else {
        return Err(SchemaError::invalid_input("the object to validate must be an object"));
    };
    if options.is_modifier {
        check_modifier_shape(input)?;
    } else if looks_like_modifier(obj) {
        return Err(SchemaError::invalid_input(
            "a document to validate cannot contain update operators",
        ));
    }

    let mut walker = Walker {
        schema,
        options,
        target_key,
        set_keys: Vec::new(),
        lookup: DocLookup {
            input: obj,
            black_box_keys: schema.black_box_keys(),
            index: OnceCell::new(),
        },
        option_context: OptionContext {
            extra: options.extended_custom_context.clone(),
            ..OptionContext::default()
        },
        errors: Vec::new(),
    };

    if options.is_modifier {
        let modifier = fold_set_on_insert(input.clone(), options.is_upsert, &mut walker.set_keys);
        walker.check_modifier(&modifier);
    } else {
        walker.check_obj(Some(obj), None, None, false);
    }

    let errors = first_error_per_key(walker.errors);
    debug!(
        errors = errors.len(),
        modifier = options.is_modifier,
        upsert = options.is_upsert,
        target = target_key.unwrap_or_default(),
        "validated"
    );
    Ok(errors)
}

fn check_modifier_shape(modifier: &Map<String, Value>) -> SchemaResult<()> {
    if modifier.is_empty() {
        return Err(SchemaError::invalid_input("the modifier to validate is empty"));
    }
    if let Some(key) = modifier.keys().find(|k| !k.starts_with('$')) {
        return Err(SchemaError::invalid_input(format!(
            "the modifier to validate mixes operators with the field '{}'",
            key
        )));
    }
    if modifier.contains_key("$pushAll") {
        return Err(SchemaError::invalid_input(
            "$pushAll is not supported; use $push with $each",
        ));
    }
    Ok(())
}

/// Records the `$set`/`$setOnInsert` keys, then merges `$setOnInsert` into
/// `$set` for an upsert or drops it otherwise.
fn fold_set_on_insert(
    mut modifier: Map<String, Value>,
    is_upsert: bool,
    set_keys: &mut Vec<String>,
) -> Map<String, Value> {
    for op in ["$set", "$setOnInsert"] {
        if let Some(Value::Object(fields)) = modifier.get(op) {
            set_keys.extend(fields.keys().cloned());
        }
    }

    let Some(on_insert) = modifier.shift_remove("$setOnInsert") else {
        return modifier;
    };
    if !is_upsert {
        return modifier;
    }
    if let Value::Object(on_insert) = on_insert {
        let set = modifier
            .entry("$set")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(set) = set {
            set.extend(on_insert);
        }
    }
    modifier
}

/// Keeps the first error per concrete key, and the first error of each kind
/// among the elements of one array (`tags.0` and `tags.1` both failing
/// `expectedString` report `tags.0` only).
fn first_error_per_key(errors: Vec<InvalidFieldError>) -> Vec<InvalidFieldError> {
    let mut names = HashSet::new();
    let mut generic_kinds = HashSet::new();
    errors
        .into_iter()
        .filter(|e| {
            let generic = make_generic(&e.name);
            if generic != e.name && !generic_kinds.insert((generic, e.kind.clone())) {
                return false;
            }
            names.insert(e.name.clone())
        })
        .collect()
}

struct Walker<'a> {
    schema: &'a SimpleSchema,
    options: &'a ValidateOptions,
    target_key: Option<&'a str>,
    set_keys: Vec<String>,
    lookup: DocLookup<'a>,
    option_context: OptionContext,
    errors: Vec<InvalidFieldError>,
}

impl<'a> Walker<'a> {
    fn check_modifier(&mut self, modifier: &Map<String, Value>) {
        for (op_name, fields) in modifier {
            let Some(op) = Operator::parse(op_name) else {
                continue;
            };
            if !op.carries_data() {
                continue;
            }
            let Value::Object(fields) = fields else {
                continue;
            };

            // An upsert may insert, so absent required keys count as missing.
            if self.options.is_upsert && op == Operator::Set {
                let schema = self.schema;
                for key in schema.first_level_keys() {
                    let implied = self
                        .set_keys
                        .iter()
                        .any(|sk| sk.starts_with(key.as_str()) && sk[key.len()..].starts_with('.'));
                    if !fields.contains_key(key) && !implied {
                        self.check_obj(None, Some(key.as_str()), Some(op_name.as_str()), false);
                    }
                }
            }

            let op_name = op_name.as_str();
            for (key, value) in fields {
                let key = key.as_str();
                match adjust_for_operator(Some(&op), value) {
                    Adjustment::Unchanged => self.check_obj(Some(value), Some(key), Some(op_name), false),
                    Adjustment::Each(each) => self.check_obj(Some(each), Some(key), Some(op_name), false),
                    Adjustment::FirstElement { stop: true } => {
                        trace!(key = %key, operator = %op, "skipped query criteria");
                    }
                    Adjustment::FirstElement { stop: false } => {
                        let element = format!("{}.0", key);
                        self.check_obj(Some(value), Some(&element), Some(op_name), false);
                    }
                }
            }
        }
    }

    /// Checks one key, then descends into its value. `nested` is set below
    /// the keys written directly in the document or operator.
    fn check_obj(&mut self, val: Option<&Value>, key: Option<&str>, op: Option<&str>, nested: bool) {
        let mut def = None;
        if let Some(key) = key {
            if self.schema.key_is_in_black_box(key) {
                return;
            }
            let generic = make_generic(key);
            def = self.definition(key, &generic);

            if self.is_target(key, &generic) {
                let skip_required = self
                    .set_keys
                    .iter()
                    .any(|sk| sk.starts_with(key) && sk[key.len()..].starts_with('.'));
                let error = self.validate_key(val, key, &generic, def.as_ref(), op, skip_required, nested);
                if let Some(error) = error {
                    trace!(key = %key, kind = %error.kind, "invalid");
                    self.errors.push(error);
                }
            }
        }

        // A missing required object still has its required children checked.
        let empty = Value::Object(Map::new());
        let treat_as_empty = def
            .as_ref()
            .map_or(true, |d| d.field_type == FieldType::Object && !d.optional);
        let val = match val {
            None | Some(Value::Null) if treat_as_empty => Some(&empty),
            other => other,
        };

        match val {
            Some(Value::Array(items)) => {
                let Some(key) = key else {
                    return;
                };
                for (i, item) in items.iter().enumerate() {
                    let child = format!("{}.{}", key, i);
                    self.check_obj(Some(item), Some(&child), op, true);
                }
            }
            Some(value @ Value::Object(map)) if is_basic_object(value) => {
                if def.as_ref().map_or(false, |d| d.blackbox) {
                    return;
                }
                let schema = self.schema;
                let prefix = key.map(|k| format!("{}.", make_generic(k))).unwrap_or_default();

                let mut children: Vec<&str> = map.keys().map(String::as_str).collect();
                for child in schema
                    .required_object_keys(&prefix)
                    .iter()
                    .chain(schema.custom_object_keys(&prefix))
                {
                    if !children.contains(&child.as_str()) {
                        children.push(child);
                    }
                }

                for child in children {
                    let child_key = match key {
                        Some(k) => format!("{}.{}", k, child),
                        None => child.to_string(),
                    };
                    self.check_obj(map.get(child), Some(&child_key), op, key.is_some());
                }
            }
            _ => {}
        }
    }

    fn definition(&mut self, key: &str, generic: &str) -> Option<ResolvedDefinition> {
        self.option_context.key = key.to_string();
        self.option_context.generic_key = generic.to_string();
        self.schema.get_definition(key, Some(&self.option_context))
    }

    fn is_target(&self, key: &str, generic: &str) -> bool {
        match self.target_key {
            None => true,
            Some(target) => target == key || target == generic,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_key(
        &self,
        val: Option<&Value>,
        key: &str,
        generic: &str,
        def: Option<&ResolvedDefinition>,
        op: Option<&str>,
        skip_required: bool,
        nested: bool,
    ) -> Option<InvalidFieldError> {
        let Some(def) = def else {
            return Some(InvalidFieldError::new(key, ErrorKind::KeyNotInSchema, val.cloned()));
        };

        if !skip_required && !def.optional && self.fails_required(val, op, nested) {
            return Some(InvalidFieldError::new(key, ErrorKind::Required, None));
        }

        if op == Some("$rename") {
            if let Some(Value::String(target)) = val {
                if !self.schema.allows_key(&make_generic(target)) {
                    return Some(InvalidFieldError::new(target.as_str(), ErrorKind::KeyNotInSchema, None));
                }
            }
        }

        let is_data = !matches!(op, Some("$unset") | Some("$rename"));
        if let Some(value) = val.filter(|v| is_data && !v.is_null()) {
            if let Some(kind) = type_check::check_type(def, value, op) {
                return Some(InvalidFieldError::new(key, kind, Some(value.clone())));
            }
            if let Some(allowed) = &def.allowed_values {
                if !allowed.iter().any(|a| values_equal(a, value)) {
                    return Some(InvalidFieldError::new(key, ErrorKind::NotAllowed, Some(value.clone())));
                }
            }
        }

        let ctx = CustomContext {
            key,
            generic_key: generic,
            definition: def,
            value: val,
            operator: op,
            is_set: val.is_some(),
            extra: &self.options.extended_custom_context,
            lookup: &self.lookup,
        };
        let validators = def
            .custom
            .iter()
            .chain(self.schema.validators())
            .chain(self.schema.registry().validators());
        for validator in validators {
            if let Some(kind) = validator(&ctx) {
                return Some(InvalidFieldError::new(key, ErrorKind::parse(&kind), val.cloned()));
            }
        }
        None
    }

    /// `$unset` and `$rename` always fail a required key. Null or blank fails
    /// under any operator. A missing value fails in a document, below a
    /// written key, or in an upsert `$set`.
    fn fails_required(&self, val: Option<&Value>, op: Option<&str>, nested: bool) -> bool {
        if matches!(op, Some("$unset") | Some("$rename")) {
            return true;
        }
        match val {
            Some(value) => value.is_null() || is_blank(value),
            None => op.is_none() || nested || (op == Some("$set") && self.options.is_upsert),
        }
    }
}
