//! Field definition types
//!
//! Type names:
//! - String, Number, Boolean, Object, Array, Date: the JSON shapes (dates as EJSON)
//! - Custom(name): an EJSON constructor-typed value `{"$type": name, "$value": ..}`
//! - Any: synthesized element type of a bare `Array`
//! - ArrayOf(t), Schema(s): only before compilation

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::clean::AutoValueContext;
use crate::validation::CustomContext;
use crate::value::number_value;

use super::SimpleSchema;

/// Field types
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Date,
    /// Constructor-typed value, compared by type name
    Custom(String),
    /// Element type of a bare array
    Any,
    /// Array with element type, unfolded into `Array` + `key.$` at compile time
    ArrayOf(Box<FieldType>),
    /// Nested schema, expanded into `Object` + `key.child` at compile time
    Schema(Arc<SimpleSchema>),
}

impl FieldType {
    /// Returns the type name used in messages
    pub fn name(&self) -> &str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
            FieldType::Object | FieldType::Schema(_) => "Object",
            FieldType::Array | FieldType::ArrayOf(_) => "Array",
            FieldType::Date => "Date",
            FieldType::Custom(name) => name,
            FieldType::Any => "Any",
        }
    }

    /// Shorthand for `ArrayOf(inner)`.
    pub fn array_of(inner: FieldType) -> Self {
        FieldType::ArrayOf(Box::new(inner))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array | FieldType::ArrayOf(_))
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldType::Custom(a), FieldType::Custom(b)) => a == b,
            (FieldType::ArrayOf(a), FieldType::ArrayOf(b)) => a == b,
            (FieldType::Schema(a), FieldType::Schema(b)) => Arc::ptr_eq(a, b),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

/// Evaluation context for computed options.
#[derive(Debug, Clone, Default)]
pub struct OptionContext {
    pub key: String,
    pub generic_key: String,
    pub extra: Map<String, Value>,
}

impl OptionContext {
    pub fn for_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            generic_key: crate::mongo_object::make_generic(key),
            extra: Map::new(),
        }
    }
}

pub type OptionFn<T> = Arc<dyn Fn(&OptionContext) -> T + Send + Sync>;
pub type AutoValueFn = Arc<dyn Fn(&AutoValueContext<'_>) -> Option<Value> + Send + Sync>;
pub type CustomFn = Arc<dyn Fn(&CustomContext<'_>) -> Option<String> + Send + Sync>;

/// A static option value or one computed at lookup time.
#[derive(Clone)]
pub enum Bound<T> {
    Static(T),
    Computed(OptionFn<T>),
}

impl<T: Clone> Bound<T> {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&OptionContext) -> T + Send + Sync + 'static,
    {
        Bound::Computed(Arc::new(f))
    }

    pub fn resolve(&self, ctx: &OptionContext) -> T {
        match self {
            Bound::Static(v) => v.clone(),
            Bound::Computed(f) => f(ctx),
        }
    }

    /// The value, if known without a context.
    pub fn as_static(&self) -> Option<&T> {
        match self {
            Bound::Static(v) => Some(v),
            Bound::Computed(_) => None,
        }
    }
}

impl<T> From<T> for Bound<T> {
    fn from(value: T) -> Self {
        Bound::Static(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Bound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Static(v) => write!(f, "Static({:?})", v),
            Bound::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// Bound of `min`/`max`: a number for strings and numbers, a date for dates.
#[derive(Debug, Clone, PartialEq)]
pub enum Limit {
    Number(f64),
    Date(DateTime<Utc>),
}

impl Limit {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Limit::Number(n) => Some(*n),
            Limit::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Limit::Date(d) => Some(d),
            Limit::Number(_) => None,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Number(n) => match number_value(*n) {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "{}", n),
            },
            Limit::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<f64> for Limit {
    fn from(n: f64) -> Self {
        Limit::Number(n)
    }
}

impl From<DateTime<Utc>> for Limit {
    fn from(d: DateTime<Utc>) -> Self {
        Limit::Date(d)
    }
}

/// One expression or an ordered list. A failing list entry `i` reports
/// `regEx.i`.
#[derive(Debug, Clone)]
pub enum RegExSpec {
    One(Regex),
    Many(Vec<Regex>),
}

impl RegExSpec {
    /// The expressions with their list index (`None` for a single one).
    pub fn patterns(&self) -> Vec<(Option<usize>, &Regex)> {
        match self {
            RegExSpec::One(re) => vec![(None, re)],
            RegExSpec::Many(list) => list.iter().enumerate().map(|(i, re)| (Some(i), re)).collect(),
        }
    }

    pub fn get(&self, index: Option<usize>) -> Option<&Regex> {
        match (self, index) {
            (RegExSpec::One(re), None) => Some(re),
            (RegExSpec::Many(list), Some(i)) => list.get(i),
            _ => None,
        }
    }
}

/// Definition of one generic key. Every property is optional so that
/// definitions merge shallowly.
#[derive(Clone, Default)]
pub struct FieldDefinition {
    pub field_type: Option<FieldType>,
    pub label: Option<Bound<String>>,
    pub optional: Option<Bound<bool>>,
    pub min: Option<Bound<Limit>>,
    pub max: Option<Bound<Limit>>,
    pub min_count: Option<Bound<usize>>,
    pub max_count: Option<Bound<usize>>,
    pub allowed_values: Option<Bound<Vec<Value>>>,
    pub decimal: Option<bool>,
    pub regex: Option<RegExSpec>,
    pub blackbox: Option<bool>,
    pub custom: Option<CustomFn>,
    pub auto_value: Option<AutoValueFn>,
    pub default_value: Option<Value>,
}

impl FieldDefinition {
    pub fn of(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(Bound::Static(label.into()));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = Some(Bound::Static(true));
        self
    }

    pub fn optional_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&OptionContext) -> bool + Send + Sync + 'static,
    {
        self.optional = Some(Bound::computed(f));
        self
    }

    pub fn min(mut self, min: impl Into<Limit>) -> Self {
        self.min = Some(Bound::Static(min.into()));
        self
    }

    pub fn max(mut self, max: impl Into<Limit>) -> Self {
        self.max = Some(Bound::Static(max.into()));
        self
    }

    pub fn min_count(mut self, n: usize) -> Self {
        self.min_count = Some(Bound::Static(n));
        self
    }

    pub fn max_count(mut self, n: usize) -> Self {
        self.max_count = Some(Bound::Static(n));
        self
    }

    pub fn allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(Bound::Static(values));
        self
    }

    pub fn decimal(mut self) -> Self {
        self.decimal = Some(true);
        self
    }

    pub fn regex(mut self, regex: RegExSpec) -> Self {
        self.regex = Some(regex);
        self
    }

    pub fn blackbox(mut self) -> Self {
        self.blackbox = Some(true);
        self
    }

    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: Fn(&CustomContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(f));
        self
    }

    pub fn auto_value<F>(mut self, f: F) -> Self
    where
        F: Fn(&AutoValueContext<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        self.auto_value = Some(Arc::new(f));
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Overlays every property `other` sets.
    pub fn merge_from(&mut self, other: &FieldDefinition) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field.clone(); })*
            };
        }
        overlay!(
            field_type, label, optional, min, max, min_count, max_count, allowed_values,
            decimal, regex, blackbox, custom, auto_value, default_value
        );
    }

    pub fn is_blackbox(&self) -> bool {
        self.blackbox == Some(true)
    }

    /// Optional without needing a context.
    pub fn is_statically_optional(&self) -> bool {
        matches!(self.optional, Some(Bound::Static(true)))
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("field_type", &self.field_type)
            .field("label", &self.label)
            .field("optional", &self.optional)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("min_count", &self.min_count)
            .field("max_count", &self.max_count)
            .field("allowed_values", &self.allowed_values)
            .field("decimal", &self.decimal)
            .field("regex", &self.regex)
            .field("blackbox", &self.blackbox)
            .field("custom", &self.custom.is_some())
            .field("auto_value", &self.auto_value.is_some())
            .field("default_value", &self.default_value)
            .finish()
    }
}

/// A definition with every option evaluated for one concrete key.
#[derive(Clone)]
pub struct ResolvedDefinition {
    pub field_type: FieldType,
    pub label: String,
    pub optional: bool,
    pub min: Option<Limit>,
    pub max: Option<Limit>,
    pub min_count: Option<usize>,
    pub max_count: Option<usize>,
    pub allowed_values: Option<Vec<Value>>,
    pub decimal: bool,
    pub regex: Option<RegExSpec>,
    pub blackbox: bool,
    pub custom: Option<CustomFn>,
}

impl fmt::Debug for ResolvedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedDefinition")
            .field("field_type", &self.field_type)
            .field("label", &self.label)
            .field("optional", &self.optional)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("min_count", &self.min_count)
            .field("max_count", &self.max_count)
            .field("allowed_values", &self.allowed_values)
            .field("decimal", &self.decimal)
            .field("blackbox", &self.blackbox)
            .finish()
    }
}

/// One input to schema compilation.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Field definitions in declaration order
    Definitions(Vec<(String, FieldDefinition)>),
    /// An already compiled schema, reused as is
    Compiled(Arc<SimpleSchema>),
}

impl From<Vec<(String, FieldDefinition)>> for SchemaSource {
    fn from(defs: Vec<(String, FieldDefinition)>) -> Self {
        SchemaSource::Definitions(defs)
    }
}

impl From<Arc<SimpleSchema>> for SchemaSource {
    fn from(schema: Arc<SimpleSchema>) -> Self {
        SchemaSource::Compiled(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_merge_later_wins() {
        let mut base = FieldDefinition::of(FieldType::String).label("Name").min(1.0);
        let overlay = FieldDefinition::default().label("Full name").optional();
        base.merge_from(&overlay);

        assert_eq!(base.field_type, Some(FieldType::String));
        assert_eq!(base.label.as_ref().and_then(|l| l.as_static()).map(String::as_str), Some("Full name"));
        assert!(base.is_statically_optional());
        assert_eq!(base.min.as_ref().and_then(|m| m.as_static()), Some(&Limit::Number(1.0)));
    }

    #[test]
    fn test_computed_bound() {
        let bound: Bound<usize> = Bound::computed(|ctx| ctx.key.len());
        assert_eq!(bound.resolve(&OptionContext::for_key("abc")), 3);
        assert!(bound.as_static().is_none());
    }

    #[test]
    fn test_limit_display() {
        assert_eq!(Limit::Number(5.0).to_string(), "5");
        assert_eq!(Limit::Number(2.5).to_string(), "2.5");
        let d = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Limit::Date(d).to_string(), "2024-03-01");
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!(FieldType::array_of(FieldType::String).name(), "Array");
        assert_eq!(FieldType::Custom("Money".into()).name(), "Money");
        assert_eq!(FieldType::array_of(FieldType::Number), FieldType::array_of(FieldType::Number));
        assert_ne!(FieldType::String, FieldType::Number);
    }
}
