//! Dynamic values and explicit type tags.
//!
//! Source records and entity fields hold [`FieldValue`]s. Each non-null value
//! carries exactly one runtime [`ValueType`] tag, which is what the engine
//! compares against declared attribute types.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::model::Model;
use crate::storage::EntityKey;

/// Plain ordered record: the shape of sources and of `reverse` output.
pub type Record = IndexMap<String, FieldValue>;

/// Represents the different kinds of values a field can hold
///
/// "undefined" has no variant: an absent value is `None` wherever an
/// `Option<FieldValue>` or `Option<&FieldValue>` is used.
#[derive(Debug, Clone)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<FieldValue>),
    Record(Record),
    Entity(Box<Model>),
    Null,
}

impl FieldValue {
    /// Runtime type tag of this value, `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            FieldValue::String(_) => Some(ValueType::String),
            FieldValue::Int(_) | FieldValue::Float(_) => Some(ValueType::Number),
            FieldValue::Bool(_) => Some(ValueType::Boolean),
            FieldValue::List(_) => Some(ValueType::Array),
            FieldValue::Record(_) => Some(ValueType::Object),
            FieldValue::Entity(model) => Some(ValueType::Entity(model.key().clone())),
            FieldValue::Null => None,
        }
    }

    /// Loose truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::String(s) => !s.is_empty(),
            FieldValue::Int(i) => *i != 0,
            FieldValue::Float(f) => *f != 0.0 && !f.is_nan(),
            FieldValue::Bool(b) => *b,
            FieldValue::List(_) | FieldValue::Record(_) | FieldValue::Entity(_) => true,
            FieldValue::Null => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// True for `""` and `null`, the values lightly mode drops.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::String(s) => s.is_empty(),
            FieldValue::Null => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            FieldValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Model> {
        match self {
            FieldValue::Entity(model) => Some(model),
            _ => None,
        }
    }

    /// Own keys of a record-like value: a plain record or an entity instance.
    pub fn own_fields(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(map) => Some(map),
            FieldValue::Entity(model) => Some(model.fields()),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::List(items) => {
                Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Record(map) => record_to_json(map),
            FieldValue::Entity(model) => record_to_json(model.fields()),
            FieldValue::Null => Value::Null,
        }
    }
}

/// Convert a record to a JSON object, keeping key order.
pub fn record_to_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(
        record
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Numbers compare by value across `Int` and `Float`.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::List(a), FieldValue::List(b)) => a == b,
            (FieldValue::Record(a), FieldValue::Record(b)) => a == b,
            (FieldValue::Entity(a), FieldValue::Entity(b)) => a == b,
            (FieldValue::Null, FieldValue::Null) => true,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// Loose string conversion, used for violation messages and `String` coercion.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", format_number(*fl)),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_null() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            FieldValue::Record(_) | FieldValue::Entity(_) => write!(f, "{}", self.to_json()),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else {
        // f64's Display already drops a trailing `.0`
        format!("{}", value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::Float(f) => serializer.serialize_f64(*f),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::List(items) => items.serialize(serializer),
            FieldValue::Record(map) => map.serialize(serializer),
            FieldValue::Entity(model) => model.fields().serialize(serializer),
            FieldValue::Null => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(FieldValue::from)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FieldValue::String(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Null
                }
            }
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Array(arr) => {
                FieldValue::List(arr.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Record(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
            serde_json::Value::Null => FieldValue::Null,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(value: Vec<FieldValue>) -> Self {
        FieldValue::List(value)
    }
}

impl From<Record> for FieldValue {
    fn from(value: Record) -> Self {
        FieldValue::Record(value)
    }
}

impl From<Model> for FieldValue {
    fn from(value: Model) -> Self {
        FieldValue::Entity(Box::new(value))
    }
}

/// Explicit type tag compared against declared attribute types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// An entity type, matched by identity.
    Entity(EntityKey),
}

impl ValueType {
    pub fn name(&self) -> &str {
        match self {
            ValueType::String => "String",
            ValueType::Number => "Number",
            ValueType::Boolean => "Boolean",
            ValueType::Array => "Array",
            ValueType::Object => "Object",
            ValueType::Entity(key) => key.name(),
        }
    }

    /// Resolve one of the built-in type names (`String`, `Number`, ...).
    pub fn from_builtin(name: &str) -> Option<Self> {
        match name {
            "String" => Some(ValueType::String),
            "Number" => Some(ValueType::Number),
            "Boolean" => Some(ValueType::Boolean),
            "Array" => Some(ValueType::Array),
            "Object" => Some(ValueType::Object),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared type of an attribute: one type, or an ordered union of types.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Single(ValueType),
    Union(Vec<ValueType>),
}

impl TypeSpec {
    /// The type used for coercion: the single type, or the first of a union.
    pub fn primary(&self) -> Option<&ValueType> {
        match self {
            TypeSpec::Single(ty) => Some(ty),
            TypeSpec::Union(types) => types.first(),
        }
    }

    /// Whether a runtime type satisfies this declaration.
    pub fn accepts(&self, actual: &ValueType) -> bool {
        match self {
            TypeSpec::Single(ty) => ty == actual,
            TypeSpec::Union(types) => types.contains(actual),
        }
    }

    /// Type names as shown in violation messages.
    pub fn describe(&self) -> String {
        match self {
            TypeSpec::Single(ty) => ty.name().to_string(),
            TypeSpec::Union(types) => types
                .iter()
                .map(ValueType::name)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<ValueType> for TypeSpec {
    fn from(value: ValueType) -> Self {
        TypeSpec::Single(value)
    }
}

impl From<Vec<ValueType>> for TypeSpec {
    fn from(value: Vec<ValueType>) -> Self {
        TypeSpec::Union(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_key_order() {
        let value = FieldValue::from(json!({"b": 1, "a": [true, null], "c": 1.5}));
        let record = value.as_record().unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(record["a"], FieldValue::List(vec![FieldValue::Bool(true), FieldValue::Null]));
        assert_eq!(record["c"], FieldValue::Float(1.5));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(FieldValue::Int(1), FieldValue::Float(1.0));
        assert_ne!(FieldValue::Int(1), FieldValue::String("1".into()));
    }

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::String(String::new()).is_truthy());
        assert!(!FieldValue::Int(0).is_truthy());
        assert!(!FieldValue::Float(f64::NAN).is_truthy());
        assert!(!FieldValue::Null.is_truthy());
        assert!(FieldValue::List(vec![]).is_truthy());
        assert!(FieldValue::Record(Record::new()).is_truthy());
    }

    #[test]
    fn test_display_is_loose_string_conversion() {
        assert_eq!(FieldValue::Float(3.0).to_string(), "3");
        assert_eq!(FieldValue::Float(f64::NAN).to_string(), "NaN");
        let list = FieldValue::from(json!(["a", 1, null]));
        assert_eq!(list.to_string(), "a,1,");
        assert_eq!(FieldValue::from(json!({"x": 1})).to_string(), r#"{"x":1}"#);
    }

    #[test]
    fn test_serialize_through_serde_json() {
        let mut record = Record::new();
        record.insert("id".into(), FieldValue::Int(1));
        record.insert("tags".into(), FieldValue::from(json!(["a"])));
        record.insert("score".into(), FieldValue::Float(f64::NAN));
        let value = FieldValue::Record(record);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"id":1,"tags":["a"],"score":null}"#);

        let back: FieldValue = serde_json::from_str(r#"{"id":1}"#).unwrap();
        assert_eq!(back.as_record().unwrap()["id"], FieldValue::Int(1));
    }

    #[test]
    fn test_type_spec_describe_and_accepts() {
        let union = TypeSpec::from(vec![ValueType::String, ValueType::Number]);
        assert_eq!(union.describe(), "String, Number");
        assert!(union.accepts(&ValueType::Number));
        assert!(!union.accepts(&ValueType::Boolean));
        assert_eq!(union.primary(), Some(&ValueType::String));
    }
}
