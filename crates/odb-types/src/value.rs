//! Attribute values as produced by the introspection service.
//!
//! A candidate object is presented to the query layer as an
//! [`AttributeValuesMap`]: the object's attributes, in class order, each
//! mapped to a [`Value`]. References to other persisted objects appear either
//! as a bare [`Value::Oid`] (not yet resolved) or as a wrapped
//! [`ObjectInfo`].

use rust_decimal::Decimal;

use crate::header::ObjectInfoHeader;
use crate::oid::Oid;

/// A single attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    /// Reference to a persisted object that has not been materialized.
    Oid(Oid),
    /// Wrapped object info of a non-native (application class) object.
    Object(Box<ObjectInfo>),
    /// Array or collection attribute.
    List(Vec<Value>),
    /// Nested attribute map.
    Map(AttributeValuesMap),
}

impl Value {
    /// Name of the runtime variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Oid(_) => "oid",
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Decimal(_))
    }

    /// The value as a decimal, if it is numeric and representable.
    ///
    /// Floats convert to their shortest decimal form, so `0.1` becomes
    /// exactly `0.1`. NaN and infinities have no decimal.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Float(f) => Decimal::try_from(*f).ok(),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The OID this value refers to, for `Oid` and `Object` values.
    pub fn referenced_oid(&self) -> Option<Oid> {
        match self {
            Self::Oid(oid) => Some(*oid),
            Self::Object(info) => Some(info.oid()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Oid> for Value {
    fn from(v: Oid) -> Self {
        Self::Oid(v)
    }
}

impl From<ObjectInfo> for Value {
    fn from(v: ObjectInfo) -> Self {
        Self::Object(Box::new(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<AttributeValuesMap> for Value {
    fn from(v: AttributeValuesMap) -> Self {
        Self::Map(v)
    }
}

/// Ordered attribute-name to value map for one candidate object.
///
/// Preserves the class's attribute order. Inserting an existing name
/// replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeValuesMap {
    entries: Vec<(String, Value)>,
}

impl AttributeValuesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value of `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// The value of `name`, treating a missing attribute as [`Value::Null`].
    pub fn get_or_null(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.get(name).unwrap_or(&NULL)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for AttributeValuesMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Object info of a non-native object: its header, class and attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectInfo {
    pub header: ObjectInfoHeader,
    pub class_name: String,
    pub attributes: AttributeValuesMap,
}

impl ObjectInfo {
    pub fn new(
        header: ObjectInfoHeader,
        class_name: impl Into<String>,
        attributes: AttributeValuesMap,
    ) -> Self {
        Self {
            header,
            class_name: class_name.into(),
            attributes,
        }
    }

    pub fn oid(&self) -> Oid {
        self.header.oid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order_and_replaces() {
        let mut map = AttributeValuesMap::new();
        map.insert("name", "ada");
        map.insert("age", 36);
        map.insert("name", "grace");
        let names: Vec<_> = map.names().collect();
        assert_eq!(names, vec!["name", "age"]);
        assert_eq!(map.get("name"), Some(&Value::from("grace")));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn missing_attribute_reads_as_null() {
        let map = AttributeValuesMap::new().with("a", 1);
        assert!(map.get_or_null("b").is_null());
        assert!(!map.contains("b"));
    }

    #[test]
    fn numeric_values_widen_to_decimal() {
        assert_eq!(Value::Int(1).to_decimal(), Some(Decimal::ONE));
        assert_eq!(Value::Float(1.0).to_decimal(), Some(Decimal::ONE));
        assert_eq!(Value::Float(f64::NAN).to_decimal(), None);
        assert_eq!(Value::Float(f64::INFINITY).to_decimal(), None);
        assert_eq!(Value::Float(0.1).to_decimal(), Some(Decimal::new(1, 1)));
        assert_eq!(Value::Float(3.3).to_decimal(), Some(Decimal::new(33, 1)));
        assert_eq!(Value::from("1").to_decimal(), None);
    }

    #[test]
    fn referenced_oid_covers_both_reference_forms() {
        let header = ObjectInfoHeader::new(Oid::object(9), Oid::class(1), 0);
        let info = ObjectInfo::new(header, "Person", AttributeValuesMap::new());
        assert_eq!(Value::from(info).referenced_oid(), Some(Oid::object(9)));
        assert_eq!(Value::Oid(Oid::object(3)).referenced_oid(), Some(Oid::object(3)));
        assert_eq!(Value::Int(3).referenced_oid(), None);
    }

    #[test]
    fn list_from_vec() {
        let v = Value::from(vec![2, 4, 6]);
        assert_eq!(v, Value::List(vec![Value::Int(2), Value::Int(4), Value::Int(6)]));
        assert_eq!(v.type_name(), "list");
    }
}
