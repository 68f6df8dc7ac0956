use std::cmp::Ordering;

use odb_types::{AttributeValuesMap, Oid, Value};
use rust_decimal::Decimal;

use crate::action::{numeric_value, ActionValue, ValuesAction};
use crate::error::QueryResult;

/// Running extremum shared by [`MinValueAction`] and [`MaxValueAction`].
///
/// Starts at the sentinel opposite to the direction it keeps, so the first
/// value always replaces it. On ties the earlier candidate is kept.
#[derive(Clone, Debug)]
struct Extremum {
    attribute_name: String,
    alias: String,
    keep: Ordering,
    sentinel: Decimal,
    best: Decimal,
    oid: Oid,
    seen: bool,
}

impl Extremum {
    fn new(attribute_name: String, keep: Ordering, sentinel: Decimal) -> Self {
        Self {
            alias: attribute_name.clone(),
            attribute_name,
            keep,
            sentinel,
            best: sentinel,
            oid: Oid::null(),
            seen: false,
        }
    }

    fn start(&mut self) {
        self.best = self.sentinel;
        self.oid = Oid::null();
        self.seen = false;
    }

    fn execute(&mut self, operation: &'static str, oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        let Some(value) = numeric_value(operation, values.get_or_null(&self.attribute_name))? else {
            return Ok(());
        };
        if !self.seen || value.cmp(&self.best) == self.keep {
            self.best = value;
            self.oid = oid;
            self.seen = true;
        }
        Ok(())
    }

    fn value(&self) -> ActionValue {
        if self.seen {
            ActionValue::Value(Value::Decimal(self.best))
        } else {
            ActionValue::Value(Value::Null)
        }
    }

    fn fresh(&self) -> Self {
        let mut copy = self.clone();
        copy.start();
        copy
    }
}

/// Smallest numeric value of an attribute, and the OID holding it.
#[derive(Clone, Debug)]
pub struct MinValueAction(Extremum);

/// Largest numeric value of an attribute, and the OID holding it.
#[derive(Clone, Debug)]
pub struct MaxValueAction(Extremum);

impl MinValueAction {
    pub fn new(attribute_name: impl Into<String>) -> Self {
        Self(Extremum::new(attribute_name.into(), Ordering::Less, Decimal::MAX))
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.0.alias = alias.into();
        self
    }

    /// OID of the candidate holding the minimum, null before any value.
    pub fn oid_of_min_values(&self) -> Oid {
        self.0.oid
    }
}

impl MaxValueAction {
    pub fn new(attribute_name: impl Into<String>) -> Self {
        Self(Extremum::new(attribute_name.into(), Ordering::Greater, Decimal::MIN))
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.0.alias = alias.into();
        self
    }

    /// OID of the candidate holding the maximum, null before any value.
    pub fn oid_of_max_values(&self) -> Oid {
        self.0.oid
    }
}

impl ValuesAction for MinValueAction {
    fn attribute_name(&self) -> &str {
        &self.0.attribute_name
    }

    fn alias(&self) -> &str {
        &self.0.alias
    }

    fn is_multi_row(&self) -> bool {
        false
    }

    fn start(&mut self) {
        self.0.start();
    }

    fn execute(&mut self, oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        self.0.execute("min", oid, values)
    }

    fn end(&mut self) {}

    fn value(&self) -> ActionValue {
        self.0.value()
    }

    fn copy(&self) -> Box<dyn ValuesAction> {
        Box::new(Self(self.0.fresh()))
    }
}

impl ValuesAction for MaxValueAction {
    fn attribute_name(&self) -> &str {
        &self.0.attribute_name
    }

    fn alias(&self) -> &str {
        &self.0.alias
    }

    fn is_multi_row(&self) -> bool {
        false
    }

    fn start(&mut self) {
        self.0.start();
    }

    fn execute(&mut self, oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        self.0.execute("max", oid, values)
    }

    fn end(&mut self) {}

    fn value(&self) -> ActionValue {
        self.0.value()
    }

    fn copy(&self) -> Box<dyn ValuesAction> {
        Box::new(Self(self.0.fresh()))
    }
}
