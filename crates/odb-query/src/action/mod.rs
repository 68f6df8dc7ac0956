//! Values actions: per-candidate projections and aggregates.
//!
//! A scan drives every action through `start`, then `execute` once per
//! matching candidate in scan order, then `end`, and finally reads `value`.
//! [`ValuesAction::copy`] yields a fresh accumulator with the same
//! configuration, so one configured action can serve repeated or parallel
//! scans.

pub mod average;
pub mod count;
pub mod extremum;
pub mod field;
pub mod size;
pub mod sum;

pub use average::AverageValueAction;
pub use count::CountValueAction;
pub use extremum::{MaxValueAction, MinValueAction};
pub use field::FieldValueAction;
pub use size::SizeValueAction;
pub use sum::SumValueAction;

use std::fmt;
use std::sync::{Arc, OnceLock};

use odb_types::{AttributeValuesMap, Oid, Value};
use rust_decimal::Decimal;

use crate::engine::QueryEngine;
use crate::error::{QueryError, QueryResult};

/// A projection or aggregate over the attribute values of scanned
/// candidates.
pub trait ValuesAction: Send + fmt::Debug {
    /// The attribute this action reads.
    fn attribute_name(&self) -> &str;

    /// Name of the action's column in result rows.
    fn alias(&self) -> &str;

    /// `true` for per-candidate projections, `false` for aggregates that
    /// produce one value per scan.
    fn is_multi_row(&self) -> bool;

    /// Reset the accumulator.
    fn start(&mut self);

    /// Feed one matching candidate.
    fn execute(&mut self, oid: Oid, values: &AttributeValuesMap) -> QueryResult<()>;

    /// Finish the scan.
    fn end(&mut self);

    /// The current result.
    fn value(&self) -> ActionValue;

    /// A fresh action with the same configuration and an empty accumulator.
    fn copy(&self) -> Box<dyn ValuesAction>;
}

/// Result of a values action.
#[derive(Clone, Debug)]
pub enum ActionValue {
    Value(Value),
    /// A collection attribute, materialized element by element on access.
    List(LazyList),
}

impl ActionValue {
    /// The plain value, if this is not a lazy list.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::List(_) => None,
        }
    }
}

impl From<Value> for ActionValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// List adapter that resolves OID elements through the query engine the
/// first time each element is read.
#[derive(Clone)]
pub struct LazyList {
    raw: Vec<Value>,
    resolved: Vec<OnceLock<Value>>,
    engine: Arc<dyn QueryEngine>,
}

impl LazyList {
    pub fn new(raw: Vec<Value>, engine: Arc<dyn QueryEngine>) -> Self {
        let resolved = (0..raw.len()).map(|_| OnceLock::new()).collect();
        Self { raw, resolved, engine }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The elements as stored, with OIDs unresolved.
    pub fn raw(&self) -> &[Value] {
        &self.raw
    }

    /// Number of elements materialized so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Element `index`, with an OID element replaced by its object.
    pub fn get(&self, index: usize) -> QueryResult<Option<Value>> {
        let (Some(raw), Some(slot)) = (self.raw.get(index), self.resolved.get(index)) else {
            return Ok(None);
        };
        if let Some(value) = slot.get() {
            return Ok(Some(value.clone()));
        }
        let value = match raw {
            Value::Oid(oid) => self.engine.object_from_oid(*oid)?,
            other => other.clone(),
        };
        Ok(Some(slot.get_or_init(|| value).clone()))
    }

    /// Materialize elements in order.
    pub fn iter(&self) -> impl Iterator<Item = QueryResult<Value>> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i).transpose())
    }
}

impl fmt::Debug for LazyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyList")
            .field("len", &self.raw.len())
            .field("resolved", &self.resolved_count())
            .finish()
    }
}

/// The decimal value of an aggregated attribute, `None` for null.
pub(crate) fn numeric_value(operation: &'static str, value: &Value) -> QueryResult<Option<Decimal>> {
    if value.is_null() {
        return Ok(None);
    }
    if !value.is_numeric() {
        return Err(QueryError::unsupported(operation, value));
    }
    value.to_decimal().map(Some).ok_or(QueryError::TypeMismatch {
        operation,
        expected: "finite number",
        found: value.type_name(),
    })
}
