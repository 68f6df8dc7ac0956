//! Criteria evaluations.
//!
//! An evaluation tests one candidate attribute value against a reference
//! value fixed at construction. Every evaluation settles the null cases
//! first: both sides null is a match, exactly one side null is not.
//!
//! Numbers compare by value across `Int`, `Float` and `Decimal`, so `1`
//! equals `1.0` everywhere: in equality, membership and ordering alike.

pub mod comparison;
pub mod contains;
pub mod equals;
pub mod string;

pub use comparison::{ComparisonEvaluation, ComparisonOp};
pub use contains::ContainsEvaluation;
pub use equals::EqualsEvaluation;
pub use string::{EndsWithEvaluation, StartsWithEvaluation};

use std::cmp::Ordering;
use std::fmt;

use odb_types::{ObjectRef, Oid, Value};

use crate::engine::QueryEngine;
use crate::error::QueryResult;

/// A predicate over one attribute of a candidate.
pub trait Evaluation: Send + Sync + fmt::Debug {
    /// The attribute whose value is passed to [`evaluate`](Self::evaluate).
    fn attribute_name(&self) -> &str;

    /// Test a candidate value. Type errors are reported, never treated as a
    /// non-match.
    fn evaluate(&self, candidate: &Value) -> QueryResult<bool>;
}

/// Reference value of an evaluation.
#[derive(Clone)]
pub enum CriterionValue {
    /// A plain value, compared by value.
    Native(Value),
    /// A live application object, compared by OID. The OID is looked up once
    /// when the criterion is built and is null if the object is not stored.
    Object { object: ObjectRef, oid: Oid },
}

impl CriterionValue {
    pub fn native(value: impl Into<Value>) -> Self {
        Self::Native(value.into())
    }

    /// Wrap a live object, resolving its OID without assigning one.
    pub fn object(engine: &dyn QueryEngine, object: ObjectRef) -> QueryResult<Self> {
        let oid = engine.object_id(&object, false)?;
        Ok(Self::Object { object, oid })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Native(Value::Null))
    }

    /// The OID of a non-primitive reference value: a live object, a wrapped
    /// object info or a bare OID.
    pub fn reference_oid(&self) -> Option<Oid> {
        match self {
            Self::Native(value) => value.referenced_oid(),
            Self::Object { oid, .. } => Some(*oid),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Native(value) => value.type_name(),
            Self::Object { .. } => "object",
        }
    }
}

impl From<Value> for CriterionValue {
    fn from(value: Value) -> Self {
        Self::Native(value)
    }
}

impl fmt::Debug for CriterionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(value) => f.debug_tuple("Native").field(value).finish(),
            Self::Object { oid, .. } => f.debug_struct("Object").field("oid", oid).finish(),
        }
    }
}

/// Result of the null checks, or `None` when neither side is null.
pub(crate) fn null_outcome(candidate: &Value, reference: &CriterionValue) -> Option<bool> {
    match (candidate.is_null(), reference.is_null()) {
        (true, true) => Some(true),
        (true, false) | (false, true) => Some(false),
        (false, false) => None,
    }
}

/// Whether `candidate` matches `reference`.
///
/// Non-primitive references match by OID only; a reference object that has
/// no OID yet matches nothing. Primitive references match by value with
/// numeric widening.
pub(crate) fn matches_reference(candidate: &Value, reference: &CriterionValue) -> bool {
    if let Some(reference_oid) = reference.reference_oid() {
        return candidate
            .referenced_oid()
            .is_some_and(|oid| !reference_oid.is_null() && oid == reference_oid);
    }
    match reference {
        CriterionValue::Native(value) => values_equal(candidate, value),
        CriterionValue::Object { .. } => false,
    }
}

/// Equality with numeric widening.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_numeric() && b.is_numeric() {
        return match (a.to_decimal(), b.to_decimal()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        };
    }
    a == b
}

/// Ordering with numeric widening. `None` if the values are not comparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        _ if a.is_numeric() && b.is_numeric() => a.to_decimal()?.partial_cmp(&b.to_decimal()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Oid(x), Value::Oid(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    #[test]
    fn null_outcomes() {
        let null = CriterionValue::native(Value::Null);
        let one = CriterionValue::native(1);
        assert_eq!(null_outcome(&Value::Null, &null), Some(true));
        assert_eq!(null_outcome(&Value::Null, &one), Some(false));
        assert_eq!(null_outcome(&Value::from(1), &null), Some(false));
        assert_eq!(null_outcome(&Value::from(1), &one), None);
    }

    #[test]
    fn numbers_widen() {
        assert!(values_equal(&Value::from(1), &Value::from(1.0)));
        assert!(values_equal(&Value::from(Decimal::new(250, 2)), &Value::from(2.5)));
        assert!(!values_equal(&Value::from(1), &Value::from("1")));
        assert!(!values_equal(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert_eq!(compare_values(&Value::from(2), &Value::from(1.5)), Some(Ordering::Greater));
        assert_eq!(compare_values(&Value::from("a"), &Value::from(1)), None);
    }

    #[test]
    fn unstored_reference_object_matches_nothing() {
        let reference = CriterionValue::Object {
            object: std::sync::Arc::new(0u8),
            oid: Oid::null(),
        };
        assert!(!matches_reference(&Value::Oid(Oid::null()), &reference));
        assert!(!matches_reference(&Value::from(0), &reference));
    }

    proptest! {
        #[test]
        fn integer_forms_agree(n in -1_000_000i64..1_000_000) {
            let int = Value::Int(n);
            let float = Value::Float(n as f64);
            let decimal = Value::Decimal(Decimal::from(n));
            prop_assert!(values_equal(&int, &float));
            prop_assert!(values_equal(&float, &decimal));
            prop_assert_eq!(compare_values(&int, &Value::Float(n as f64 + 0.5)), Some(Ordering::Less));
            prop_assert_eq!(compare_values(&decimal, &int), Some(Ordering::Equal));
        }
    }
}
