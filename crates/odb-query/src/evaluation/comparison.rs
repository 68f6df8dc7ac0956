use std::cmp::Ordering;

use odb_types::Value;

use crate::error::{QueryError, QueryResult};
use crate::evaluation::{compare_values, null_outcome, CriterionValue, Evaluation};

/// Ordering test applied by a [`ComparisonEvaluation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonOp {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl ComparisonOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterOrEqual => ordering != Ordering::Less,
            Self::LessThan => ordering == Ordering::Less,
            Self::LessOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// Matches candidates ordered against the reference value as `op` asks.
///
/// Numbers, strings, booleans and OIDs can be compared; anything else is a
/// type mismatch.
#[derive(Clone, Debug)]
pub struct ComparisonEvaluation {
    attribute_name: String,
    op: ComparisonOp,
    value: CriterionValue,
}

impl ComparisonEvaluation {
    pub fn new(attribute_name: impl Into<String>, op: ComparisonOp, value: impl Into<CriterionValue>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            op,
            value: value.into(),
        }
    }

    pub fn op(&self) -> ComparisonOp {
        self.op
    }
}

impl Evaluation for ComparisonEvaluation {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn evaluate(&self, candidate: &Value) -> QueryResult<bool> {
        if let Some(outcome) = null_outcome(candidate, &self.value) {
            return Ok(outcome);
        }
        let mismatch = || QueryError::TypeMismatch {
            operation: "compare",
            expected: self.value.type_name(),
            found: candidate.type_name(),
        };
        let CriterionValue::Native(reference) = &self.value else {
            return Err(mismatch());
        };
        let ordering = compare_values(candidate, reference).ok_or_else(mismatch)?;
        Ok(self.op.accepts(ordering))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparison_widens() {
        let gt = ComparisonEvaluation::new("age", ComparisonOp::GreaterThan, Value::from(30));
        assert!(gt.evaluate(&Value::from(30.5)).unwrap());
        assert!(!gt.evaluate(&Value::from(30)).unwrap());
        let le = ComparisonEvaluation::new("age", ComparisonOp::LessOrEqual, Value::from(30.0));
        assert!(le.evaluate(&Value::from(30)).unwrap());
        assert!(!le.evaluate(&Value::from(31)).unwrap());
    }

    #[test]
    fn strings_compare_lexically() {
        let lt = ComparisonEvaluation::new("name", ComparisonOp::LessThan, Value::from("m"));
        assert!(lt.evaluate(&Value::from("ada")).unwrap());
        assert!(!lt.evaluate(&Value::from("zoe")).unwrap());
        let ge = ComparisonEvaluation::new("name", ComparisonOp::GreaterOrEqual, Value::from("m"));
        assert!(ge.evaluate(&Value::from("m")).unwrap());
    }

    #[test]
    fn incomparable_types_are_reported() {
        let gt = ComparisonEvaluation::new("age", ComparisonOp::GreaterThan, Value::from(30));
        assert!(matches!(
            gt.evaluate(&Value::from("thirty")),
            Err(QueryError::TypeMismatch { expected: "int", found: "string", .. })
        ));
    }

    #[test]
    fn null_cases_come_first() {
        let gt = ComparisonEvaluation::new("age", ComparisonOp::GreaterThan, Value::from(30));
        assert!(!gt.evaluate(&Value::Null).unwrap());
        let null = ComparisonEvaluation::new("age", ComparisonOp::GreaterThan, Value::Null);
        assert!(null.evaluate(&Value::Null).unwrap());
    }
}
