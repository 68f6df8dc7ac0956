use odb_types::Value;

use crate::error::QueryResult;
use crate::evaluation::{matches_reference, null_outcome, CriterionValue, Evaluation};

/// Matches candidates equal to the reference value.
///
/// Objects are compared by OID, never by their materialized state.
#[derive(Clone, Debug)]
pub struct EqualsEvaluation {
    attribute_name: String,
    value: CriterionValue,
}

impl EqualsEvaluation {
    pub fn new(attribute_name: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            value: value.into(),
        }
    }

    pub fn value(&self) -> &CriterionValue {
        &self.value
    }
}

impl Evaluation for EqualsEvaluation {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn evaluate(&self, candidate: &Value) -> QueryResult<bool> {
        if let Some(outcome) = null_outcome(candidate, &self.value) {
            return Ok(outcome);
        }
        Ok(matches_reference(candidate, &self.value))
    }
}
