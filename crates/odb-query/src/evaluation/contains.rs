use odb_types::Value;

use crate::error::{QueryError, QueryResult};
use crate::evaluation::{matches_reference, null_outcome, CriterionValue, Evaluation};

/// Matches collections holding the reference value and strings holding the
/// reference substring.
///
/// A nested attribute map is first narrowed to its entry named like the
/// evaluated attribute. Elements that are objects match a reference object
/// by OID; primitive elements match by value.
#[derive(Clone, Debug)]
pub struct ContainsEvaluation {
    attribute_name: String,
    value: CriterionValue,
}

impl ContainsEvaluation {
    pub fn new(attribute_name: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            value: value.into(),
        }
    }
}

impl Evaluation for ContainsEvaluation {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn evaluate(&self, candidate: &Value) -> QueryResult<bool> {
        let candidate = match candidate {
            Value::Map(map) => map.get_or_null(&self.attribute_name),
            other => other,
        };
        if let Some(outcome) = null_outcome(candidate, &self.value) {
            return Ok(outcome);
        }
        match candidate {
            Value::List(items) => Ok(items.iter().any(|item| matches_reference(item, &self.value))),
            Value::String(text) => match &self.value {
                CriterionValue::Native(Value::String(needle)) => Ok(text.contains(needle.as_str())),
                other => Err(QueryError::TypeMismatch {
                    operation: "contains",
                    expected: "string",
                    found: other.type_name(),
                }),
            },
            other => Err(QueryError::unsupported("contains", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use odb_types::{AttributeValuesMap, ObjectRef};

    use crate::engine::{InMemoryEngine, QueryEngine};

    #[test]
    fn list_membership_by_value() {
        let list = Value::from(vec![2, 4, 6]);
        assert!(ContainsEvaluation::new("n", Value::from(4)).evaluate(&list).unwrap());
        assert!(!ContainsEvaluation::new("n", Value::from(5)).evaluate(&list).unwrap());
        assert!(ContainsEvaluation::new("n", Value::from(4.0)).evaluate(&list).unwrap());
    }

    #[test]
    fn list_membership_widens_floats() {
        let list = Value::from(vec![0.1, 0.25]);
        let tenth = Value::Decimal(rust_decimal::Decimal::new(1, 1));
        assert!(ContainsEvaluation::new("n", tenth).evaluate(&list).unwrap());
        let decimals = Value::List(vec![Value::Decimal(rust_decimal::Decimal::new(33, 1))]);
        assert!(ContainsEvaluation::new("n", Value::from(3.3)).evaluate(&decimals).unwrap());
    }

    #[test]
    fn string_contains_substring() {
        let eval = ContainsEvaluation::new("bio", Value::from("lace"));
        assert!(eval.evaluate(&Value::from("ada lovelace")).unwrap());
        assert!(!eval.evaluate(&Value::from("grace hopper")).unwrap());
        assert!(matches!(
            ContainsEvaluation::new("bio", Value::from(1)).evaluate(&Value::from("1")),
            Err(QueryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn nested_map_is_narrowed_to_attribute() {
        let eval = ContainsEvaluation::new("tags", Value::from("rust"));
        let map = Value::Map(AttributeValuesMap::new().with("tags", vec!["go", "rust"]));
        assert!(eval.evaluate(&map).unwrap());
        let missing = Value::Map(AttributeValuesMap::new().with("other", vec!["rust"]));
        assert!(!eval.evaluate(&missing).unwrap());
        let null_eval = ContainsEvaluation::new("tags", Value::Null);
        assert!(null_eval.evaluate(&missing).unwrap());
    }

    #[test]
    fn object_elements_match_by_oid() {
        let engine = InMemoryEngine::new();
        let bob: ObjectRef = Arc::new("bob".to_string());
        let carl: ObjectRef = Arc::new("carl".to_string());
        let bob_oid = engine.store("Person", Arc::clone(&bob), AttributeValuesMap::new()).unwrap();
        let carl_oid = engine.store("Person", Arc::clone(&carl), AttributeValuesMap::new()).unwrap();

        let friends = Value::List(vec![engine.object_from_oid(bob_oid).unwrap(), Value::Oid(carl_oid)]);
        let has_bob = ContainsEvaluation::new("friends", CriterionValue::object(&engine, bob).unwrap());
        let has_carl = ContainsEvaluation::new("friends", CriterionValue::object(&engine, carl).unwrap());
        assert!(has_bob.evaluate(&friends).unwrap());
        assert!(has_carl.evaluate(&friends).unwrap());

        let stranger: ObjectRef = Arc::new(0u8);
        let has_stranger = ContainsEvaluation::new("friends", CriterionValue::object(&engine, stranger).unwrap());
        assert!(!has_stranger.evaluate(&friends).unwrap());
    }

    #[test]
    fn unsupported_candidate_fails_loudly() {
        let eval = ContainsEvaluation::new("age", Value::from(4));
        assert!(matches!(
            eval.evaluate(&Value::from(4)),
            Err(QueryError::UnsupportedType { operation: "contains", type_name: "int" })
        ));
    }
}
