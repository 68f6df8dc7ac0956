use std::sync::Arc;

use odb_types::AttributeValuesMap;

use crate::error::QueryResult;
use crate::evaluation::Evaluation;

/// A boolean combination of evaluations over one candidate's attributes.
#[derive(Clone, Debug)]
pub enum Criterion {
    Leaf(Arc<dyn Evaluation>),
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    Not(Box<Criterion>),
}

impl Criterion {
    pub fn leaf(evaluation: impl Evaluation + 'static) -> Self {
        Self::Leaf(Arc::new(evaluation))
    }

    /// Both `self` and `other` must match. Nested conjunctions are flattened.
    pub fn and(self, other: Criterion) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Either `self` or `other` must match. Nested disjunctions are flattened.
    pub fn or(self, other: Criterion) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Evaluate against a candidate's attribute values. Missing attributes
    /// evaluate as null. Conjunctions and disjunctions short-circuit.
    pub fn matches(&self, values: &AttributeValuesMap) -> QueryResult<bool> {
        match self {
            Self::Leaf(evaluation) => evaluation.evaluate(values.get_or_null(evaluation.attribute_name())),
            Self::And(all) => {
                for criterion in all {
                    if !criterion.matches(values)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(any) => {
                for criterion in any {
                    if criterion.matches(values)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(inner) => Ok(!inner.matches(values)?),
        }
    }

    /// Names of the attributes this criterion reads, in first-use order.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            Self::Leaf(evaluation) => {
                let name = evaluation.attribute_name();
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
            Self::Not(inner) => inner.collect_names(names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_types::Value;

    use crate::error::QueryError;
    use crate::evaluation::{
        ComparisonEvaluation, ComparisonOp, EqualsEvaluation, StartsWithEvaluation,
    };

    fn ada() -> AttributeValuesMap {
        AttributeValuesMap::new()
            .with("name", "ada")
            .with("age", 36)
    }

    #[test]
    fn and_or_not() {
        let named_ada = Criterion::leaf(EqualsEvaluation::new("name", Value::from("ada")));
        let older = Criterion::leaf(ComparisonEvaluation::new("age", ComparisonOp::GreaterThan, Value::from(40)));

        assert!(named_ada.matches(&ada()).unwrap());
        assert!(!named_ada.clone().and(older.clone()).matches(&ada()).unwrap());
        assert!(named_ada.clone().or(older.clone()).matches(&ada()).unwrap());
        assert!(older.clone().negate().matches(&ada()).unwrap());
        assert!(!older.negate().negate().matches(&ada()).unwrap());
    }

    #[test]
    fn missing_attribute_is_null() {
        let no_city = Criterion::leaf(EqualsEvaluation::new("city", Value::Null));
        assert!(no_city.matches(&ada()).unwrap());
    }

    #[test]
    fn short_circuit_skips_failing_evaluation() {
        let failing = Criterion::leaf(StartsWithEvaluation::new("age", Value::from("3"), true));
        let never = Criterion::leaf(EqualsEvaluation::new("name", Value::from("zoe")));
        assert!(!never.clone().and(failing.clone()).matches(&ada()).unwrap());
        assert!(matches!(
            failing.and(never).matches(&ada()),
            Err(QueryError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn attribute_names_are_unique_and_ordered() {
        let criterion = Criterion::leaf(EqualsEvaluation::new("name", Value::from("ada")))
            .and(Criterion::leaf(EqualsEvaluation::new("age", Value::from(1))).negate())
            .and(Criterion::leaf(EqualsEvaluation::new("name", Value::from("grace"))));
        assert_eq!(criterion.attribute_names(), vec!["name".to_string(), "age".to_string()]);
    }
}
