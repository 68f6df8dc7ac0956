use odb_types::Value;

use crate::error::{QueryError, QueryResult};
use crate::evaluation::{null_outcome, CriterionValue, Evaluation};

/// Matches string candidates that start with the reference string.
#[derive(Clone, Debug)]
pub struct StartsWithEvaluation {
    attribute_name: String,
    value: CriterionValue,
    case_sensitive: bool,
}

/// Matches string candidates that end with the reference string.
#[derive(Clone, Debug)]
pub struct EndsWithEvaluation {
    attribute_name: String,
    value: CriterionValue,
    case_sensitive: bool,
}

impl StartsWithEvaluation {
    pub fn new(attribute_name: impl Into<String>, value: impl Into<CriterionValue>, case_sensitive: bool) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            value: value.into(),
            case_sensitive,
        }
    }
}

impl EndsWithEvaluation {
    pub fn new(attribute_name: impl Into<String>, value: impl Into<CriterionValue>, case_sensitive: bool) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            value: value.into(),
            case_sensitive,
        }
    }
}

impl Evaluation for StartsWithEvaluation {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn evaluate(&self, candidate: &Value) -> QueryResult<bool> {
        match_strings("starts_with", candidate, &self.value, self.case_sensitive, |c, r| {
            c.starts_with(r)
        })
    }
}

impl Evaluation for EndsWithEvaluation {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn evaluate(&self, candidate: &Value) -> QueryResult<bool> {
        match_strings("ends_with", candidate, &self.value, self.case_sensitive, |c, r| {
            c.ends_with(r)
        })
    }
}

fn match_strings(
    operation: &'static str,
    candidate: &Value,
    reference: &CriterionValue,
    case_sensitive: bool,
    test: impl Fn(&str, &str) -> bool,
) -> QueryResult<bool> {
    if let Some(outcome) = null_outcome(candidate, reference) {
        return Ok(outcome);
    }
    let Value::String(candidate) = candidate else {
        return Err(QueryError::unsupported(operation, candidate));
    };
    let CriterionValue::Native(Value::String(reference)) = reference else {
        return Err(QueryError::TypeMismatch {
            operation,
            expected: "string",
            found: reference.type_name(),
        });
    };
    if case_sensitive {
        return Ok(test(candidate.as_str(), reference.as_str()));
    }
    Ok(test(&candidate.to_lowercase(), &reference.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_respects_case_flag() {
        let sensitive = StartsWithEvaluation::new("name", Value::from("Ad"), true);
        assert!(sensitive.evaluate(&Value::from("Ada")).unwrap());
        assert!(!sensitive.evaluate(&Value::from("ada")).unwrap());

        let insensitive = StartsWithEvaluation::new("name", Value::from("Ad"), false);
        assert!(insensitive.evaluate(&Value::from("ada")).unwrap());
        assert!(!insensitive.evaluate(&Value::from("grace")).unwrap());
    }

    #[test]
    fn ends_with_respects_case_flag() {
        let sensitive = EndsWithEvaluation::new("name", Value::from("CE"), true);
        assert!(!sensitive.evaluate(&Value::from("grace")).unwrap());
        let insensitive = EndsWithEvaluation::new("name", Value::from("CE"), false);
        assert!(insensitive.evaluate(&Value::from("grace")).unwrap());
    }

    #[test]
    fn null_cases_come_first() {
        let null = StartsWithEvaluation::new("name", Value::Null, true);
        assert!(null.evaluate(&Value::Null).unwrap());
        assert!(!null.evaluate(&Value::from("x")).unwrap());
        let ada = EndsWithEvaluation::new("name", Value::from("a"), true);
        assert!(!ada.evaluate(&Value::Null).unwrap());
    }

    #[test]
    fn non_string_reference_is_a_type_mismatch() {
        let eval = StartsWithEvaluation::new("name", Value::from(42), true);
        assert!(matches!(
            eval.evaluate(&Value::from("42abc")),
            Err(QueryError::TypeMismatch { expected: "string", found: "int", .. })
        ));
    }

    #[test]
    fn non_string_candidate_is_unsupported() {
        let eval = EndsWithEvaluation::new("name", Value::from("a"), false);
        assert!(matches!(
            eval.evaluate(&Value::from(vec!["a"])),
            Err(QueryError::UnsupportedType { type_name: "list", .. })
        ));
    }
}
