use odb_types::{AttributeValuesMap, Oid, Value};
use rust_decimal::Decimal;

use crate::action::{numeric_value, ActionValue, ValuesAction};
use crate::error::{QueryError, QueryResult};

/// Sum of a numeric attribute. An empty scan sums to zero.
#[derive(Clone, Debug)]
pub struct SumValueAction {
    attribute_name: String,
    alias: String,
    sum: Decimal,
}

impl SumValueAction {
    pub fn new(attribute_name: impl Into<String>) -> Self {
        let attribute_name = attribute_name.into();
        Self {
            alias: attribute_name.clone(),
            attribute_name,
            sum: Decimal::ZERO,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

impl ValuesAction for SumValueAction {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn is_multi_row(&self) -> bool {
        false
    }

    fn start(&mut self) {
        self.sum = Decimal::ZERO;
    }

    fn execute(&mut self, _oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        if let Some(value) = numeric_value("sum", values.get_or_null(&self.attribute_name))? {
            self.sum = self
                .sum
                .checked_add(value)
                .ok_or(QueryError::Overflow { operation: "sum" })?;
        }
        Ok(())
    }

    fn end(&mut self) {}

    fn value(&self) -> ActionValue {
        ActionValue::Value(Value::Decimal(self.sum))
    }

    fn copy(&self) -> Box<dyn ValuesAction> {
        Box::new(Self::new(self.attribute_name.clone()).with_alias(self.alias.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_and_skips_nulls() {
        let mut sum = SumValueAction::new("n").with_alias("total");
        sum.start();
        for (i, value) in [Value::from(2), Value::Null, Value::from(0.5)].into_iter().enumerate() {
            let row = AttributeValuesMap::new().with("n", value);
            sum.execute(Oid::object(i as u64 + 1), &row).unwrap();
        }
        sum.end();
        assert_eq!(sum.value().as_value(), Some(&Value::Decimal(Decimal::new(25, 1))));
        assert_eq!(sum.alias(), "total");
    }

    #[test]
    fn empty_scan_is_zero() {
        let mut sum = SumValueAction::new("n");
        sum.start();
        sum.end();
        assert_eq!(sum.value().as_value(), Some(&Value::Decimal(Decimal::ZERO)));
    }

    #[test]
    fn rejects_strings() {
        let mut sum = SumValueAction::new("n");
        let row = AttributeValuesMap::new().with("n", "ten");
        assert!(matches!(
            sum.execute(Oid::object(1), &row),
            Err(QueryError::UnsupportedType { operation: "sum", type_name: "string" })
        ));
    }
}
