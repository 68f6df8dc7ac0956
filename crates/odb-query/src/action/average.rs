use odb_types::{AttributeValuesMap, Oid, Value};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::action::{numeric_value, ActionValue, ValuesAction};
use crate::config::QueryConfig;
use crate::error::{QueryError, QueryResult};

/// Mean of a numeric attribute, rounded half-to-even at `end`.
#[derive(Clone, Debug)]
pub struct AverageValueAction {
    attribute_name: String,
    alias: String,
    scale: u32,
    sum: Decimal,
    count: u64,
    result: Value,
}

impl AverageValueAction {
    pub fn new(attribute_name: impl Into<String>, config: &QueryConfig) -> Self {
        let attribute_name = attribute_name.into();
        Self {
            alias: attribute_name.clone(),
            attribute_name,
            scale: config.average_scale,
            sum: Decimal::ZERO,
            count: 0,
            result: Value::Null,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Number of non-null values seen in the current scan.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl ValuesAction for AverageValueAction {
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
        self.count = 0;
        self.result = Value::Null;
    }

    fn execute(&mut self, _oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        let Some(value) = numeric_value("average", values.get_or_null(&self.attribute_name))? else {
            return Ok(());
        };
        self.sum = self
            .sum
            .checked_add(value)
            .ok_or(QueryError::Overflow { operation: "average" })?;
        self.count += 1;
        Ok(())
    }

    fn end(&mut self) {
        if self.count == 0 {
            self.result = Value::Null;
            return;
        }
        self.result = self
            .sum
            .checked_div(Decimal::from(self.count))
            .map_or(Value::Null, |mean| {
                Value::Decimal(mean.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointNearestEven))
            });
    }

    fn value(&self) -> ActionValue {
        ActionValue::Value(self.result.clone())
    }

    fn copy(&self) -> Box<dyn ValuesAction> {
        let mut copy = self.clone();
        copy.start();
        Box::new(copy)
    }
}
