use odb_types::{AttributeValuesMap, Oid, Value};

use crate::action::{ActionValue, ValuesAction};
use crate::error::QueryResult;

/// Counts matching candidates.
///
/// Built with [`of`](Self::of) it counts only candidates whose attribute is
/// not null.
#[derive(Clone, Debug)]
pub struct CountValueAction {
    attribute_name: String,
    alias: String,
    count: i64,
}

impl CountValueAction {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            attribute_name: String::new(),
            alias: alias.into(),
            count: 0,
        }
    }

    pub fn of(attribute_name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            alias: alias.into(),
            count: 0,
        }
    }
}

impl ValuesAction for CountValueAction {
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
        self.count = 0;
    }

    fn execute(&mut self, _oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        if self.attribute_name.is_empty() || !values.get_or_null(&self.attribute_name).is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn end(&mut self) {}

    fn value(&self) -> ActionValue {
        ActionValue::Value(Value::Int(self.count))
    }

    fn copy(&self) -> Box<dyn ValuesAction> {
        let mut copy = self.clone();
        copy.start();
        Box::new(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<AttributeValuesMap> {
        vec![
            AttributeValuesMap::new().with("email", "a@x"),
            AttributeValuesMap::new().with("email", Value::Null),
            AttributeValuesMap::new(),
        ]
    }

    #[test]
    fn counts_all_or_non_null() {
        let mut all = CountValueAction::new("n");
        let mut with_email = CountValueAction::of("email", "emails");
        for (i, row) in rows().iter().enumerate() {
            all.execute(Oid::object(i as u64 + 1), row).unwrap();
            with_email.execute(Oid::object(i as u64 + 1), row).unwrap();
        }
        assert_eq!(all.value().as_value(), Some(&Value::Int(3)));
        assert_eq!(with_email.value().as_value(), Some(&Value::Int(1)));
        assert_eq!(all.copy().value().as_value(), Some(&Value::Int(0)));
    }
}
