use std::fmt;
use std::sync::Arc;

use odb_types::{AttributeValuesMap, Oid, Value};

use crate::action::{ActionValue, LazyList, ValuesAction};
use crate::engine::QueryEngine;
use crate::error::QueryResult;

/// Projects one attribute of each candidate as is.
///
/// Collection values are handed out as a [`LazyList`] so that referenced
/// objects are only materialized when read.
#[derive(Clone)]
pub struct FieldValueAction {
    attribute_name: String,
    alias: String,
    engine: Arc<dyn QueryEngine>,
    value: ActionValue,
}

impl FieldValueAction {
    pub fn new(attribute_name: impl Into<String>, engine: Arc<dyn QueryEngine>) -> Self {
        let attribute_name = attribute_name.into();
        Self {
            alias: attribute_name.clone(),
            attribute_name,
            engine,
            value: ActionValue::Value(Value::Null),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

impl ValuesAction for FieldValueAction {
    fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn is_multi_row(&self) -> bool {
        true
    }

    fn start(&mut self) {
        self.value = ActionValue::Value(Value::Null);
    }

    fn execute(&mut self, _oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        self.value = match values.get_or_null(&self.attribute_name) {
            Value::List(items) => ActionValue::List(LazyList::new(items.clone(), Arc::clone(&self.engine))),
            other => ActionValue::Value(other.clone()),
        };
        Ok(())
    }

    fn end(&mut self) {}

    fn value(&self) -> ActionValue {
        self.value.clone()
    }

    fn copy(&self) -> Box<dyn ValuesAction> {
        Box::new(Self::new(self.attribute_name.clone(), Arc::clone(&self.engine)).with_alias(self.alias.clone()))
    }
}

impl fmt::Debug for FieldValueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldValueAction")
            .field("attribute_name", &self.attribute_name)
            .field("alias", &self.alias)
            .field("value", &self.value)
            .finish()
    }
}
