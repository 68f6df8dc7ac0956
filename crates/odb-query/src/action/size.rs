use std::fmt;
use std::sync::Arc;

use odb_types::{AttributeValuesMap, Oid, Value};

use crate::action::{ActionValue, ValuesAction};
use crate::engine::QueryEngine;
use crate::error::{QueryError, QueryResult};

/// Size of a string or collection attribute, per candidate.
///
/// Strings count characters, lists count elements and maps count entries.
/// An OID is resolved through the engine and the resulting value measured.
#[derive(Clone)]
pub struct SizeValueAction {
    attribute_name: String,
    alias: String,
    engine: Arc<dyn QueryEngine>,
    size: i64,
}

impl SizeValueAction {
    pub fn new(attribute_name: impl Into<String>, engine: Arc<dyn QueryEngine>) -> Self {
        let attribute_name = attribute_name.into();
        Self {
            alias: attribute_name.clone(),
            attribute_name,
            engine,
            size: 0,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

fn size_of(value: &Value) -> QueryResult<i64> {
    let size = match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => return Err(QueryError::unsupported("size", other)),
    };
    i64::try_from(size).map_err(|_| QueryError::Overflow { operation: "size" })
}

impl ValuesAction for SizeValueAction {
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
        self.size = 0;
    }

    fn execute(&mut self, _oid: Oid, values: &AttributeValuesMap) -> QueryResult<()> {
        self.size = match values.get_or_null(&self.attribute_name) {
            Value::Oid(oid) => size_of(&self.engine.object_from_oid(*oid)?)?,
            other => size_of(other)?,
        };
        Ok(())
    }

    fn end(&mut self) {}

    fn value(&self) -> ActionValue {
        ActionValue::Value(Value::Int(self.size))
    }

    fn copy(&self) -> Box<dyn ValuesAction> {
        Box::new(Self::new(self.attribute_name.clone(), Arc::clone(&self.engine)).with_alias(self.alias.clone()))
    }
}

impl fmt::Debug for SizeValueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizeValueAction")
            .field("attribute_name", &self.attribute_name)
            .field("alias", &self.alias)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odb_types::ObjectRef;

    use crate::engine::InMemoryEngine;

    fn size(engine: Arc<dyn QueryEngine>, value: impl Into<Value>) -> QueryResult<Value> {
        let mut action = SizeValueAction::new("v", engine);
        action.start();
        action.execute(Oid::object(1), &AttributeValuesMap::new().with("v", value))?;
        action.end();
        Ok(action.value().as_value().cloned().unwrap_or(Value::Null))
    }

    #[test]
    fn measures_strings_and_collections() {
        let engine: Arc<dyn QueryEngine> = Arc::new(InMemoryEngine::new());
        assert_eq!(size(Arc::clone(&engine), "héllo").unwrap(), Value::Int(5));
        assert_eq!(size(Arc::clone(&engine), vec![1, 2, 3]).unwrap(), Value::Int(3));
        assert_eq!(size(Arc::clone(&engine), AttributeValuesMap::new().with("a", 1)).unwrap(), Value::Int(1));
        assert_eq!(size(engine, Value::Null).unwrap(), Value::Int(0));
    }

    #[test]
    fn resolves_oids_through_engine() {
        let engine = Arc::new(InMemoryEngine::new());
        let list: ObjectRef = Arc::new(vec!["a", "b"]);
        let oid = engine.store_native("List", list, Value::from(vec!["a", "b"])).unwrap();
        assert_eq!(size(engine, oid).unwrap(), Value::Int(2));
    }

    #[test]
    fn rejects_other_types() {
        let engine: Arc<dyn QueryEngine> = Arc::new(InMemoryEngine::new());
        assert!(matches!(
            size(Arc::clone(&engine), 42),
            Err(QueryError::UnsupportedType { operation: "size", type_name: "int" })
        ));

        let stored = Arc::new(InMemoryEngine::new());
        let person: ObjectRef = Arc::new(1u8);
        let oid = stored.store("Person", person, AttributeValuesMap::new()).unwrap();
        assert!(matches!(
            size(stored, oid),
            Err(QueryError::UnsupportedType { type_name: "object", .. })
        ));
    }
}
