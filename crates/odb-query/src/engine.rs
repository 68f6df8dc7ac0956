use std::collections::HashMap;
use std::sync::RwLock;

use odb_cache::OdbCache;
use odb_types::{AttributeValuesMap, ObjectInfo, ObjectInfoHeader, ObjectRef, Oid, Value};
use tracing::debug;

use crate::error::{QueryError, QueryResult};

/// Introspection service the query layer runs against.
///
/// Implementations own identity (object ↔ OID) and know how to present a
/// stored object as an [`AttributeValuesMap`].
pub trait QueryEngine: Send + Sync {
    /// The OID of a live object.
    ///
    /// If the object has none, a fresh OID is assigned when
    /// `create_if_absent` is set; otherwise the null OID is returned.
    fn object_id(&self, object: &ObjectRef, create_if_absent: bool) -> QueryResult<Oid>;

    /// Materialize the object stored under `oid`, or `Value::Null` if there
    /// is none.
    fn object_from_oid(&self, oid: Oid) -> QueryResult<Value>;

    /// The header of `oid`, or `None` if it does not exist or was deleted.
    fn object_header(&self, oid: Oid) -> QueryResult<Option<ObjectInfoHeader>>;

    /// The values of the attributes `names` of the object behind `header`,
    /// in class order. An empty `names` selects every attribute.
    fn attribute_values(&self, header: &ObjectInfoHeader, names: &[String]) -> QueryResult<AttributeValuesMap>;
}

// ---------------------------------------------------------------------------
// InMemoryEngine
// ---------------------------------------------------------------------------

/// In-memory query engine.
///
/// Intended for tests and embedding. Identity, headers and positions are
/// kept in an [`OdbCache`]; attribute values are held next to it. Objects of
/// a class are chained through their headers in insertion order.
pub struct InMemoryEngine {
    inner: RwLock<EngineState>,
}

struct EngineState {
    cache: OdbCache,
    attributes: HashMap<Oid, (String, AttributeValuesMap)>,
    natives: HashMap<Oid, Value>,
    classes: HashMap<String, ClassEntry>,
    next_id: u64,
}

#[derive(Clone, Copy)]
struct ClassEntry {
    oid: Oid,
    first: Oid,
    last: Oid,
}

impl EngineState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn class_entry(&mut self, class_name: &str) -> ClassEntry {
        if let Some(entry) = self.classes.get(class_name) {
            return *entry;
        }
        let entry = ClassEntry {
            oid: Oid::class(self.allocate()),
            first: Oid::null(),
            last: Oid::null(),
        };
        self.classes.insert(class_name.to_string(), entry);
        entry
    }

    fn header(&self, oid: Oid) -> QueryResult<ObjectInfoHeader> {
        self.cache
            .get_object_info_header_by_oid(oid)
            .cloned()
            .ok_or_else(|| QueryError::Engine(format!("no header for {oid}")))
    }

    fn set_native(&mut self, oid: Oid, native: Option<Value>) {
        match native {
            Some(value) => self.natives.insert(oid, value),
            None => self.natives.remove(&oid),
        };
    }

    fn relink(&mut self, oid: Oid, previous: Option<Oid>, next: Option<Oid>) -> QueryResult<()> {
        if oid.is_null() {
            return Ok(());
        }
        let mut header = self.header(oid)?;
        if let Some(previous) = previous {
            header.previous_object_oid = previous;
        }
        if let Some(next) = next {
            header.next_object_oid = next;
        }
        self.cache.add_object_info_of_non_commited_object(header)?;
        Ok(())
    }
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(EngineState {
                cache: OdbCache::new(),
                attributes: HashMap::new(),
                natives: HashMap::new(),
                classes: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Store `object` as an instance of `class_name`, or replace its
    /// attributes if it is already stored. Returns its OID.
    pub fn store(&self, class_name: &str, object: ObjectRef, attributes: AttributeValuesMap) -> QueryResult<Oid> {
        self.insert(class_name, object, attributes, None)
    }

    /// Store a native value such as a collection or a string as an object
    /// of its own. [`QueryEngine::object_from_oid`] returns the value itself
    /// rather than an object info.
    pub fn store_native(&self, class_name: &str, object: ObjectRef, value: Value) -> QueryResult<Oid> {
        self.insert(class_name, object, AttributeValuesMap::new(), Some(value))
    }

    fn insert(
        &self,
        class_name: &str,
        object: ObjectRef,
        attributes: AttributeValuesMap,
        native: Option<Value>,
    ) -> QueryResult<Oid> {
        let mut state = self.inner.write().expect("lock poisoned");
        if let Some(oid) = state.cache.get_oid(&object) {
            state.attributes.insert(oid, (class_name.to_string(), attributes));
            state.set_native(oid, native);
            state.cache.add_oid_to_unconnected_zone(oid);
            return Ok(oid);
        }
        let oid = match state.cache.id_of_inserting_object(&object) {
            Some(oid) => oid,
            None => Oid::object(state.allocate()),
        };
        let mut class = state.class_entry(class_name);
        let position = i64::try_from(oid.id())
            .map_err(|_| QueryError::Engine(format!("{oid} has no valid position")))?;
        let header =
            ObjectInfoHeader::new(oid, class.oid, position).with_links(class.last, Oid::null());
        state.relink(class.last, None, Some(oid))?;
        state.cache.add_object(oid, object, header)?;
        state.cache.save_position_of_object_with_oid(oid, position)?;
        state.cache.add_oid_to_unconnected_zone(oid);
        state.attributes.insert(oid, (class_name.to_string(), attributes));
        state.set_native(oid, native);

        if class.first.is_null() {
            class.first = oid;
        }
        class.last = oid;
        state.classes.insert(class_name.to_string(), class);
        debug!(%oid, class = class_name, "object stored");
        Ok(oid)
    }

    /// Delete the object stored under `oid`. Returns `false` if there is none.
    pub fn delete(&self, oid: Oid) -> QueryResult<bool> {
        let mut state = self.inner.write().expect("lock poisoned");
        let Some((class_name, _)) = state.attributes.remove(&oid) else {
            return Ok(false);
        };
        state.natives.remove(&oid);
        let header = state.header(oid)?;
        let (previous, next) = (header.previous_object_oid, header.next_object_oid);
        state.relink(previous, None, Some(next))?;
        state.relink(next, Some(previous), None)?;
        if let Some(class) = state.classes.get_mut(&class_name) {
            if class.first == oid {
                class.first = next;
            }
            if class.last == oid {
                class.last = previous;
            }
        }
        state.cache.remove_object_by_oid(oid);
        state.cache.mark_id_as_deleted(oid);
        debug!(%oid, "object deleted");
        Ok(true)
    }

    /// OID of the first stored object of `class_name`, null if there is none.
    pub fn first_of_class(&self, class_name: &str) -> Oid {
        let state = self.inner.read().expect("lock poisoned");
        state
            .classes
            .get(class_name)
            .map_or_else(Oid::null, |class| class.first)
    }

    /// End the current transaction.
    pub fn commit(&self) {
        let mut state = self.inner.write().expect("lock poisoned");
        state.cache.clear_on_commit();
        state.cache.clear_inserting_objects();
    }

    /// `true` if `oid` was stored or changed since the last commit.
    pub fn is_uncommitted(&self, oid: Oid) -> bool {
        !self.inner.read().expect("lock poisoned").cache.is_in_commited_zone(oid)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").attributes.len()
    }

    /// Returns `true` if no object is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine for InMemoryEngine {
    fn object_id(&self, object: &ObjectRef, create_if_absent: bool) -> QueryResult<Oid> {
        let mut state = self.inner.write().expect("lock poisoned");
        if let Some(oid) = state.cache.get_oid(object) {
            return Ok(oid);
        }
        if let Some(oid) = state.cache.id_of_inserting_object(object) {
            return Ok(oid);
        }
        if !create_if_absent {
            return Ok(Oid::null());
        }
        let oid = Oid::object(state.allocate());
        state.cache.start_inserting_object_with_oid(object, oid);
        Ok(oid)
    }

    fn object_from_oid(&self, oid: Oid) -> QueryResult<Value> {
        let state = self.inner.read().expect("lock poisoned");
        if oid.is_null() || state.cache.is_deleted(oid) {
            return Ok(Value::Null);
        }
        if let Some(native) = state.natives.get(&oid) {
            return Ok(native.clone());
        }
        let Some((class_name, attributes)) = state.attributes.get(&oid) else {
            return Ok(Value::Null);
        };
        let header = state.header(oid)?;
        Ok(Value::from(ObjectInfo::new(header, class_name.clone(), attributes.clone())))
    }

    fn object_header(&self, oid: Oid) -> QueryResult<Option<ObjectInfoHeader>> {
        let state = self.inner.read().expect("lock poisoned");
        if oid.is_null() || state.cache.is_deleted(oid) {
            return Ok(None);
        }
        Ok(state.cache.get_object_info_header_by_oid(oid).cloned())
    }

    fn attribute_values(&self, header: &ObjectInfoHeader, names: &[String]) -> QueryResult<AttributeValuesMap> {
        let state = self.inner.read().expect("lock poisoned");
        let (_, attributes) = state
            .attributes
            .get(&header.oid)
            .ok_or_else(|| QueryError::Engine(format!("no attributes for {}", header.oid)))?;
        if names.is_empty() {
            return Ok(attributes.clone());
        }
        Ok(attributes
            .iter()
            .filter(|(name, _)| names.iter().any(|wanted| wanted.as_str() == *name))
            .map(|(name, value)| (name, value.clone()))
            .collect())
    }
}

impl std::fmt::Debug for InMemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read().expect("lock poisoned");
        f.debug_struct("InMemoryEngine")
            .field("objects", &state.attributes.len())
            .field("classes", &state.classes.len())
            .field("cache", &state.cache)
            .finish()
    }
}
