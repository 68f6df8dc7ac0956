use std::collections::HashMap;
use std::sync::Arc;

use odb_types::Oid;

use crate::error::{CacheError, CacheResult};

/// Per-read cache of object infos whose resolution is in progress.
///
/// Scoped to one top-level read and its transitive graph. When resolution
/// of an OID starts, its (still incomplete) info is registered here; any
/// re-entrant lookup of the same OID during that read gets the same shared
/// instance back instead of resolving again, which is what terminates
/// cyclic graphs.
pub struct ReadObjectsCache<I> {
    reading: HashMap<Oid, Arc<I>>,
}

impl<I> ReadObjectsCache<I> {
    pub fn new() -> Self {
        Self {
            reading: HashMap::new(),
        }
    }

    /// `true` if resolution of `oid` has started. A null OID is never being read.
    pub fn is_reading_object_info_with_oid(&self, oid: Oid) -> bool {
        !oid.is_null() && self.reading.contains_key(&oid)
    }

    /// The in-progress info registered for `oid`, if any.
    pub fn get_object_info_by_oid(&self, oid: Oid) -> CacheResult<Option<Arc<I>>> {
        if oid.is_null() {
            return Err(CacheError::NullOid("get_object_info_by_oid"));
        }
        Ok(self.reading.get(&oid).cloned())
    }

    /// Register `info` as the in-progress info for `oid`.
    ///
    /// Only the first registration for an OID is kept; later calls during
    /// the same read are ignored.
    pub fn start_reading_object_info_with_oid(&mut self, oid: Oid, info: Arc<I>) -> CacheResult<()> {
        if oid.is_null() {
            return Err(CacheError::NullOid("start_reading_object_info_with_oid"));
        }
        self.reading.entry(oid).or_insert(info);
        Ok(())
    }

    /// Forget every in-progress info. Called when the top-level read ends.
    pub fn clear_object_infos(&mut self) {
        self.reading.clear();
    }

    pub fn len(&self) -> usize {
        self.reading.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reading.is_empty()
    }
}

impl<I> Default for ReadObjectsCache<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> std::fmt::Debug for ReadObjectsCache<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadObjectsCache")
            .field("reading", &self.reading.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;

    use odb_types::{AttributeValuesMap, ObjectInfo, ObjectInfoHeader};

    fn info(oid: u64) -> Arc<ObjectInfo> {
        Arc::new(ObjectInfo::new(
            ObjectInfoHeader::new(Oid::object(oid), Oid::class(1), 0),
            "Node",
            AttributeValuesMap::new(),
        ))
    }

    #[test]
    fn null_oid_is_never_being_read() {
        let cache: ReadObjectsCache<ObjectInfo> = ReadObjectsCache::new();
        assert!(!cache.is_reading_object_info_with_oid(Oid::null()));
        assert!(cache.get_object_info_by_oid(Oid::null()).is_err());
    }

    #[test]
    fn unknown_oid_returns_none() {
        let cache: ReadObjectsCache<ObjectInfo> = ReadObjectsCache::default();
        assert!(cache.get_object_info_by_oid(Oid::object(1)).unwrap().is_none());
    }

    #[test]
    fn first_registration_wins() {
        let mut cache = ReadObjectsCache::new();
        let first = info(1);
        let second = info(1);
        cache.start_reading_object_info_with_oid(Oid::object(1), Arc::clone(&first)).unwrap();
        let got = cache.get_object_info_by_oid(Oid::object(1)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&got, &first));

        cache.start_reading_object_info_with_oid(Oid::object(1), second).unwrap();
        let got = cache.get_object_info_by_oid(Oid::object(1)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&got, &first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut cache = ReadObjectsCache::new();
        cache.start_reading_object_info_with_oid(Oid::object(1), info(1)).unwrap();
        assert!(cache.is_reading_object_info_with_oid(Oid::object(1)));
        cache.clear_object_infos();
        assert!(cache.is_empty());
        assert!(!cache.is_reading_object_info_with_oid(Oid::object(1)));
    }

    /// A node under construction; references are filled in after registration.
    struct Resolved {
        oid: Oid,
        refs: RwLock<Vec<Arc<Resolved>>>,
    }

    fn resolve(
        oid: Oid,
        graph: &HashMap<Oid, Vec<Oid>>,
        cache: &mut ReadObjectsCache<Resolved>,
        resolutions: &mut usize,
    ) -> Arc<Resolved> {
        if let Some(existing) = cache.get_object_info_by_oid(oid).unwrap() {
            return existing;
        }
        *resolutions += 1;
        let node = Arc::new(Resolved {
            oid,
            refs: RwLock::new(Vec::new()),
        });
        cache.start_reading_object_info_with_oid(oid, Arc::clone(&node)).unwrap();
        for target in &graph[&oid] {
            let child = resolve(*target, graph, cache, resolutions);
            node.refs.write().unwrap().push(child);
        }
        node
    }

    #[test]
    fn cyclic_graph_resolves_each_oid_once() {
        let a = Oid::object(1);
        let b = Oid::object(2);
        let graph: HashMap<Oid, Vec<Oid>> = [(a, vec![b]), (b, vec![a])].into_iter().collect();

        let mut cache = ReadObjectsCache::new();
        let mut resolutions = 0;
        let root = resolve(a, &graph, &mut cache, &mut resolutions);
        cache.clear_object_infos();

        assert_eq!(resolutions, 2);
        let b_node = Arc::clone(&root.refs.read().unwrap()[0]);
        assert_eq!(b_node.oid, b);
        let back = Arc::clone(&b_node.refs.read().unwrap()[0]);
        assert!(Arc::ptr_eq(&back, &root));
    }
}
