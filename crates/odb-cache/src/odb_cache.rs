//! The per-session identity cache.
//!
//! [`OdbCache`] keeps four coordinated maps plus two transaction-scoped
//! tables:
//!
//! - object -> OID and OID -> object, strict inverses of each other
//! - OID -> [`ObjectInfoHeader`], maintained independently
//! - OID -> [`IdInfo`] (position and active/deleted status)
//! - per-type "objects being inserted" table, for write-side cycles
//! - the unconnected zone: OIDs created or modified in the open transaction
//!
//! # Invariants
//!
//! - An object is never present without its OID -> object entry; the OID
//!   side may exist alone once the object is dropped from the cache.
//! - Both identity maps change only through `link` and `unlink`.
//! - Identity and header maps survive commit; positions and the
//!   unconnected zone do not.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use odb_types::{type_tag, IdInfo, ObjectInfoHeader, ObjectKey, ObjectRef, Oid};

use crate::error::{CacheError, CacheResult};
use crate::position::ObjectPosition;

/// Position recorded for an OID deleted before its position was cached.
const UNKNOWN_POSITION: i64 = -1;

/// An object whose insertion is in progress, pinned so its key stays valid.
struct InsertingObject {
    _object: ObjectRef,
    oid: Oid,
}

/// Long-lived session cache mapping objects, OIDs, headers and positions.
#[derive(Default)]
pub struct OdbCache {
    oid_by_object: HashMap<ObjectKey, Oid>,
    object_by_oid: HashMap<Oid, ObjectRef>,
    header_by_oid: HashMap<Oid, ObjectInfoHeader>,
    id_infos: HashMap<Oid, IdInfo>,
    inserting_objects: HashMap<TypeId, HashMap<ObjectKey, InsertingObject>>,
    unconnected_zone: HashSet<Oid>,
}

impl OdbCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Identity maps
    // ---------------------------------------------------------------

    /// Cache an object with its OID and header.
    ///
    /// Replaces whatever was cached for `oid` before. If `object` was cached
    /// under a different OID, that stale mapping is dropped.
    pub fn add_object(
        &mut self,
        oid: Oid,
        object: ObjectRef,
        header: ObjectInfoHeader,
    ) -> CacheResult<()> {
        if oid.is_null() {
            return Err(CacheError::NullOid("add_object"));
        }
        self.link(oid, object);
        self.header_by_oid.insert(oid, header);
        Ok(())
    }

    /// Cache the header of an object whose insertion is not committed yet.
    pub fn add_object_info_of_non_commited_object(
        &mut self,
        header: ObjectInfoHeader,
    ) -> CacheResult<()> {
        if header.oid.is_null() {
            return Err(CacheError::NullOid("add_object_info_of_non_commited_object"));
        }
        if header.class_info_id.is_null() {
            return Err(CacheError::MissingClassInfoId(header.oid));
        }
        self.header_by_oid.insert(header.oid, header);
        Ok(())
    }

    /// Remove every trace of `oid`: identity, header, position and its
    /// membership in the unconnected zone. Unknown OIDs are a no-op.
    pub fn remove_object_by_oid(&mut self, oid: Oid) {
        self.unlink(oid);
        self.header_by_oid.remove(&oid);
        self.id_infos.remove(&oid);
        self.unconnected_zone.remove(&oid);
    }

    /// Remove a cached object and everything known about its OID.
    pub fn remove_object(&mut self, object: &ObjectRef) {
        if let Some(oid) = self.oid_by_object.get(&ObjectKey::of(object)).copied() {
            self.remove_object_by_oid(oid);
        }
    }

    pub fn get_object(&self, oid: Oid) -> Option<ObjectRef> {
        self.object_by_oid.get(&oid).cloned()
    }

    /// The cached object for `oid`, downcast to its concrete type.
    pub fn get_object_as<T: Send + Sync + 'static>(&self, oid: Oid) -> Option<Arc<T>> {
        self.get_object(oid)
            .and_then(|object| object.downcast::<T>().ok())
    }

    pub fn get_oid(&self, object: &ObjectRef) -> Option<Oid> {
        self.oid_by_object.get(&ObjectKey::of(object)).copied()
    }

    pub fn exists_object(&self, object: &ObjectRef) -> bool {
        self.oid_by_object.contains_key(&ObjectKey::of(object))
    }

    pub fn get_object_info_header_by_oid(&self, oid: Oid) -> Option<&ObjectInfoHeader> {
        self.header_by_oid.get(&oid)
    }

    pub fn get_object_info_header_by_object(
        &self,
        object: &ObjectRef,
    ) -> Option<&ObjectInfoHeader> {
        self.get_oid(object)
            .and_then(|oid| self.header_by_oid.get(&oid))
    }

    // ---------------------------------------------------------------
    // Positions
    // ---------------------------------------------------------------

    /// Record that `oid` is active at `position`.
    pub fn save_position_of_object_with_oid(&mut self, oid: Oid, position: i64) -> CacheResult<()> {
        if oid.is_null() {
            return Err(CacheError::NullOid("save_position_of_object_with_oid"));
        }
        self.id_infos.insert(oid, IdInfo::active(position));
        Ok(())
    }

    /// Mark `oid` as deleted, keeping any known position.
    pub fn mark_id_as_deleted(&mut self, oid: Oid) {
        self.id_infos
            .entry(oid)
            .and_modify(|info| *info = IdInfo::deleted(info.position))
            .or_insert_with(|| IdInfo::deleted(UNKNOWN_POSITION));
    }

    /// `true` iff a position record exists for `oid` with deleted status.
    pub fn is_deleted(&self, oid: Oid) -> bool {
        self.id_infos.get(&oid).is_some_and(IdInfo::is_deleted)
    }

    /// Look up the cached position of `oid`.
    ///
    /// The null OID never has a position; looking it up is an invariant
    /// violation and fails with [`CacheError::NullOid`].
    pub fn get_object_position_by_oid(&self, oid: Oid) -> CacheResult<ObjectPosition> {
        if oid.is_null() {
            return Err(CacheError::NullOid("get_object_position_by_oid"));
        }
        Ok(match self.id_infos.get(&oid) {
            None => ObjectPosition::NotInCache,
            Some(info) if info.is_deleted() => ObjectPosition::Deleted,
            Some(info) => ObjectPosition::Found(info.position),
        })
    }

    // ---------------------------------------------------------------
    // Objects being inserted
    // ---------------------------------------------------------------

    /// Register an object whose insertion has started.
    ///
    /// The first registration wins; registering the same object again before
    /// [`update_id_of_inserting_object`](Self::update_id_of_inserting_object)
    /// keeps the original OID.
    pub fn start_inserting_object_with_oid(&mut self, object: &ObjectRef, oid: Oid) {
        self.inserting_objects
            .entry(type_tag(object))
            .or_default()
            .entry(ObjectKey::of(object))
            .or_insert_with(|| InsertingObject {
                _object: Arc::clone(object),
                oid,
            });
    }

    /// Set the OID of an object being inserted, registering it if needed.
    pub fn update_id_of_inserting_object(&mut self, object: &ObjectRef, oid: Oid) {
        self.inserting_objects
            .entry(type_tag(object))
            .or_default()
            .entry(ObjectKey::of(object))
            .and_modify(|entry| entry.oid = oid)
            .or_insert_with(|| InsertingObject {
                _object: Arc::clone(object),
                oid,
            });
    }

    /// The OID assigned to an object still being inserted, if any.
    pub fn id_of_inserting_object(&self, object: &ObjectRef) -> Option<Oid> {
        self.inserting_objects
            .get(&type_tag(object))
            .and_then(|table| table.get(&ObjectKey::of(object)))
            .map(|entry| entry.oid)
    }

    /// Forget all objects being inserted, for every type.
    pub fn clear_inserting_objects(&mut self) {
        self.inserting_objects.clear();
    }

    // ---------------------------------------------------------------
    // Transaction boundary
    // ---------------------------------------------------------------

    pub fn add_oid_to_unconnected_zone(&mut self, oid: Oid) {
        self.unconnected_zone.insert(oid);
    }

    /// `true` unless `oid` was created or modified in the open transaction.
    pub fn is_in_commited_zone(&self, oid: Oid) -> bool {
        !self.unconnected_zone.contains(&oid)
    }

    /// Reset transaction-scoped state after a commit or rollback.
    ///
    /// Only positions and the unconnected zone are cleared; identity and
    /// header caching outlive the transaction.
    pub fn clear_on_commit(&mut self) {
        debug!(
            positions = self.id_infos.len(),
            unconnected = self.unconnected_zone.len(),
            "cache cleared on commit"
        );
        self.id_infos.clear();
        self.unconnected_zone.clear();
    }

    /// Clear everything. With `release`, the backing maps are dropped as
    /// well, which is what a closing session wants.
    pub fn clear(&mut self, release: bool) {
        debug!(objects = self.object_by_oid.len(), release, "cache cleared");
        if release {
            *self = Self::new();
            return;
        }
        self.oid_by_object.clear();
        self.object_by_oid.clear();
        self.header_by_oid.clear();
        self.id_infos.clear();
        self.inserting_objects.clear();
        self.unconnected_zone.clear();
    }

    // ---------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------

    pub fn number_of_objects(&self) -> usize {
        self.object_by_oid.len()
    }

    pub fn number_of_object_headers(&self) -> usize {
        self.header_by_oid.len()
    }

    pub fn number_of_positions(&self) -> usize {
        self.id_infos.len()
    }

    pub fn unconnected_zone_len(&self) -> usize {
        self.unconnected_zone.len()
    }

    /// OIDs of all cached objects, sorted.
    pub fn oids(&self) -> Vec<Oid> {
        let mut oids: Vec<Oid> = self.object_by_oid.keys().copied().collect();
        oids.sort();
        oids
    }

    // ---------------------------------------------------------------
    // Internal
    // ---------------------------------------------------------------

    fn link(&mut self, oid: Oid, object: ObjectRef) {
        let key = ObjectKey::of(&object);
        if let Some(previous) = self.object_by_oid.insert(oid, object) {
            let previous_key = ObjectKey::of(&previous);
            if previous_key != key {
                self.oid_by_object.remove(&previous_key);
            }
        }
        if let Some(previous_oid) = self.oid_by_object.insert(key, oid) {
            if previous_oid != oid {
                self.object_by_oid.remove(&previous_oid);
            }
        }
    }

    fn unlink(&mut self, oid: Oid) {
        if let Some(object) = self.object_by_oid.remove(&oid) {
            self.oid_by_object.remove(&ObjectKey::of(&object));
        }
    }
}

impl std::fmt::Debug for OdbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdbCache")
            .field("objects", &self.object_by_oid.len())
            .field("headers", &self.header_by_oid.len())
            .field("positions", &self.id_infos.len())
            .field("inserting_types", &self.inserting_objects.len())
            .field("unconnected", &self.unconnected_zone.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, PartialEq)]
    struct Person {
        name: String,
    }

    fn person(name: &str) -> ObjectRef {
        Arc::new(Person {
            name: name.to_string(),
        })
    }

    fn header(oid: u64) -> ObjectInfoHeader {
        ObjectInfoHeader::new(Oid::object(oid), Oid::class(1), oid as i64 * 100)
    }

    // -----------------------------------------------------------------------
    // Identity maps
    // -----------------------------------------------------------------------

    #[test]
    fn add_object_populates_all_lookups() {
        let mut cache = OdbCache::new();
        let obj = person("ada");
        cache.add_object(Oid::object(1), Arc::clone(&obj), header(1)).unwrap();

        assert!(Arc::ptr_eq(&cache.get_object(Oid::object(1)).unwrap(), &obj));
        assert_eq!(cache.get_oid(&obj), Some(Oid::object(1)));
        assert_eq!(cache.get_object_info_header_by_oid(Oid::object(1)), Some(&header(1)));
        assert_eq!(cache.get_object_info_header_by_object(&obj), Some(&header(1)));
        assert!(cache.exists_object(&obj));
    }

    #[test]
    fn add_object_rejects_null_oid() {
        let mut cache = OdbCache::new();
        let err = cache.add_object(Oid::null(), person("x"), header(1)).unwrap_err();
        assert_eq!(err, CacheError::NullOid("add_object"));
        assert_eq!(cache.number_of_objects(), 0);
    }

    #[test]
    fn add_object_overwrites_previous_entry() {
        let mut cache = OdbCache::new();
        let old = person("old");
        let new = person("new");
        cache.add_object(Oid::object(1), Arc::clone(&old), header(1)).unwrap();
        cache.add_object(Oid::object(1), Arc::clone(&new), header(1)).unwrap();

        assert!(Arc::ptr_eq(&cache.get_object(Oid::object(1)).unwrap(), &new));
        assert_eq!(cache.get_oid(&old), None);
        assert_eq!(cache.get_oid(&new), Some(Oid::object(1)));
        assert_eq!(cache.number_of_objects(), 1);
    }

    #[test]
    fn re_adding_object_under_new_oid_drops_stale_oid() {
        let mut cache = OdbCache::new();
        let obj = person("moved");
        cache.add_object(Oid::object(1), Arc::clone(&obj), header(1)).unwrap();
        cache.add_object(Oid::object(2), Arc::clone(&obj), header(2)).unwrap();

        assert_eq!(cache.get_oid(&obj), Some(Oid::object(2)));
        assert!(cache.get_object(Oid::object(1)).is_none());
        assert_eq!(cache.number_of_objects(), 1);
    }

    #[test]
    fn typed_lookup_downcasts() {
        let mut cache = OdbCache::new();
        cache.add_object(Oid::object(4), person("grace"), header(4)).unwrap();
        let p = cache.get_object_as::<Person>(Oid::object(4)).unwrap();
        assert_eq!(p.name, "grace");
        assert!(cache.get_object_as::<String>(Oid::object(4)).is_none());
    }

    #[test]
    fn non_commited_header_requires_class_info_id() {
        let mut cache = OdbCache::new();
        let no_class = ObjectInfoHeader::new(Oid::object(3), Oid::null(), 0);
        assert_eq!(
            cache.add_object_info_of_non_commited_object(no_class),
            Err(CacheError::MissingClassInfoId(Oid::object(3)))
        );

        cache.add_object_info_of_non_commited_object(header(3)).unwrap();
        assert_eq!(cache.get_object_info_header_by_oid(Oid::object(3)), Some(&header(3)));
        // Header-only entries never create an identity mapping.
        assert!(cache.get_object(Oid::object(3)).is_none());
    }

    #[test]
    fn remove_by_oid_clears_every_map() {
        let mut cache = OdbCache::new();
        let obj = person("gone");
        let oid = Oid::object(5);
        cache.add_object(oid, Arc::clone(&obj), header(5)).unwrap();
        cache.save_position_of_object_with_oid(oid, 500).unwrap();
        cache.add_oid_to_unconnected_zone(oid);

        cache.remove_object_by_oid(oid);

        assert!(cache.get_object(oid).is_none());
        assert!(cache.get_oid(&obj).is_none());
        assert!(cache.get_object_info_header_by_oid(oid).is_none());
        assert_eq!(cache.get_object_position_by_oid(oid), Ok(ObjectPosition::NotInCache));
        assert!(cache.is_in_commited_zone(oid));

        // Second removal is a no-op.
        cache.remove_object_by_oid(oid);
    }

    #[test]
    fn remove_by_object_is_guarded() {
        let mut cache = OdbCache::new();
        let kept = person("kept");
        cache.add_object(Oid::object(1), Arc::clone(&kept), header(1)).unwrap();

        cache.remove_object(&person("stranger"));
        assert_eq!(cache.number_of_objects(), 1);

        cache.remove_object(&kept);
        assert_eq!(cache.number_of_objects(), 0);
        assert_eq!(cache.number_of_object_headers(), 0);
    }

    // -----------------------------------------------------------------------
    // Positions
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_oid_is_not_in_cache() {
        let cache = OdbCache::new();
        assert_eq!(
            cache.get_object_position_by_oid(Oid::object(77)),
            Ok(ObjectPosition::NotInCache)
        );
        assert!(!cache.is_deleted(Oid::object(77)));
    }

    #[test]
    fn position_lookup_rejects_null_oid() {
        let mut cache = OdbCache::new();
        let expected = Err(CacheError::NullOid("get_object_position_by_oid"));
        assert_eq!(cache.get_object_position_by_oid(Oid::null()), expected);
        // a deleted mark on the null OID does not turn it into a position
        cache.mark_id_as_deleted(Oid::null());
        assert_eq!(cache.get_object_position_by_oid(Oid::null()), expected);
    }

    #[test]
    fn saved_position_is_found() {
        let mut cache = OdbCache::new();
        cache.save_position_of_object_with_oid(Oid::object(2), 4096).unwrap();
        let pos = cache.get_object_position_by_oid(Oid::object(2)).unwrap();
        assert_eq!(pos, ObjectPosition::Found(4096));
        assert_eq!(pos.position(), Some(4096));
    }

    #[test]
    fn mark_deleted_without_prior_position() {
        let mut cache = OdbCache::new();
        cache.mark_id_as_deleted(Oid::object(8));
        assert!(cache.is_deleted(Oid::object(8)));
        assert_eq!(
            cache.get_object_position_by_oid(Oid::object(8)),
            Ok(ObjectPosition::Deleted)
        );
    }

    #[test]
    fn mark_deleted_after_position_and_twice() {
        let mut cache = OdbCache::new();
        cache.save_position_of_object_with_oid(Oid::object(8), 80).unwrap();
        cache.mark_id_as_deleted(Oid::object(8));
        cache.mark_id_as_deleted(Oid::object(8));
        assert!(cache.is_deleted(Oid::object(8)));
        assert!(cache
            .get_object_position_by_oid(Oid::object(8))
            .unwrap()
            .is_deleted());
    }

    // -----------------------------------------------------------------------
    // Objects being inserted
    // -----------------------------------------------------------------------

    #[test]
    fn first_inserting_registration_wins_until_updated() {
        let mut cache = OdbCache::new();
        let obj = person("cyclic");
        cache.start_inserting_object_with_oid(&obj, Oid::null());
        cache.start_inserting_object_with_oid(&obj, Oid::object(9));
        assert_eq!(cache.id_of_inserting_object(&obj), Some(Oid::null()));

        cache.update_id_of_inserting_object(&obj, Oid::object(9));
        assert_eq!(cache.id_of_inserting_object(&obj), Some(Oid::object(9)));
    }

    #[test]
    fn inserting_tables_are_segmented_by_type() {
        let mut cache = OdbCache::new();
        let p = person("p");
        let s: ObjectRef = Arc::new(String::from("s"));
        cache.start_inserting_object_with_oid(&p, Oid::object(1));
        cache.start_inserting_object_with_oid(&s, Oid::object(2));

        assert_eq!(cache.id_of_inserting_object(&p), Some(Oid::object(1)));
        assert_eq!(cache.id_of_inserting_object(&s), Some(Oid::object(2)));
        assert_eq!(cache.id_of_inserting_object(&person("other")), None);

        cache.clear_inserting_objects();
        assert_eq!(cache.id_of_inserting_object(&p), None);
    }

    // -----------------------------------------------------------------------
    // Transaction boundary
    // -----------------------------------------------------------------------

    #[test]
    fn unconnected_zone_membership() {
        let mut cache = OdbCache::new();
        assert!(cache.is_in_commited_zone(Oid::object(1)));
        cache.add_oid_to_unconnected_zone(Oid::object(1));
        assert!(!cache.is_in_commited_zone(Oid::object(1)));
        assert_eq!(cache.unconnected_zone_len(), 1);
    }

    #[test]
    fn clear_on_commit_keeps_identity() {
        let mut cache = OdbCache::new();
        let obj = person("survivor");
        let oid = Oid::object(3);
        cache.add_object(oid, Arc::clone(&obj), header(3)).unwrap();
        cache.save_position_of_object_with_oid(oid, 300).unwrap();
        cache.add_oid_to_unconnected_zone(oid);

        cache.clear_on_commit();

        assert!(cache.is_in_commited_zone(oid));
        assert_eq!(cache.get_object_position_by_oid(oid), Ok(ObjectPosition::NotInCache));
        assert!(Arc::ptr_eq(&cache.get_object(oid).unwrap(), &obj));
        assert_eq!(cache.get_oid(&obj), Some(oid));
        assert_eq!(cache.get_object_info_header_by_oid(oid), Some(&header(3)));
    }

    #[test]
    fn clear_empties_everything() {
        for release in [false, true] {
            let mut cache = OdbCache::new();
            let obj = person("x");
            cache.add_object(Oid::object(1), Arc::clone(&obj), header(1)).unwrap();
            cache.save_position_of_object_with_oid(Oid::object(1), 1).unwrap();
            cache.start_inserting_object_with_oid(&obj, Oid::object(1));
            cache.add_oid_to_unconnected_zone(Oid::object(1));

            cache.clear(release);

            assert_eq!(cache.number_of_objects(), 0);
            assert_eq!(cache.number_of_object_headers(), 0);
            assert_eq!(cache.number_of_positions(), 0);
            assert_eq!(cache.unconnected_zone_len(), 0);
            assert_eq!(cache.id_of_inserting_object(&obj), None);
        }
    }

    #[test]
    fn debug_reports_counts() {
        let mut cache = OdbCache::new();
        cache.add_object(Oid::object(1), person("a"), header(1)).unwrap();
        let debug = format!("{cache:?}");
        assert!(debug.contains("OdbCache"));
        assert!(debug.contains("objects: 1"));
    }

    proptest! {
        #[test]
        fn identity_maps_stay_inverse(ops in proptest::collection::vec((1u64..8, 0usize..4, any::<bool>()), 1..64)) {
            let pool: Vec<ObjectRef> = (0..4).map(|i| person(&i.to_string())).collect();
            let mut cache = OdbCache::new();
            for (oid, idx, remove) in ops {
                let oid = Oid::object(oid);
                if remove {
                    cache.remove_object_by_oid(oid);
                } else {
                    cache.add_object(oid, Arc::clone(&pool[idx]), header(oid.id())).unwrap();
                }
            }
            for oid in cache.oids() {
                let obj = cache.get_object(oid).unwrap();
                prop_assert_eq!(cache.get_oid(&obj), Some(oid));
            }
            for obj in &pool {
                if let Some(oid) = cache.get_oid(obj) {
                    prop_assert!(Arc::ptr_eq(&cache.get_object(oid).unwrap(), obj));
                }
            }
        }
    }
}
