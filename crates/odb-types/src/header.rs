use serde::{Deserialize, Serialize};

use crate::oid::Oid;

/// Whether an OID's data is live or has been logically deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdStatus {
    Active,
    Deleted,
}

/// Cached knowledge of where an OID's data lives on disk.
///
/// Deletion flips the status without erasing the position, so a deleted
/// OID is visible to the cache before the record is reclaimed on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdInfo {
    pub position: i64,
    pub status: IdStatus,
}

impl IdInfo {
    pub fn active(position: i64) -> Self {
        Self {
            position,
            status: IdStatus::Active,
        }
    }

    pub fn deleted(position: i64) -> Self {
        Self {
            position,
            status: IdStatus::Deleted,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == IdStatus::Deleted
    }
}

/// Lightweight metadata for a persisted object.
///
/// Objects of the same class form a doubly linked chain on disk through
/// `previous_object_oid` / `next_object_oid`; a null OID ends the chain.
/// Headers are owned by the storage layer and cached by the session cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfoHeader {
    /// The object's own identifier.
    pub oid: Oid,
    /// Class-info identifier (a class-kind OID), null until resolved.
    pub class_info_id: Oid,
    /// Position of the object's data in record storage.
    pub position: i64,
    /// Previous object of the same class, or null.
    pub previous_object_oid: Oid,
    /// Next object of the same class, or null.
    pub next_object_oid: Oid,
    /// Incremented on every update of the object.
    pub object_version: u32,
}

impl ObjectInfoHeader {
    /// A header with no chain links.
    pub fn new(oid: Oid, class_info_id: Oid, position: i64) -> Self {
        Self {
            oid,
            class_info_id,
            position,
            previous_object_oid: Oid::null(),
            next_object_oid: Oid::null(),
            object_version: 1,
        }
    }

    /// Set both chain links.
    pub fn with_links(mut self, previous: Oid, next: Oid) -> Self {
        self.previous_object_oid = previous;
        self.next_object_oid = next;
        self
    }

    pub fn is_first_of_class(&self) -> bool {
        self.previous_object_oid.is_null()
    }

    pub fn is_last_of_class(&self) -> bool {
        self.next_object_oid.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_info_constructors() {
        assert!(!IdInfo::active(10).is_deleted());
        let deleted = IdInfo::deleted(10);
        assert!(deleted.is_deleted());
        assert_eq!(deleted.position, 10);
    }

    #[test]
    fn new_header_has_no_links() {
        let h = ObjectInfoHeader::new(Oid::object(1), Oid::class(1), 100);
        assert!(h.is_first_of_class());
        assert!(h.is_last_of_class());
        assert_eq!(h.object_version, 1);
    }

    #[test]
    fn with_links_sets_chain() {
        let h = ObjectInfoHeader::new(Oid::object(2), Oid::class(1), 200)
            .with_links(Oid::object(1), Oid::object(3));
        assert!(!h.is_first_of_class());
        assert_eq!(h.next_object_oid, Oid::object(3));
    }
}
