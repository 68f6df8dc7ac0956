use crate::error::StoreResult;

/// Identifier of a stored record.
pub type RecordId = u64;

/// Byte-level record storage.
///
/// All implementations must satisfy these invariants:
/// - `create` returns a fresh id, greater than every id handed out before.
/// - A record's bytes are returned by `find` exactly as last written.
/// - `update` of a record that does not exist fails with `NotFound`.
/// - Deleting a record makes `find` return `Ok(None)` for its id.
pub trait RecordStore: Send + Sync {
    /// Store a new record and return its id.
    fn create(&self, data: &[u8]) -> StoreResult<RecordId>;

    /// Read a record by id.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    fn find(&self, id: RecordId) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the bytes of an existing record.
    fn update(&self, id: RecordId, data: &[u8]) -> StoreResult<()>;

    /// Delete a record. Returns `true` if the record existed.
    fn delete(&self, id: RecordId) -> StoreResult<bool>;

    /// Check whether a record exists.
    fn exists(&self, id: RecordId) -> StoreResult<bool> {
        Ok(self.find(id)?.is_some())
    }
}
