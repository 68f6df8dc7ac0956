use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{RecordId, RecordStore};

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. All records are held in memory behind a
/// `RwLock`. Records are copied on read and write.
pub struct InMemoryRecordStore {
    inner: RwLock<MemoryState>,
}

struct MemoryState {
    records: HashMap<RecordId, Vec<u8>>,
    next_id: RecordId,
}

impl InMemoryRecordStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryState {
                records: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").records.len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("lock poisoned").records.is_empty()
    }

    /// Total bytes across all stored records.
    pub fn total_bytes(&self) -> u64 {
        self.inner
            .read()
            .expect("lock poisoned")
            .records
            .values()
            .map(|r| r.len() as u64)
            .sum()
    }

    /// Return a sorted list of all record ids in the store.
    pub fn all_ids(&self) -> Vec<RecordId> {
        let state = self.inner.read().expect("lock poisoned");
        let mut ids: Vec<RecordId> = state.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, data: &[u8]) -> StoreResult<RecordId> {
        let mut state = self.inner.write().expect("lock poisoned");
        let id = state.next_id;
        state.next_id += 1;
        state.records.insert(id, data.to_vec());
        Ok(id)
    }

    fn find(&self, id: RecordId) -> StoreResult<Option<Vec<u8>>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.records.get(&id).cloned())
    }

    fn update(&self, id: RecordId, data: &[u8]) -> StoreResult<()> {
        if id == 0 {
            return Err(StoreError::InvalidRecordId(id));
        }
        let mut state = self.inner.write().expect("lock poisoned");
        match state.records.get_mut(&id) {
            Some(record) => {
                record.clear();
                record.extend_from_slice(data);
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    fn delete(&self, id: RecordId) -> StoreResult<bool> {
        let mut state = self.inner.write().expect("lock poisoned");
        Ok(state.records.remove(&id).is_some())
    }

    fn exists(&self, id: RecordId) -> StoreResult<bool> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.records.contains_key(&id))
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &count)
            .finish()
    }
}
