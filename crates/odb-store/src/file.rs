use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{RecordId, RecordStore};

/// A single logged mutation.
///
/// On-disk format of each entry:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogOp)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum LogOp {
    Put { id: RecordId, data: Vec<u8> },
    Delete { id: RecordId },
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Configuration for the [`FileRecordStore`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileRecordStoreConfig {
    /// `fsync` after every logged mutation.
    pub sync_on_write: bool,
}

struct FileState {
    writer: BufWriter<File>,
    /// Current end of the log.
    offset: u64,
    records: HashMap<RecordId, Vec<u8>>,
    next_id: RecordId,
}

/// Durable record store backed by a single append-only log file.
///
/// Every create, update and delete appends one framed entry. Live records
/// are kept in memory; opening the store replays the log. Entries that fail
/// the CRC check are skipped and a truncated tail ends recovery, so a torn
/// final write loses only that write.
pub struct FileRecordStore {
    path: PathBuf,
    state: Mutex<FileState>,
    config: FileRecordStoreConfig,
}

impl FileRecordStore {
    /// Open (or create) the record log at `path` and replay it.
    pub fn open(path: &Path, config: FileRecordStoreConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let (records, next_id, offset) = recover(path)?;
        // Drop a torn tail so new entries start on a frame boundary.
        if file.metadata()?.len() > offset {
            file.set_len(offset)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(FileState {
                writer: BufWriter::new(file),
                offset,
                records,
                next_id,
            }),
            config,
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").records.len()
    }

    /// Returns `true` if there are no live records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current size of the log in bytes.
    pub fn log_size(&self) -> u64 {
        self.state.lock().expect("lock poisoned").offset
    }

    fn append(&self, state: &mut FileState, op: &LogOp) -> StoreResult<()> {
        let written = write_entry(&mut state.writer, op)?;
        state.writer.flush()?;
        if self.config.sync_on_write {
            state.writer.get_ref().sync_all()?;
        }
        state.offset += written;
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn create(&self, data: &[u8]) -> StoreResult<RecordId> {
        let mut state = self.state.lock().expect("lock poisoned");
        let id = state.next_id;
        self.append(
            &mut state,
            &LogOp::Put {
                id,
                data: data.to_vec(),
            },
        )?;
        state.next_id += 1;
        state.records.insert(id, data.to_vec());
        Ok(id)
    }

    fn find(&self, id: RecordId) -> StoreResult<Option<Vec<u8>>> {
        let state = self.state.lock().expect("lock poisoned");
        Ok(state.records.get(&id).cloned())
    }

    fn update(&self, id: RecordId, data: &[u8]) -> StoreResult<()> {
        if id == 0 {
            return Err(StoreError::InvalidRecordId(id));
        }
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.records.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.append(
            &mut state,
            &LogOp::Put {
                id,
                data: data.to_vec(),
            },
        )?;
        state.records.insert(id, data.to_vec());
        Ok(())
    }

    fn delete(&self, id: RecordId) -> StoreResult<bool> {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.records.contains_key(&id) {
            return Ok(false);
        }
        self.append(&mut state, &LogOp::Delete { id })?;
        state.records.remove(&id);
        Ok(true)
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecordStore")
            .field("path", &self.path)
            .field("record_count", &self.len())
            .finish()
    }
}

/// Frame and write one entry. Returns the number of bytes written.
fn write_entry<W: Write>(w: &mut W, op: &LogOp) -> StoreResult<u64> {
    let payload = bincode::serialize(op).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization(format!("record too large: {}", payload.len())))?;
    let crc = crc32fast::hash(&payload);

    w.write_all(&length.to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(HEADER_SIZE as u64 + payload.len() as u64)
}

/// Replay the log. Returns the live records, the next id to allocate and
/// the offset just past the last complete entry.
fn recover(path: &Path) -> StoreResult<(HashMap<RecordId, Vec<u8>>, RecordId, u64)> {
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    let mut records = HashMap::new();
    let mut max_id: RecordId = 0;
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= bytes.len() {
        let length = u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as usize;
        let expected_crc = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]);
        let start = offset + HEADER_SIZE;
        let end = start + length;
        if end > bytes.len() {
            warn!(offset, "truncated record log entry; stopping recovery");
            break;
        }

        let payload = &bytes[start..end];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping entry"
            );
            offset = end;
            continue;
        }

        match bincode::deserialize::<LogOp>(payload) {
            Ok(LogOp::Put { id, data }) => {
                max_id = max_id.max(id);
                records.insert(id, data);
            }
            Ok(LogOp::Delete { id }) => {
                max_id = max_id.max(id);
                records.remove(&id);
            }
            Err(e) => {
                warn!(offset, error = %e, "failed to deserialize log entry; skipping");
            }
        }
        offset = end;
    }

    debug!(records = records.len(), next_id = max_id + 1, "record log recovered");
    Ok((records, max_id + 1, offset as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(dir: &tempfile::TempDir) -> FileRecordStore {
        FileRecordStore::open(&dir.path().join("records.log"), FileRecordStoreConfig::default())
            .unwrap()
    }

    #[test]
    fn create_find_update_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        let id = store.create(b"first").unwrap();
        assert_eq!(id, 1);
        store.update(id, b"second").unwrap();
        assert_eq!(store.find(id).unwrap().as_deref(), Some(&b"second"[..]));
        assert!(store.delete(id).unwrap());
        assert!(store.find(id).unwrap().is_none());
        assert!(!store.delete(id).unwrap());
    }

    #[test]
    fn update_missing_record_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(matches!(store.update(3, b"x"), Err(StoreError::NotFound(3))));
    }

    #[test]
    fn reopen_replays_the_log() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(&dir);
            let a = store.create(b"alpha").unwrap();
            let b = store.create(b"beta").unwrap();
            store.update(a, b"alpha-2").unwrap();
            store.delete(b).unwrap();
        }

        let store = open(&dir);
        assert_eq!(store.len(), 1);
        assert_eq!(store.find(1).unwrap().as_deref(), Some(&b"alpha-2"[..]));
        assert!(store.find(2).unwrap().is_none());
        // Id 2 was allocated before, even though it is gone now.
        assert_eq!(store.create(b"gamma").unwrap(), 3);
    }

    #[test]
    fn torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        {
            let store = open(&dir);
            store.create(b"kept").unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0xff, 0x00, 0x00]).unwrap();
        }

        let store = open(&dir);
        assert_eq!(store.len(), 1);
        assert_eq!(store.find(1).unwrap().as_deref(), Some(&b"kept"[..]));
        // the torn bytes are cut off on open
        assert_eq!(store.log_size(), fs::metadata(&path).unwrap().len());

        let after = store.create(b"after").unwrap();
        drop(store);
        let store = open(&dir);
        assert_eq!(store.find(after).unwrap().as_deref(), Some(&b"after"[..]));
    }

    #[test]
    fn corrupt_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        {
            let store = open(&dir);
            store.create(b"one").unwrap();
            store.create(b"two").unwrap();
        }
        // Flip a payload byte of the first entry.
        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_SIZE + 2] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let store = open(&dir);
        assert!(store.find(1).unwrap().is_none());
        assert_eq!(store.find(2).unwrap().as_deref(), Some(&b"two"[..]));
    }
}
