//! Record storage for the odb object database.
//!
//! The engine core never touches files directly. Everything it persists --
//! serialized objects, object headers, B-tree nodes -- is an opaque,
//! variable-length byte record addressed by a 64-bit id.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileRecordStore`] -- append-only record log with CRC framing and recovery
//!
//! # Design Rules
//!
//! 1. Record ids are allocated sequentially starting at 1 and never reused.
//! 2. The store never interprets record contents.
//! 3. Updating a missing record is an error; finding one is `Ok(None)`.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileRecordStore, FileRecordStoreConfig};
pub use memory::InMemoryRecordStore;
pub use traits::{RecordId, RecordStore};
