//! Identity and position caching for an odb session.
//!
//! # Key Types
//!
//! - [`OdbCache`] -- long-lived per-session cache: object <-> OID identity
//!   maps, object headers, on-disk positions, the write-side cycle table and
//!   the set of OIDs touched by the open transaction
//! - [`ReadObjectsCache`] -- short-lived per-read cache that breaks cycles
//!   while an object graph is being resolved
//! - [`ObjectPosition`] -- result of a position lookup: found, not cached,
//!   or deleted
//!
//! Neither cache locks internally; the owning session serializes access.

pub mod error;
pub mod odb_cache;
pub mod position;
pub mod read_cache;

pub use error::{CacheError, CacheResult};
pub use odb_cache::OdbCache;
pub use position::ObjectPosition;
pub use read_cache::ReadObjectsCache;
