//! Foundation types for the odb object database.
//!
//! This crate provides the identity and metadata types shared by the cache,
//! the persistent index, and the query layer. Every other odb crate depends
//! on `odb-types`.
//!
//! # Key Types
//!
//! - [`Oid`] -- Generated 64-bit identifier, either for an object or for class metadata
//! - [`IdInfo`] -- Cached on-disk position of an OID plus its active/deleted status
//! - [`ObjectInfoHeader`] -- Lightweight per-object metadata and class-chain links
//! - [`ObjectRef`] -- Shared handle to a live application object
//! - [`Value`] -- Attribute value as seen by criteria evaluations and values actions
//! - [`AttributeValuesMap`] -- Ordered attribute-name to value map for one candidate

pub mod error;
pub mod header;
pub mod object;
pub mod oid;
pub mod value;

pub use error::TypeError;
pub use header::{IdInfo, IdStatus, ObjectInfoHeader};
pub use object::{type_tag, ObjectKey, ObjectRef};
pub use oid::{Oid, OidKind};
pub use value::{AttributeValuesMap, ObjectInfo, Value};
