//! Error types for the cache crate.

use odb_types::Oid;

/// Errors raised by cache operations. Both are invariant violations by
/// the caller and are never recovered locally.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    /// A null OID was passed where an identifier is required.
    #[error("null OID passed to {0}")]
    NullOid(&'static str),

    /// A non-committed header was cached before its class was resolved.
    #[error("object header {0:?} has no class info id")]
    MissingClassInfoId(Oid),
}

/// Convenience alias for cache results.
pub type CacheResult<T> = Result<T, CacheError>;
