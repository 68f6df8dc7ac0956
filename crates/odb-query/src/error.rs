//! Error types for the query crate.

/// Errors that can occur while evaluating criteria or running values actions.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The candidate value has a runtime type the operation cannot handle.
    #[error("{operation} does not support values of type {type_name}")]
    UnsupportedType {
        operation: &'static str,
        type_name: &'static str,
    },

    /// The two sides of an operation have incompatible types.
    #[error("{operation} expected a {expected} value, found {found}")]
    TypeMismatch {
        operation: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A running aggregate left the decimal range.
    #[error("{operation} overflowed")]
    Overflow { operation: &'static str },

    /// Identity cache invariant violated.
    #[error("cache error: {0}")]
    Cache(#[from] odb_cache::CacheError),

    /// Index scan failed.
    #[error("index error: {0}")]
    Index(#[from] odb_btree::BTreeError),

    /// The query engine could not serve a request.
    #[error("engine error: {0}")]
    Engine(String),

    /// Configuration values are out of range or unparseable.
    #[error("invalid query configuration: {0}")]
    InvalidConfig(String),
}

impl QueryError {
    pub(crate) fn unsupported(operation: &'static str, value: &odb_types::Value) -> Self {
        Self::UnsupportedType {
            operation,
            type_name: value.type_name(),
        }
    }
}

impl From<std::convert::Infallible> for QueryError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

/// Convenience alias for query results.
pub type QueryResult<T> = Result<T, QueryError>;
