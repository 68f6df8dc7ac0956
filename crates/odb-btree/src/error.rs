//! Error types for the B-tree crate.

use crate::node::NodeId;

/// Errors that can occur during tree operations.
#[derive(Debug, thiserror::Error)]
pub enum BTreeError {
    /// Record store operation failed.
    #[error("store error: {0}")]
    Store(#[from] odb_store::StoreError),

    /// Node serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The tree's structure is inconsistent. Traversal and mutation stop here.
    #[error("something has gone wrong with the tree: {0}")]
    Corrupted(String),

    /// Record 1 holds the root pointer and is never a node.
    #[error("node id {0} is reserved for the root pointer")]
    ReservedNodeId(NodeId),

    /// The record store handed out an id that does not fit a node id.
    #[error("record id {0} does not fit a node id")]
    NodeIdOverflow(u64),

    /// The root was deleted and no replacement was installed.
    #[error("tree has no root node")]
    NoRoot,

    /// An enumerator was started outside its node's entries.
    #[error("invalid start position: node {node}, index {index}")]
    InvalidPosition { node: NodeId, index: usize },

    /// Enumerators are forward-only and cannot be rewound.
    #[error("tree enumerators cannot be reset")]
    ResetUnsupported,

    /// Configuration values are out of range or unparseable.
    #[error("invalid tree configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for tree results.
pub type BTreeResult<T> = Result<T, BTreeError>;
