//! Persistent B-tree index for the odb object database.
//!
//! Nodes live in an external [`RecordStore`](odb_store::RecordStore), one
//! record per node. Record 1 is reserved for the id of the current root.
//!
//! # Key Types
//!
//! - [`TreeDiskNodeManager`] -- node creation, cached lookup, dirty tracking
//!   and root-pointer persistence
//! - [`TreeEnumerator`] -- bidirectional in-order cursor
//! - [`PersistentBTree`] -- insert / get / remove / seek over the manager
//! - [`TreeConfig`] -- degree and node-cache tuning
//!
//! # Node Cache
//!
//! Every loaded node is registered by id as a weak handle. A bounded FIFO of
//! strong handles keeps recently touched nodes alive, and dirty nodes are
//! held strongly until [`TreeDiskNodeManager::save_changes`]. A weak handle
//! that no longer resolves simply means the node is read from disk again.

pub mod config;
pub mod enumerator;
pub mod error;
pub mod manager;
pub mod node;
pub mod tree;

pub use config::TreeConfig;
pub use enumerator::{Direction, TreeEnumerator};
pub use error::{BTreeError, BTreeResult};
pub use manager::TreeDiskNodeManager;
pub use node::{NodeHandle, NodeId, TreeNode, ROOT_POINTER_ID};
pub use tree::{KeyComparator, NaturalOrder, PersistentBTree};
