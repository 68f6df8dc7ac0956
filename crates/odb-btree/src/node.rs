//! B-tree nodes and their on-disk encoding.
//!
//! A node stores its entries in key order, the ids of its children (never
//! in-memory pointers), and its own position in the parent: the parent's id
//! and the index of this node in the parent's child list. A node is a leaf
//! iff it has no children.
//!
//! Record layout:
//! ```text
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode: entries, children, parent, index_in_parent)]
//! ```

use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BTreeError, BTreeResult};

/// Identifier of a node: the id of the record holding it.
pub type NodeId = u32;

/// Record holding the id of the current root node.
pub const ROOT_POINTER_ID: NodeId = 1;

const CRC_SIZE: usize = 4;

/// Shared handle to a cached node. Every holder sees the same instance.
pub type NodeHandle<K, V> = Arc<RwLock<TreeNode<K, V>>>;

/// A B-tree node.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode<K, V> {
    id: NodeId,
    entries: Vec<(K, V)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    index_in_parent: usize,
}

#[derive(Serialize)]
struct NodeRecordRef<'a, K, V> {
    entries: &'a [(K, V)],
    children: &'a [NodeId],
    parent: Option<NodeId>,
    index_in_parent: u32,
}

#[derive(Deserialize)]
struct NodeRecord<K, V> {
    entries: Vec<(K, V)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    index_in_parent: u32,
}

impl<K, V> TreeNode<K, V> {
    /// A detached node. Parent linkage is set once the node is attached.
    pub fn new(id: NodeId, entries: Vec<(K, V)>, children: Vec<NodeId>) -> Self {
        Self {
            id,
            entries,
            children,
            parent: None,
            index_in_parent: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<(K, V)> {
        &mut self.entries
    }

    pub fn key(&self, index: usize) -> Option<&K> {
        self.entries.get(index).map(|(k, _)| k)
    }

    pub fn value(&self, index: usize) -> Option<&V> {
        self.entries.get(index).map(|(_, v)| v)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }

    pub fn child_id(&self, index: usize) -> Option<NodeId> {
        self.children.get(index).copied()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn index_in_parent(&self) -> usize {
        self.index_in_parent
    }

    /// Attach this node below `parent` at child slot `index`, or detach it
    /// with `None`. Returns `true` if the linkage changed.
    pub fn set_parent(&mut self, parent: Option<NodeId>, index: usize) -> bool {
        let index = if parent.is_some() { index } else { 0 };
        if self.parent == parent && self.index_in_parent == index {
            return false;
        }
        self.parent = parent;
        self.index_in_parent = index;
        true
    }
}

impl<K, V> TreeNode<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// Encode the node into its record bytes.
    pub fn encode(&self) -> BTreeResult<Vec<u8>> {
        let index_in_parent = u32::try_from(self.index_in_parent)
            .map_err(|_| BTreeError::Serialization(format!("child index {} too large", self.index_in_parent)))?;
        let record = NodeRecordRef {
            entries: &self.entries,
            children: &self.children,
            parent: self.parent,
            index_in_parent,
        };
        let payload =
            bincode::serialize(&record).map_err(|e| BTreeError::Serialization(e.to_string()))?;
        let mut bytes = Vec::with_capacity(CRC_SIZE + payload.len());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode the record of node `id`. Children are left as ids.
    pub fn decode(id: NodeId, bytes: &[u8]) -> BTreeResult<Self> {
        if bytes.len() < CRC_SIZE {
            return Err(BTreeError::Corrupted(format!(
                "node {id} record is {} bytes long",
                bytes.len()
            )));
        }
        let (crc, payload) = bytes.split_at(CRC_SIZE);
        let expected = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        if crc32fast::hash(payload) != expected {
            return Err(BTreeError::Corrupted(format!("node {id} failed its checksum")));
        }
        let record: NodeRecord<K, V> =
            bincode::deserialize(payload).map_err(|e| BTreeError::Serialization(e.to_string()))?;
        Ok(Self {
            id,
            entries: record.entries,
            children: record.children,
            parent: record.parent,
            index_in_parent: record.index_in_parent as usize,
        })
    }
}

/// Encode the root pointer record.
pub(crate) fn encode_root_pointer(root: NodeId) -> [u8; 4] {
    root.to_le_bytes()
}

/// Decode the root pointer record.
pub(crate) fn decode_root_pointer(bytes: &[u8]) -> BTreeResult<NodeId> {
    let raw: [u8; 4] = bytes.try_into().map_err(|_| {
        BTreeError::Corrupted(format!("root pointer record is {} bytes long", bytes.len()))
    })?;
    Ok(NodeId::from_le_bytes(raw))
}
