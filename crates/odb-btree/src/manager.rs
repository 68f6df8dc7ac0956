use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, RwLock, Weak};

use odb_store::{RecordId, RecordStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::TreeConfig;
use crate::error::{BTreeError, BTreeResult};
use crate::node::{decode_root_pointer, encode_root_pointer, NodeHandle, NodeId, TreeNode, ROOT_POINTER_ID};

/// Owns the nodes of one persistent B-tree.
///
/// Nodes are created, looked up and written back through this manager; the
/// balancing logic lives above it. A node goes through
/// unloaded → cached (weak) → recently touched (strong) → dirty → persisted.
///
/// Two lookups of the same id return the same [`NodeHandle`] as long as some
/// holder keeps it alive, so a mutation made through one handle is seen by
/// every other holder. Dirty nodes are pinned until [`save_changes`].
///
/// [`save_changes`]: TreeDiskNodeManager::save_changes
pub struct TreeDiskNodeManager<K, V> {
    store: Arc<dyn RecordStore>,
    config: TreeConfig,
    root: Option<NodeHandle<K, V>>,
    weak_nodes: HashMap<NodeId, Weak<RwLock<TreeNode<K, V>>>>,
    recent: VecDeque<NodeHandle<K, V>>,
    dirty: BTreeMap<NodeId, NodeHandle<K, V>>,
    touches: usize,
}

impl<K, V> TreeDiskNodeManager<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// Open the tree held by `store`, bootstrapping an empty one if record 1
    /// does not exist yet.
    pub fn open(store: Arc<dyn RecordStore>, config: TreeConfig) -> BTreeResult<Self> {
        config.validate()?;
        let mut manager = Self {
            store,
            recent: VecDeque::with_capacity(config.strong_cache_capacity),
            config,
            root: None,
            weak_nodes: HashMap::new(),
            dirty: BTreeMap::new(),
            touches: 0,
        };
        match manager.store.find(RecordId::from(ROOT_POINTER_ID))? {
            Some(bytes) => {
                let root_id = decode_root_pointer(&bytes)?;
                let root = manager
                    .find(root_id)?
                    .ok_or_else(|| BTreeError::Corrupted(format!("root node {root_id} is missing")))?;
                debug!(root = root_id, "tree opened");
                manager.root = Some(root);
            }
            None => manager.bootstrap()?,
        }
        Ok(manager)
    }

    fn bootstrap(&mut self) -> BTreeResult<()> {
        let pointer_id = self.store.create(&encode_root_pointer(0))?;
        if pointer_id != RecordId::from(ROOT_POINTER_ID) {
            return Err(BTreeError::Corrupted(format!(
                "root pointer was allocated record {pointer_id}, expected {ROOT_POINTER_ID}"
            )));
        }
        let root = self.create(Vec::new(), Vec::new())?;
        let root_id = read(&root).id();
        self.store
            .update(RecordId::from(ROOT_POINTER_ID), &encode_root_pointer(root_id))?;
        debug!(root = root_id, "tree bootstrapped");
        self.root = Some(root);
        Ok(())
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The current root node.
    ///
    /// Fails with [`BTreeError::NoRoot`] after the root was deleted and
    /// before a new one was installed.
    pub fn root_node(&self) -> BTreeResult<NodeHandle<K, V>> {
        self.root.clone().ok_or(BTreeError::NoRoot)
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root.as_ref().map(|root| read(root).id())
    }

    /// Allocate a record for a new node and write the node into it.
    ///
    /// The node is persisted here, so it is not marked as changed.
    pub fn create(&mut self, entries: Vec<(K, V)>, children: Vec<NodeId>) -> BTreeResult<NodeHandle<K, V>> {
        let record_id = self.store.create(&[])?;
        let id = NodeId::try_from(record_id).map_err(|_| BTreeError::NodeIdOverflow(record_id))?;
        let node = TreeNode::new(id, entries, children);
        self.store.update(record_id, &node.encode()?)?;
        let handle = Arc::new(RwLock::new(node));
        self.register(&handle);
        Ok(handle)
    }

    /// Look up a node by id, reading it from the store on a cache miss.
    ///
    /// Returns `Ok(None)` if no record exists for `id`. Child nodes are not
    /// loaded.
    pub fn find(&mut self, id: NodeId) -> BTreeResult<Option<NodeHandle<K, V>>> {
        if id == ROOT_POINTER_ID {
            return Err(BTreeError::ReservedNodeId(id));
        }
        if let Some(handle) = self.weak_nodes.get(&id).and_then(Weak::upgrade) {
            self.touch(&handle);
            return Ok(Some(handle));
        }
        trace!(node = id, "node cache miss");
        let Some(bytes) = self.store.find(RecordId::from(id))? else {
            return Ok(None);
        };
        let handle = Arc::new(RwLock::new(TreeNode::decode(id, &bytes)?));
        self.register(&handle);
        Ok(Some(handle))
    }

    /// Create a root holding one entry between `left_id` and `right_id` and
    /// install it.
    ///
    /// The children are relinked only once the root pointer is written. If
    /// installing the root fails, its record is removed again and the
    /// children keep their previous parent.
    pub fn create_new_root(
        &mut self,
        key: K,
        value: V,
        left_id: NodeId,
        right_id: NodeId,
    ) -> BTreeResult<NodeHandle<K, V>> {
        let mut children = Vec::with_capacity(2);
        for child_id in [left_id, right_id] {
            let child = self
                .find(child_id)?
                .ok_or_else(|| BTreeError::Corrupted(format!("new root child {child_id} is missing")))?;
            children.push(child);
        }
        let root = self.create(vec![(key, value)], vec![left_id, right_id])?;
        let root_id = read(&root).id();
        if let Err(e) = self.make_root(&root) {
            if let Err(cleanup) = self.delete(&root) {
                warn!(node = root_id, error = %cleanup, "orphaned root record left behind");
            }
            return Err(e);
        }
        for (index, child) in children.iter().enumerate() {
            let changed = write(child).set_parent(Some(root_id), index);
            if changed {
                self.mark_as_changed(child);
            }
        }
        Ok(root)
    }

    /// Install an existing node as the root.
    ///
    /// The root pointer record is written before the in-memory root is
    /// swapped; if the write fails the previous root stays in place.
    pub fn make_root(&mut self, node: &NodeHandle<K, V>) -> BTreeResult<()> {
        let id = read(node).id();
        self.store
            .update(RecordId::from(ROOT_POINTER_ID), &encode_root_pointer(id))?;
        let detached = write(node).set_parent(None, 0);
        if detached {
            self.mark_as_changed(node);
        }
        debug!(root = id, "root changed");
        self.root = Some(Arc::clone(node));
        Ok(())
    }

    /// Remove a node's record and forget the node.
    ///
    /// Deleting the root leaves the manager without one until
    /// [`make_root`](Self::make_root) is called.
    pub fn delete(&mut self, node: &NodeHandle<K, V>) -> BTreeResult<()> {
        let id = read(node).id();
        self.store.delete(RecordId::from(id))?;
        self.dirty.remove(&id);
        self.weak_nodes.remove(&id);
        self.recent.retain(|held| !Arc::ptr_eq(held, node));
        if self.root.as_ref().is_some_and(|root| Arc::ptr_eq(root, node)) {
            self.root = None;
        }
        debug!(node = id, "node deleted");
        Ok(())
    }

    /// Record that `node` must be written back on the next save. Marking an
    /// already dirty node is a no-op.
    pub fn mark_as_changed(&mut self, node: &NodeHandle<K, V>) {
        let id = read(node).id();
        self.dirty.entry(id).or_insert_with(|| Arc::clone(node));
    }

    pub fn is_changed(&self, id: NodeId) -> bool {
        self.dirty.contains_key(&id)
    }

    /// Write every dirty node to its record and clear the dirty set.
    ///
    /// Returns the number of nodes written. If a write fails, the nodes not
    /// yet written stay dirty.
    pub fn save_changes(&mut self) -> BTreeResult<usize> {
        let mut written = 0;
        while let Some((id, node)) = self.dirty.pop_first() {
            let encoded = read(&node).encode();
            let bytes = match encoded {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.dirty.insert(id, node);
                    return Err(e);
                }
            };
            if let Err(e) = self.store.update(RecordId::from(id), &bytes) {
                self.dirty.insert(id, node);
                return Err(e.into());
            }
            written += 1;
        }
        debug!(written, "tree changes saved");
        Ok(written)
    }

    /// Number of dirty nodes.
    pub fn changed_count(&self) -> usize {
        self.dirty.len()
    }

    /// Number of nodes whose weak handle still resolves.
    pub fn cached_count(&self) -> usize {
        self.weak_nodes
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of entries in the weak table, dead ones included.
    pub fn weak_table_len(&self) -> usize {
        self.weak_nodes.len()
    }

    fn register(&mut self, handle: &NodeHandle<K, V>) {
        let id = read(handle).id();
        self.weak_nodes.insert(id, Arc::downgrade(handle));
        self.touch(handle);
    }

    fn touch(&mut self, handle: &NodeHandle<K, V>) {
        if self.recent.len() >= self.config.strong_cache_capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(Arc::clone(handle));
        self.touches += 1;
        if self.touches % self.config.sweep_interval == 0 {
            self.sweep();
        }
    }

    fn sweep(&mut self) {
        let before = self.weak_nodes.len();
        self.weak_nodes.retain(|_, weak| weak.strong_count() > 0);
        trace!(swept = before - self.weak_nodes.len(), live = self.weak_nodes.len(), "weak node table swept");
    }
}

impl<K, V> std::fmt::Debug for TreeDiskNodeManager<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeDiskNodeManager")
            .field("root", &self.root.as_ref().map(|root| read(root).id()))
            .field("weak_nodes", &self.weak_nodes.len())
            .field("recent", &self.recent.len())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}

pub(crate) fn read<K, V>(node: &NodeHandle<K, V>) -> std::sync::RwLockReadGuard<'_, TreeNode<K, V>> {
    node.read().expect("lock poisoned")
}

pub(crate) fn write<K, V>(node: &NodeHandle<K, V>) -> std::sync::RwLockWriteGuard<'_, TreeNode<K, V>> {
    node.write().expect("lock poisoned")
}
