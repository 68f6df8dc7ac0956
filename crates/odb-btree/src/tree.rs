//! Balanced B-tree logic on top of [`TreeDiskNodeManager`].
//!
//! Classic B-tree: internal nodes carry entries too, and entry `i` of an
//! internal node sits between children `i` and `i + 1`. Inserts split full
//! nodes on the way down and removals top up thin nodes on the way down, so
//! neither ever has to walk back up.

use std::cmp::Ordering;
use std::mem;
use std::sync::Arc;

use odb_store::RecordStore;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TreeConfig;
use crate::enumerator::{descend, Direction, TreeEnumerator};
use crate::error::{BTreeError, BTreeResult};
use crate::manager::{read, write, TreeDiskNodeManager};
use crate::node::{NodeHandle, NodeId, TreeNode};

/// Orders the keys of a tree.
pub trait KeyComparator<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord> KeyComparator<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

impl<K, F> KeyComparator<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// A B-tree index persisted in a [`RecordStore`].
///
/// Changes stay in memory until [`commit`](Self::commit).
pub struct PersistentBTree<K, V, C = NaturalOrder> {
    manager: TreeDiskNodeManager<K, V>,
    comparator: C,
}

impl<K, V> PersistentBTree<K, V, NaturalOrder>
where
    K: Serialize + DeserializeOwned + Clone + Ord,
    V: Serialize + DeserializeOwned + Clone,
{
    /// Open the tree in `store`, ordering keys naturally.
    pub fn open(store: Arc<dyn RecordStore>, config: TreeConfig) -> BTreeResult<Self> {
        Self::with_comparator(store, config, NaturalOrder)
    }
}

impl<K, V, C> PersistentBTree<K, V, C>
where
    K: Serialize + DeserializeOwned + Clone,
    V: Serialize + DeserializeOwned + Clone,
    C: KeyComparator<K>,
{
    /// Open the tree in `store`, ordering keys with `comparator`.
    ///
    /// The comparator must order keys the same way every time the tree is
    /// opened.
    pub fn with_comparator(store: Arc<dyn RecordStore>, config: TreeConfig, comparator: C) -> BTreeResult<Self> {
        Ok(Self {
            manager: TreeDiskNodeManager::open(store, config)?,
            comparator,
        })
    }

    pub fn manager(&self) -> &TreeDiskNodeManager<K, V> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut TreeDiskNodeManager<K, V> {
        &mut self.manager
    }

    pub fn is_empty(&self) -> BTreeResult<bool> {
        let root = self.manager.root_node()?;
        let empty = read(&root).entry_count() == 0;
        Ok(empty)
    }

    /// Look up the value stored under `key`.
    pub fn get(&mut self, key: &K) -> BTreeResult<Option<V>> {
        let mut node = self.manager.root_node()?;
        loop {
            let child_index = {
                let n = read(&node);
                match self.search(&n, key) {
                    Ok(i) => return Ok(n.value(i).cloned()),
                    Err(_) if n.is_leaf() => return Ok(None),
                    Err(i) => i,
                }
            };
            node = self.child(&node, child_index)?;
        }
    }

    pub fn contains_key(&mut self, key: &K) -> BTreeResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert `value` under `key`, returning the value it replaces.
    pub fn insert(&mut self, key: K, value: V) -> BTreeResult<Option<V>> {
        let max = self.manager.config().max_entries();
        let root = self.manager.root_node()?;
        if read(&root).entry_count() == max {
            let root_id = read(&root).id();
            let (median, right_id) = self.split(&root)?;
            self.manager.create_new_root(median.0, median.1, root_id, right_id)?;
        }

        let mut node = self.manager.root_node()?;
        loop {
            let child_index = {
                let mut n = write(&node);
                match self.search(&n, &key) {
                    Ok(i) => {
                        let old = mem::replace(&mut n.entries_mut()[i].1, value);
                        drop(n);
                        self.manager.mark_as_changed(&node);
                        return Ok(Some(old));
                    }
                    Err(i) if n.is_leaf() => {
                        n.entries_mut().insert(i, (key, value));
                        drop(n);
                        self.manager.mark_as_changed(&node);
                        return Ok(None);
                    }
                    Err(i) => i,
                }
            };
            let mut child = self.child(&node, child_index)?;
            if read(&child).entry_count() == max {
                self.split_child(&node, child_index, &child)?;
                let order = {
                    let n = read(&node);
                    let separator = n.key(child_index).ok_or_else(|| corrupted(&n, "lost its separator"))?;
                    self.comparator.compare(&key, separator)
                };
                match order {
                    Ordering::Less => {}
                    Ordering::Equal => {
                        let old = mem::replace(&mut write(&node).entries_mut()[child_index].1, value);
                        self.manager.mark_as_changed(&node);
                        return Ok(Some(old));
                    }
                    Ordering::Greater => child = self.child(&node, child_index + 1)?,
                }
            }
            node = child;
        }
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> BTreeResult<Option<V>> {
        let root = self.manager.root_node()?;
        let removed = self.remove_below(Arc::clone(&root), key.clone())?;

        let (empty, only_child) = {
            let r = read(&root);
            (r.entry_count() == 0, r.child_id(0))
        };
        if let (true, Some(child_id)) = (empty, only_child) {
            let child = self.load(child_id)?;
            self.manager.make_root(&child)?;
            self.manager.delete(&root)?;
        }
        Ok(removed)
    }

    /// Enumerate every entry in ascending key order.
    pub fn iter(&mut self) -> BTreeResult<TreeEnumerator<'_, K, V>> {
        TreeEnumerator::ascending(&mut self.manager)
    }

    /// Enumerate every entry in descending key order.
    pub fn iter_rev(&mut self) -> BTreeResult<TreeEnumerator<'_, K, V>> {
        TreeEnumerator::descending(&mut self.manager)
    }

    /// Enumerate from `key` in `direction`.
    ///
    /// Ascending starts at the first key not less than `key`; descending
    /// starts at the last key not greater than `key`.
    pub fn seek(&mut self, key: &K, direction: Direction) -> BTreeResult<TreeEnumerator<'_, K, V>> {
        let mut node = self.manager.root_node()?;
        let mut fallback: Option<(NodeHandle<K, V>, usize)> = None;
        let start = loop {
            let (found, child_index, leaf) = {
                let n = read(&node);
                let (found, i) = match self.search(&n, key) {
                    Ok(i) => (true, i),
                    Err(i) => (false, i),
                };
                (found, i, n.is_leaf())
            };
            if found {
                break Some((node, child_index));
            }
            let count = read(&node).entry_count();
            let candidate = match direction {
                Direction::Ascending => (child_index < count).then_some(child_index),
                Direction::Descending => child_index.checked_sub(1),
            };
            if leaf {
                break match candidate {
                    Some(i) => Some((node, i)),
                    None => fallback,
                };
            }
            if let Some(i) = candidate {
                fallback = Some((Arc::clone(&node), i));
            }
            node = self.child(&node, child_index)?;
        };
        match start {
            Some((node, index)) => TreeEnumerator::new(&mut self.manager, node, index, direction),
            None => Ok(TreeEnumerator::finished(&mut self.manager, direction)),
        }
    }

    /// Smallest entry.
    pub fn first(&mut self) -> BTreeResult<Option<(K, V)>> {
        self.edge(Direction::Ascending)
    }

    /// Largest entry.
    pub fn last(&mut self) -> BTreeResult<Option<(K, V)>> {
        self.edge(Direction::Descending)
    }

    /// Persist every pending change. Returns the number of nodes written.
    pub fn commit(&mut self) -> BTreeResult<usize> {
        self.manager.save_changes()
    }

    // ---- Internals ----

    fn search(&self, node: &TreeNode<K, V>, key: &K) -> Result<usize, usize> {
        node.entries()
            .binary_search_by(|(k, _)| self.comparator.compare(k, key))
    }

    fn edge(&mut self, direction: Direction) -> BTreeResult<Option<(K, V)>> {
        let root = self.manager.root_node()?;
        let leaf = descend(&mut self.manager, root, direction)?;
        let n = read(&leaf);
        let entry = match direction {
            Direction::Ascending => n.entries().first(),
            Direction::Descending => n.entries().last(),
        };
        Ok(entry.cloned())
    }

    fn load(&mut self, id: NodeId) -> BTreeResult<NodeHandle<K, V>> {
        self.manager
            .find(id)?
            .ok_or_else(|| BTreeError::Corrupted(format!("node {id} is missing")))
    }

    fn child(&mut self, node: &NodeHandle<K, V>, index: usize) -> BTreeResult<NodeHandle<K, V>> {
        let id = {
            let n = read(node);
            n.child_id(index)
                .ok_or_else(|| corrupted(&n, &format!("has no child {index}")))?
        };
        self.load(id)
    }

    /// Point the children of `node` from slot `from` onwards back at it.
    fn relink_children(&mut self, node: &NodeHandle<K, V>, from: usize) -> BTreeResult<()> {
        let (id, children) = {
            let n = read(node);
            (n.id(), n.children().get(from..).unwrap_or_default().to_vec())
        };
        for (offset, child_id) in children.into_iter().enumerate() {
            let child = self.load(child_id)?;
            let changed = write(&child).set_parent(Some(id), from + offset);
            if changed {
                self.manager.mark_as_changed(&child);
            }
        }
        Ok(())
    }

    /// Split a full node around its median. The node keeps the lower half;
    /// the upper half moves to a new node whose id is returned with the
    /// median.
    fn split(&mut self, node: &NodeHandle<K, V>) -> BTreeResult<((K, V), NodeId)> {
        let degree = self.manager.config().degree;
        let (median, entries, children) = {
            let mut n = write(node);
            let entries = n.entries_mut().split_off(degree);
            let median = n
                .entries_mut()
                .pop()
                .ok_or_else(|| corrupted(&n, "split below its degree"))?;
            let children = if n.is_leaf() {
                Vec::new()
            } else {
                n.children_mut().split_off(degree)
            };
            (median, entries, children)
        };
        self.manager.mark_as_changed(node);
        let right = self.manager.create(entries, children)?;
        self.relink_children(&right, 0)?;
        let right_id = read(&right).id();
        Ok((median, right_id))
    }

    fn split_child(&mut self, parent: &NodeHandle<K, V>, index: usize, child: &NodeHandle<K, V>) -> BTreeResult<()> {
        let (median, right_id) = self.split(child)?;
        {
            let mut p = write(parent);
            p.entries_mut().insert(index, median);
            p.children_mut().insert(index + 1, right_id);
        }
        self.manager.mark_as_changed(parent);
        self.relink_children(parent, index + 1)
    }

    fn remove_below(&mut self, start: NodeHandle<K, V>, mut key: K) -> BTreeResult<Option<V>> {
        let degree = self.manager.config().degree;
        let mut node = start;
        let mut removed: Option<V> = None;
        loop {
            let (found, index, leaf) = {
                let n = read(&node);
                let (found, i) = match self.search(&n, &key) {
                    Ok(i) => (true, i),
                    Err(i) => (false, i),
                };
                (found, i, n.is_leaf())
            };

            if leaf {
                if !found {
                    return Ok(removed);
                }
                let (_, value) = write(&node).entries_mut().remove(index);
                self.manager.mark_as_changed(&node);
                return Ok(removed.or(Some(value)));
            }

            if !found {
                node = self.fill_child(&node, index)?;
                continue;
            }

            let left = self.child(&node, index)?;
            let right = self.child(&node, index + 1)?;
            if read(&left).entry_count() >= degree {
                let replacement = self.edge_entry(Arc::clone(&left), Direction::Descending)?;
                key = replacement.0.clone();
                let (_, old) = mem::replace(&mut write(&node).entries_mut()[index], replacement);
                self.manager.mark_as_changed(&node);
                removed = removed.or(Some(old));
                node = left;
            } else if read(&right).entry_count() >= degree {
                let replacement = self.edge_entry(Arc::clone(&right), Direction::Ascending)?;
                key = replacement.0.clone();
                let (_, old) = mem::replace(&mut write(&node).entries_mut()[index], replacement);
                self.manager.mark_as_changed(&node);
                removed = removed.or(Some(old));
                node = right;
            } else {
                self.merge(&node, index, &left, &right)?;
                node = left;
            }
        }
    }

    /// The smallest (ascending) or largest (descending) entry below `node`.
    fn edge_entry(&mut self, node: NodeHandle<K, V>, direction: Direction) -> BTreeResult<(K, V)> {
        let leaf = descend(&mut self.manager, node, direction)?;
        let n = read(&leaf);
        let entry = match direction {
            Direction::Ascending => n.entries().first(),
            Direction::Descending => n.entries().last(),
        };
        entry.cloned().ok_or_else(|| corrupted(&n, "is an empty leaf"))
    }

    /// Make sure child `index` of `node` holds at least `degree` entries
    /// before descending into it, borrowing from a sibling or merging with
    /// one. Returns the node to descend into.
    fn fill_child(&mut self, node: &NodeHandle<K, V>, index: usize) -> BTreeResult<NodeHandle<K, V>> {
        let degree = self.manager.config().degree;
        let child = self.child(node, index)?;
        if read(&child).entry_count() >= degree {
            return Ok(child);
        }
        let count = read(node).entry_count();
        if index > 0 {
            let left = self.child(node, index - 1)?;
            if read(&left).entry_count() >= degree {
                self.rotate_right(node, index - 1, &left, &child)?;
                return Ok(child);
            }
        }
        if index < count {
            let right = self.child(node, index + 1)?;
            if read(&right).entry_count() >= degree {
                self.rotate_left(node, index, &child, &right)?;
                return Ok(child);
            }
            self.merge(node, index, &child, &right)?;
            return Ok(child);
        }
        let left_index = index
            .checked_sub(1)
            .ok_or_else(|| BTreeError::Corrupted("descended below an empty internal node".into()))?;
        let left = self.child(node, left_index)?;
        self.merge(node, left_index, &left, &child)?;
        Ok(left)
    }

    /// Move the separator at `separator` down into `child` and the last entry
    /// of `left` up in its place.
    fn rotate_right(
        &mut self,
        parent: &NodeHandle<K, V>,
        separator: usize,
        left: &NodeHandle<K, V>,
        child: &NodeHandle<K, V>,
    ) -> BTreeResult<()> {
        let (entry, moved_child) = {
            let mut l = write(left);
            let entry = l.entries_mut().pop().ok_or_else(|| corrupted(&l, "has nothing to lend"))?;
            let moved_child = l.children_mut().pop();
            (entry, moved_child)
        };
        let down = mem::replace(&mut write(parent).entries_mut()[separator], entry);
        {
            let mut c = write(child);
            c.entries_mut().insert(0, down);
            if let Some(moved) = moved_child {
                c.children_mut().insert(0, moved);
            }
        }
        self.manager.mark_as_changed(parent);
        self.manager.mark_as_changed(left);
        self.manager.mark_as_changed(child);
        if moved_child.is_some() {
            self.relink_children(child, 0)?;
        }
        Ok(())
    }

    /// Move the separator at `separator` down into `child` and the first
    /// entry of `right` up in its place.
    fn rotate_left(
        &mut self,
        parent: &NodeHandle<K, V>,
        separator: usize,
        child: &NodeHandle<K, V>,
        right: &NodeHandle<K, V>,
    ) -> BTreeResult<()> {
        let (entry, moved_child) = {
            let mut r = write(right);
            if r.entry_count() == 0 {
                return Err(corrupted(&r, "has nothing to lend"));
            }
            let entry = r.entries_mut().remove(0);
            let moved_child = if r.is_leaf() {
                None
            } else {
                Some(r.children_mut().remove(0))
            };
            (entry, moved_child)
        };
        let down = mem::replace(&mut write(parent).entries_mut()[separator], entry);
        let moved_slot = {
            let mut c = write(child);
            c.entries_mut().push(down);
            moved_child.map(|moved| {
                c.children_mut().push(moved);
                c.children().len() - 1
            })
        };
        self.manager.mark_as_changed(parent);
        self.manager.mark_as_changed(child);
        self.manager.mark_as_changed(right);
        if let Some(slot) = moved_slot {
            self.relink_children(child, slot)?;
            self.relink_children(right, 0)?;
        }
        Ok(())
    }

    /// Fold the separator at `separator` and all of `right` into `left`, then
    /// delete `right`.
    fn merge(
        &mut self,
        parent: &NodeHandle<K, V>,
        separator: usize,
        left: &NodeHandle<K, V>,
        right: &NodeHandle<K, V>,
    ) -> BTreeResult<()> {
        let down = {
            let mut p = write(parent);
            p.children_mut().remove(separator + 1);
            p.entries_mut().remove(separator)
        };
        let (entries, children) = {
            let mut r = write(right);
            (mem::take(r.entries_mut()), mem::take(r.children_mut()))
        };
        let from = {
            let mut l = write(left);
            l.entries_mut().push(down);
            l.entries_mut().extend(entries);
            let from = l.children().len();
            l.children_mut().extend(children);
            from
        };
        self.manager.mark_as_changed(parent);
        self.manager.mark_as_changed(left);
        self.relink_children(left, from)?;
        self.relink_children(parent, separator + 1)?;
        self.manager.delete(right)
    }
}

fn corrupted<K, V>(node: &TreeNode<K, V>, what: &str) -> BTreeError {
    BTreeError::Corrupted(format!("node {} {what}", node.id()))
}
