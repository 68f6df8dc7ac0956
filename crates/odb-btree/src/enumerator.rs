use std::mem;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BTreeError, BTreeResult};
use crate::manager::{read, TreeDiskNodeManager};
use crate::node::{NodeHandle, NodeId};

/// Traversal order of a [`TreeEnumerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

enum Cursor<K, V> {
    /// Positioned before the first entry to yield.
    Start { node: NodeHandle<K, V>, index: usize },
    /// Positioned on an entry that has been yielded.
    At { node: NodeHandle<K, V>, index: usize },
    Finished,
}

/// In-order cursor over the entries of a tree.
///
/// Moves one way only and cannot be rewound; once [`move_next`] returns
/// `false` it keeps returning `false`. A structural fault met on the way
/// ends the traversal with [`BTreeError::Corrupted`]. Mutating the tree
/// while an enumerator is live is not supported.
///
/// [`move_next`]: TreeEnumerator::move_next
pub struct TreeEnumerator<'a, K, V> {
    manager: &'a mut TreeDiskNodeManager<K, V>,
    cursor: Cursor<K, V>,
    direction: Direction,
}

impl<'a, K, V> TreeEnumerator<'a, K, V>
where
    K: Serialize + DeserializeOwned + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    /// Start at entry `index` of `node`; the first [`move_next`] lands on it.
    ///
    /// [`move_next`]: TreeEnumerator::move_next
    pub fn new(
        manager: &'a mut TreeDiskNodeManager<K, V>,
        node: NodeHandle<K, V>,
        index: usize,
        direction: Direction,
    ) -> BTreeResult<Self> {
        let (id, count) = {
            let n = read(&node);
            (n.id(), n.entry_count())
        };
        if index >= count {
            return Err(BTreeError::InvalidPosition { node: id, index });
        }
        Ok(Self {
            manager,
            cursor: Cursor::Start { node, index },
            direction,
        })
    }

    /// Enumerate the whole tree from its smallest key.
    pub fn ascending(manager: &'a mut TreeDiskNodeManager<K, V>) -> BTreeResult<Self> {
        let root = manager.root_node()?;
        let leaf = descend(manager, root, Direction::Ascending)?;
        let count = read(&leaf).entry_count();
        if count == 0 {
            return Ok(Self::finished(manager, Direction::Ascending));
        }
        Self::new(manager, leaf, 0, Direction::Ascending)
    }

    /// Enumerate the whole tree from its largest key.
    pub fn descending(manager: &'a mut TreeDiskNodeManager<K, V>) -> BTreeResult<Self> {
        let root = manager.root_node()?;
        let leaf = descend(manager, root, Direction::Descending)?;
        let count = read(&leaf).entry_count();
        if count == 0 {
            return Ok(Self::finished(manager, Direction::Descending));
        }
        Self::new(manager, leaf, count - 1, Direction::Descending)
    }

    /// An enumerator that yields nothing.
    pub fn finished(manager: &'a mut TreeDiskNodeManager<K, V>, direction: Direction) -> Self {
        Self {
            manager,
            cursor: Cursor::Finished,
            direction,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.cursor, Cursor::Finished)
    }

    /// Advance to the next entry. Returns `false` once the traversal is over.
    pub fn move_next(&mut self) -> BTreeResult<bool> {
        let cursor = mem::replace(&mut self.cursor, Cursor::Finished);
        let next = match cursor {
            Cursor::Finished => return Ok(false),
            Cursor::Start { node, index } => Some((node, index)),
            Cursor::At { node, index } => match self.direction {
                Direction::Ascending => successor(self.manager, node, index)?,
                Direction::Descending => predecessor(self.manager, node, index)?,
            },
        };
        match next {
            Some((node, index)) => {
                self.cursor = Cursor::At { node, index };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The entry the cursor is on, if [`move_next`] last returned `true`.
    ///
    /// [`move_next`]: TreeEnumerator::move_next
    pub fn current(&self) -> Option<(K, V)> {
        match &self.cursor {
            Cursor::At { node, index } => read(node).entries().get(*index).cloned(),
            _ => None,
        }
    }

    /// Enumerators cannot be rewound.
    pub fn reset(&mut self) -> BTreeResult<()> {
        Err(BTreeError::ResetUnsupported)
    }
}

impl<K, V> Iterator for TreeEnumerator<'_, K, V>
where
    K: Serialize + DeserializeOwned + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    type Item = BTreeResult<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.move_next() {
            Ok(true) => self.current().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Follow the leftmost (ascending) or rightmost (descending) child chain of
/// `node` down to a leaf.
pub(crate) fn descend<K, V>(
    manager: &mut TreeDiskNodeManager<K, V>,
    mut node: NodeHandle<K, V>,
    direction: Direction,
) -> BTreeResult<NodeHandle<K, V>>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    loop {
        let child_id = {
            let n = read(&node);
            match direction {
                Direction::Ascending => n.children().first().copied(),
                Direction::Descending => n.children().last().copied(),
            }
        };
        let Some(child_id) = child_id else {
            return Ok(node);
        };
        node = load(manager, child_id)?;
    }
}

fn successor<K, V>(
    manager: &mut TreeDiskNodeManager<K, V>,
    node: NodeHandle<K, V>,
    index: usize,
) -> BTreeResult<Option<(NodeHandle<K, V>, usize)>>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    let (child_id, count) = {
        let n = read(&node);
        (n.child_id(index + 1), n.entry_count())
    };
    if let Some(child_id) = child_id {
        let child = load(manager, child_id)?;
        let leaf = descend(manager, child, Direction::Ascending)?;
        ensure_populated(&leaf)?;
        return Ok(Some((leaf, 0)));
    }
    if index + 1 < count {
        return Ok(Some((node, index + 1)));
    }
    let mut current = node;
    while let Some((parent, position)) = climb(manager, &current)? {
        if position < read(&parent).entry_count() {
            return Ok(Some((parent, position)));
        }
        current = parent;
    }
    Ok(None)
}

fn predecessor<K, V>(
    manager: &mut TreeDiskNodeManager<K, V>,
    node: NodeHandle<K, V>,
    index: usize,
) -> BTreeResult<Option<(NodeHandle<K, V>, usize)>>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    let child_id = read(&node).child_id(index);
    if let Some(child_id) = child_id {
        let child = load(manager, child_id)?;
        let leaf = descend(manager, child, Direction::Descending)?;
        let count = ensure_populated(&leaf)?;
        return Ok(Some((leaf, count - 1)));
    }
    if index > 0 {
        return Ok(Some((node, index - 1)));
    }
    let mut current = node;
    while let Some((parent, position)) = climb(manager, &current)? {
        if position > 0 {
            return Ok(Some((parent, position - 1)));
        }
        current = parent;
    }
    Ok(None)
}

/// The parent of `node` and the child slot `node` occupies in it, or `None`
/// at the root.
fn climb<K, V>(
    manager: &mut TreeDiskNodeManager<K, V>,
    node: &NodeHandle<K, V>,
) -> BTreeResult<Option<(NodeHandle<K, V>, usize)>>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    let (id, parent_id, position) = {
        let n = read(node);
        (n.id(), n.parent(), n.index_in_parent())
    };
    let Some(parent_id) = parent_id else {
        return Ok(None);
    };
    let parent = load(manager, parent_id)?;
    if read(&parent).child_id(position) != Some(id) {
        return Err(BTreeError::Corrupted(format!(
            "node {id} claims slot {position} of node {parent_id}"
        )));
    }
    Ok(Some((parent, position)))
}

fn load<K, V>(manager: &mut TreeDiskNodeManager<K, V>, id: NodeId) -> BTreeResult<NodeHandle<K, V>>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    manager
        .find(id)?
        .ok_or_else(|| BTreeError::Corrupted(format!("node {id} is missing")))
}

fn ensure_populated<K, V>(leaf: &NodeHandle<K, V>) -> BTreeResult<usize> {
    let n = read(leaf);
    if n.entry_count() == 0 {
        return Err(BTreeError::Corrupted(format!("leaf {} has no entries", n.id())));
    }
    Ok(n.entry_count())
}
