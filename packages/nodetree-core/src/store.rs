use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::arena::Arena;
use crate::config::{StoreConfig, TreeEncoding};
use crate::error::{Error, Result};
use crate::ids::{type_key, NodeHandle, NodeKey, NodeValue};
use crate::ordering::ChildOrder;
use crate::reconstruction::{DepthHint, ReconstructionQueue};

/// One tree element. Owned by its store's arena; the parent link is a plain
/// handle and never keeps the parent alive.
#[derive(Clone, Debug)]
pub struct Node<I, V> {
    pub(crate) id: I,
    pub(crate) value: Option<V>,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
}

impl<I, V> Node<I, V> {
    pub fn id(&self) -> &I {
        &self.id
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Children in insertion order; see [`NodeStore::ordered_children`].
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn role(&self) -> NodeRole {
        if self.is_root() {
            NodeRole::Root
        } else if self.is_leaf() {
            NodeRole::Leaf
        } else {
            NodeRole::Node
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Root,
    Node,
    Leaf,
}

/// Outcome of a node creation call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Insertion {
    /// A new node was created and indexed.
    Registered(NodeHandle),
    /// A node with this id is already indexed; nothing was created.
    Existing(NodeHandle),
    /// The parent is unknown; the request waits in the reconstruction queue.
    Deferred,
}

impl Insertion {
    pub fn handle(&self) -> Option<NodeHandle> {
        match self {
            Insertion::Registered(h) | Insertion::Existing(h) => Some(*h),
            Insertion::Deferred => None,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Insertion::Registered(_))
    }
}

/// Single-writer store for one concrete `(id, value)` pair: the node arena, the
/// id index ("quickmap"), the root set and the reconstruction queue.
///
/// The quickmap is a bounded lookup cache, not the owner of nodes. It may go
/// stale between structural mutations; [`NodeStore::rebuild`] restores it.
/// Id uniqueness is enforced against `live_ids`, which tracks every live node
/// and is never evicted.
pub struct NodeStore<I, V> {
    pub(crate) type_key: String,
    pub(crate) config: StoreConfig,
    pub(crate) order: ChildOrder<I, V>,
    pub(crate) nodes: Arena<Node<I, V>>,
    pub(crate) quickmap: IndexMap<I, NodeHandle>,
    pub(crate) live_ids: HashMap<I, NodeHandle>,
    pub(crate) roots: IndexSet<NodeHandle>,
    pub(crate) pending: ReconstructionQueue<I, V>,
    pub(crate) encodings: HashMap<NodeHandle, TreeEncoding>,
    pub(crate) reconstructing: bool,
}

impl<I: NodeKey, V: NodeValue> Default for NodeStore<I, V> {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl<I: NodeKey, V: NodeValue> NodeStore<I, V> {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_order(config, ChildOrder::default())
    }

    pub fn with_order(config: StoreConfig, order: ChildOrder<I, V>) -> Self {
        Self {
            type_key: type_key::<I, V>(),
            config,
            order,
            nodes: Arena::new(),
            quickmap: IndexMap::new(),
            live_ids: HashMap::new(),
            roots: IndexSet::new(),
            pending: ReconstructionQueue::default(),
            encodings: HashMap::new(),
            reconstructing: false,
        }
    }

    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.quickmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quickmap.is_empty()
    }

    /// Number of live nodes, indexed or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, node: NodeHandle) -> Option<&Node<I, V>> {
        self.nodes.get(node)
    }

    pub(crate) fn try_get(&self, node: NodeHandle) -> Result<&Node<I, V>> {
        self.nodes.get(node).ok_or(Error::StaleHandle(node))
    }

    pub fn lookup<Q>(&self, id: &Q) -> Option<NodeHandle>
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.quickmap.get(id).copied()
    }

    pub fn lookup_node<Q>(&self, id: &Q) -> Option<&Node<I, V>>
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(id).and_then(|h| self.get(h))
    }

    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.quickmap.contains_key(id)
    }

    /// Live node with this id, indexed or evicted from the quickmap.
    pub fn locate<Q>(&self, id: &Q) -> Option<NodeHandle>
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(id).or_else(|| self.live_ids.get(id).copied())
    }

    /// Indexed ids, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &I> + '_ {
        self.quickmap.keys()
    }

    /// Creates a parentless node. An id that is already indexed is left alone.
    pub fn insert_root(&mut self, id: impl Into<I>, value: impl Into<Option<V>>) -> Insertion {
        let id = id.into();
        if let Some(existing) = self.locate(&id) {
            debug!(id = ?id, "node already registered; skipping root insert");
            return Insertion::Existing(existing);
        }
        Insertion::Registered(self.alloc(id, value.into(), None))
    }

    /// Creates a node under `parent`. An id that is already indexed is left alone.
    pub fn insert_child(
        &mut self,
        parent: NodeHandle,
        id: impl Into<I>,
        value: impl Into<Option<V>>,
    ) -> Result<Insertion> {
        let id = id.into();
        if !self.nodes.contains(parent) {
            return Err(Error::StaleHandle(parent));
        }
        if let Some(existing) = self.locate(&id) {
            debug!(id = ?id, "node already registered; skipping child insert");
            return Ok(Insertion::Existing(existing));
        }
        Ok(Insertion::Registered(self.alloc(id, value.into(), Some(parent))))
    }

    /// Out-of-order creation entry point.
    ///
    /// `parent_id == id` means "no parent". When the parent id is not indexed yet
    /// the request is queued and materialized by a later [`NodeStore::attempt`].
    pub fn create(
        &mut self,
        id: impl Into<I>,
        value: impl Into<Option<V>>,
        parent_id: Option<I>,
    ) -> Result<Insertion> {
        let id = id.into();
        let value = value.into();
        if let Some(existing) = self.locate(&id) {
            debug!(id = ?id, "node already registered");
            return Ok(Insertion::Existing(existing));
        }
        let parent_id = parent_id.filter(|p| {
            let is_self = *p == id;
            if is_self {
                debug!(id = ?id, "node declared itself as parent; creating it as a root");
            }
            !is_self
        });
        match parent_id {
            None => Ok(self.insert_root(id, value)),
            Some(parent_id) => match self.locate(&parent_id) {
                Some(parent) => self.insert_child(parent, id, value),
                None => {
                    self.enqueue(id, value, Some(parent_id), DepthHint::Unknown);
                    Ok(Insertion::Deferred)
                }
            },
        }
    }

    fn alloc(&mut self, id: I, value: Option<V>, parent: Option<NodeHandle>) -> NodeHandle {
        let handle = self.nodes.insert(Node {
            id: id.clone(),
            value,
            parent,
            children: Vec::new(),
        });
        self.live_ids.insert(id, handle);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.push(handle);
        }
        // Freshly allocated, so registration cannot fail.
        let _ = self.register(handle);
        handle
    }

    /// Indexes a live node under its id.
    ///
    /// Returns `Ok(false)` when the id is already indexed. A successful
    /// registration retries the reconstruction queue.
    pub fn register(&mut self, node: NodeHandle) -> Result<bool> {
        let n = self.try_get(node)?;
        let id = n.id.clone();
        let is_root = n.is_root();
        if self.quickmap.contains_key(&id) {
            debug!(id = ?id, "node already registered");
            return Ok(false);
        }
        if self.live_ids.get(&id).is_some_and(|h| *h != node) {
            debug!(id = ?id, node = %node, "id belongs to another live node");
            return Ok(false);
        }
        if self.quickmap.len() >= self.config.max_indexed_nodes {
            self.evict_oldest();
        }
        self.quickmap.insert(id.clone(), node);
        if is_root {
            self.roots.insert(node);
        }
        self.pending.forget_expected(&id);
        if !self.pending.is_empty() && !self.reconstructing {
            self.attempt(false);
        }
        Ok(true)
    }

    fn evict_oldest(&mut self) {
        let victim = self
            .quickmap
            .iter()
            .position(|(_, h)| self.nodes.get(*h).map_or(true, |n| !n.is_root()));
        match victim {
            Some(index) => {
                if let Some((id, _)) = self.quickmap.shift_remove_index(index) {
                    warn!(
                        id = ?id,
                        capacity = self.config.max_indexed_nodes,
                        "quickmap full; evicted oldest non-root entry"
                    );
                }
            }
            None => warn!(
                capacity = self.config.max_indexed_nodes,
                "quickmap full of roots; growing past capacity"
            ),
        }
    }

    /// Drops `id` from the index and root set. With `node` given, only an entry
    /// pointing at that handle is removed. Absent ids are a no-op.
    pub fn unregister<Q>(&mut self, id: &Q, node: Option<NodeHandle>) -> bool
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(indexed) = self.lookup(id) else {
            return false;
        };
        if node.is_some_and(|h| h != indexed) {
            return false;
        }
        self.quickmap.shift_remove(id);
        self.roots.shift_remove(&indexed);
        true
    }

    fn is_indexed_root(&self, handle: NodeHandle) -> bool {
        self.nodes
            .get(handle)
            .is_some_and(|n| n.is_root() && self.quickmap.get(&n.id) == Some(&handle))
    }

    /// Currently valid roots; stale or re-parented entries are pruned.
    pub fn roots(&mut self) -> Vec<NodeHandle> {
        let live: IndexSet<NodeHandle> = self
            .roots
            .iter()
            .copied()
            .filter(|h| self.is_indexed_root(*h))
            .collect();
        self.roots = live;
        self.roots.iter().copied().collect()
    }

    /// Read-only variant of [`NodeStore::roots`]; filters without pruning.
    pub fn valid_roots(&self) -> Vec<NodeHandle> {
        self.roots
            .iter()
            .copied()
            .filter(|h| self.is_indexed_root(*h))
            .collect()
    }

    /// Recomputes root membership from the quickmap.
    pub fn refresh_roots(&mut self) {
        let mut roots: IndexSet<NodeHandle> = self
            .roots
            .iter()
            .copied()
            .filter(|h| self.is_indexed_root(*h))
            .collect();
        for handle in self.quickmap.values() {
            if self.nodes.get(*handle).is_some_and(|n| n.is_root()) {
                roots.insert(*handle);
            }
        }
        self.roots = roots;
    }

    pub fn set_value(&mut self, node: NodeHandle, value: impl Into<Option<V>>) -> Result<()> {
        let n = self.nodes.get_mut(node).ok_or(Error::StaleHandle(node))?;
        n.value = value.into();
        Ok(())
    }

    pub fn depth(&self, node: NodeHandle) -> Option<usize> {
        let mut current = self.get(node)?;
        let mut depth = 0;
        while let Some(parent) = current.parent.and_then(|p| self.get(p)) {
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    pub fn root_of(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut handle = node;
        let mut current = self.get(node)?;
        while let Some(parent) = current.parent {
            match self.get(parent) {
                Some(p) => {
                    handle = parent;
                    current = p;
                }
                None => break,
            }
        }
        Some(handle)
    }

    pub fn role(&self, node: NodeHandle) -> Option<NodeRole> {
        self.get(node).map(Node::role)
    }

    /// Encoding used for the tree containing `node`.
    pub fn tree_encoding(&self, node: NodeHandle) -> TreeEncoding {
        self.root_of(node)
            .and_then(|root| self.encodings.get(&root).copied())
            .unwrap_or(self.config.default_encoding)
    }

    pub fn set_tree_encoding(&mut self, node: NodeHandle, encoding: TreeEncoding) -> Result<()> {
        let root = self.root_of(node).ok_or(Error::StaleHandle(node))?;
        self.encodings.insert(root, encoding);
        Ok(())
    }

    fn introduces_cycle(&self, node: NodeHandle, potential_parent: NodeHandle) -> bool {
        let mut current = Some(potential_parent);
        while let Some(n) = current {
            if n == node {
                return true;
            }
            current = self.get(n).and_then(|state| state.parent);
        }
        false
    }

    fn unlink_from_parent(&mut self, node: NodeHandle) {
        let parent = self.nodes.get_mut(node).and_then(|n| n.parent.take());
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.retain(|c| *c != node);
        }
    }

    /// Moves `node` and its subtree under `new_parent`, appended last.
    pub fn attach(&mut self, node: NodeHandle, new_parent: NodeHandle) -> Result<()> {
        self.attach_at(node, new_parent, usize::MAX)
    }

    /// Moves `node` under `new_parent` at `position` (clamped to the child count).
    pub fn attach_at(
        &mut self,
        node: NodeHandle,
        new_parent: NodeHandle,
        position: usize,
    ) -> Result<()> {
        self.try_get(node)?;
        self.try_get(new_parent)?;
        if node == new_parent {
            return Err(Error::InvalidOperation(
                "node cannot be its own parent".into(),
            ));
        }
        if self.introduces_cycle(node, new_parent) {
            return Err(Error::InvalidOperation(
                "attach would introduce a cycle".into(),
            ));
        }
        let old_root = self.root_of(node);
        self.unlink_from_parent(node);
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = Some(new_parent);
        }
        if let Some(p) = self.nodes.get_mut(new_parent) {
            let position = position.min(p.children.len());
            p.children.insert(position, node);
        }
        self.roots.shift_remove(&node);
        if let Some(mode) = old_root
            .filter(|r| *r == node)
            .and_then(|r| self.encodings.remove(&r))
        {
            debug!(node = %node, mode = ?mode, "dropping tree encoding of re-parented root");
        }
        self.rebuild(new_parent);
        Ok(())
    }

    /// Cuts `node` from its parent, making it the root of its own tree.
    pub fn detach(&mut self, node: NodeHandle) -> Result<()> {
        if self.try_get(node)?.is_root() {
            return Ok(());
        }
        let old_root = self.root_of(node);
        self.unlink_from_parent(node);
        self.rebuild(node);
        if let Some(old_root) = old_root {
            self.rebuild(old_root);
        }
        Ok(())
    }

    /// Destroys `node` and every descendant. Returns the number of freed nodes.
    pub fn remove_subtree(&mut self, node: NodeHandle) -> Result<usize> {
        self.try_get(node)?;
        self.unlink_from_parent(node);
        let mut stack = vec![node];
        let mut removed = 0;
        while let Some(handle) = stack.pop() {
            let Some(n) = self.nodes.remove(handle) else {
                continue;
            };
            stack.extend(n.children.iter().copied());
            if self.quickmap.get(&n.id) == Some(&handle) {
                self.quickmap.shift_remove(&n.id);
            }
            if self.live_ids.get(&n.id) == Some(&handle) {
                self.live_ids.remove(&n.id);
            }
            self.roots.shift_remove(&handle);
            self.encodings.remove(&handle);
            removed += 1;
        }
        debug!(node = %node, removed, "removed subtree");
        Ok(removed)
    }

    /// Checks id uniqueness, back-links, acyclicity, index entries and the
    /// root-set equation.
    pub fn validate_invariants(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for (handle, node) in self.nodes.iter() {
            if !ids.insert(&node.id) {
                return Err(Error::InconsistentState(format!(
                    "id {:?} is held by more than one live node",
                    node.id
                )));
            }
            if self.live_ids.get(&node.id) != Some(&handle) {
                return Err(Error::InconsistentState(format!(
                    "live id {:?} is not tracked",
                    node.id
                )));
            }
            let mut seen = HashSet::new();
            for child in &node.children {
                if !seen.insert(*child) {
                    return Err(Error::InconsistentState("duplicate child entry".into()));
                }
                match self.nodes.get(*child) {
                    Some(c) if c.parent == Some(handle) => {}
                    Some(_) => {
                        return Err(Error::InconsistentState("child parent mismatch".into()))
                    }
                    None => {
                        return Err(Error::InconsistentState(
                            "child not present in arena".into(),
                        ))
                    }
                }
            }
            if let Some(parent) = node.parent {
                let owned = self
                    .nodes
                    .get(parent)
                    .is_some_and(|p| p.children.contains(&handle));
                if !owned {
                    return Err(Error::InconsistentState(
                        "parent does not own child".into(),
                    ));
                }
            }
            if self.has_cycle_from(handle) {
                return Err(Error::InconsistentState("cycle detected".into()));
            }
        }

        for (id, handle) in &self.quickmap {
            match self.nodes.get(*handle) {
                Some(node) if node.id == *id => {}
                Some(_) => {
                    return Err(Error::InconsistentState(format!(
                        "quickmap entry {id:?} points at another node"
                    )))
                }
                None => {
                    return Err(Error::InconsistentState(format!(
                        "quickmap entry {id:?} points at a freed node"
                    )))
                }
            }
        }

        let expected: HashSet<NodeHandle> = self
            .quickmap
            .values()
            .copied()
            .filter(|h| self.nodes.get(*h).is_some_and(|n| n.is_root()))
            .collect();
        let actual: HashSet<NodeHandle> = self.valid_roots().into_iter().collect();
        if expected != actual {
            return Err(Error::InconsistentState(
                "root set does not match indexed parentless nodes".into(),
            ));
        }
        Ok(())
    }

    fn has_cycle_from(&self, start: NodeHandle) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(n) = current {
            if !visited.insert(n) {
                return true;
            }
            current = self.get(n).and_then(|s| s.parent);
        }
        false
    }

    /// Drops every node, index entry and pending item.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.quickmap.clear();
        self.live_ids.clear();
        self.roots.clear();
        self.encodings.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Store = NodeStore<String, String>;

    fn root(store: &mut Store, id: &str) -> NodeHandle {
        store.insert_root(id, id.to_string()).handle().unwrap()
    }

    fn child(store: &mut Store, parent: NodeHandle, id: &str) -> NodeHandle {
        store
            .insert_child(parent, id, id.to_string())
            .unwrap()
            .handle()
            .unwrap()
    }

    #[test]
    fn register_is_idempotent() {
        let mut store = Store::default();
        let a = root(&mut store, "a");
        assert!(!store.register(a).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.roots(), vec![a]);

        let again = store.insert_root("a", "other".to_string());
        assert_eq!(again, Insertion::Existing(a));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(a).unwrap().value().unwrap(), "a");
    }

    #[test]
    fn create_with_self_parent_makes_a_root() {
        let mut store = Store::default();
        let created = store
            .create("x", "x".to_string(), Some("x".to_string()))
            .unwrap();
        let handle = created.handle().unwrap();
        assert!(store.get(handle).unwrap().is_root());
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn create_with_missing_parent_defers() {
        let mut store = Store::default();
        let created = store
            .create("c", "c".to_string(), Some("p".to_string()))
            .unwrap();
        assert_eq!(created, Insertion::Deferred);
        assert_eq!(store.len(), 0);
        assert!(store.expects("p"));
    }

    #[test]
    fn unregister_missing_id_is_noop() {
        let mut store = Store::default();
        let a = root(&mut store, "a");
        assert!(!store.unregister("zzz", None));
        let other = root(&mut store, "b");
        assert!(!store.unregister("a", Some(other)));
        assert!(store.unregister("a", Some(a)));
        assert!(!store.contains("a"));
        assert_eq!(store.roots(), vec![other]);
    }

    #[test]
    fn attach_rejects_self_and_cycles() {
        let mut store = Store::default();
        let a = root(&mut store, "a");
        let b = child(&mut store, a, "b");
        let c = child(&mut store, b, "c");

        assert!(matches!(
            store.attach(a, a),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            store.attach(a, c),
            Err(Error::InvalidOperation(_))
        ));
        store.validate_invariants().unwrap();
    }

    #[test]
    fn attach_moves_roots_into_trees() {
        let mut store = Store::default();
        let a = root(&mut store, "a");
        let b = root(&mut store, "b");
        let b1 = child(&mut store, b, "b1");

        store.attach(b, a).unwrap();
        assert_eq!(store.roots(), vec![a]);
        assert_eq!(store.depth(b1), Some(2));
        assert_eq!(store.root_of(b1), Some(a));
        store.validate_invariants().unwrap();

        store.detach(b).unwrap();
        let roots: HashSet<_> = store.roots().into_iter().collect();
        assert_eq!(roots, HashSet::from([a, b]));
        assert_eq!(store.role(a), Some(NodeRole::Root));
        assert_eq!(store.role(b1), Some(NodeRole::Leaf));
        store.validate_invariants().unwrap();
    }

    #[test]
    fn attach_at_clamps_position() {
        let mut store = Store::default();
        let a = root(&mut store, "a");
        let x = child(&mut store, a, "x");
        let y = root(&mut store, "y");
        store.attach_at(y, a, 0).unwrap();
        assert_eq!(store.get(a).unwrap().children(), &[y, x]);
        let z = root(&mut store, "z");
        store.attach_at(z, a, 99).unwrap();
        assert_eq!(store.get(a).unwrap().children(), &[y, x, z]);
    }

    #[test]
    fn remove_subtree_frees_descendants() {
        let mut store = Store::default();
        let a = root(&mut store, "a");
        let b = child(&mut store, a, "b");
        let c = child(&mut store, b, "c");
        child(&mut store, a, "d");

        assert_eq!(store.remove_subtree(b).unwrap(), 2);
        assert!(store.get(c).is_none());
        assert!(!store.contains("b"));
        assert!(!store.contains("c"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.node_count(), 2);
        assert!(matches!(store.remove_subtree(b), Err(Error::StaleHandle(_))));
        store.validate_invariants().unwrap();
    }

    #[test]
    fn eviction_keeps_roots() {
        let config = StoreConfig {
            max_indexed_nodes: 3,
            ..Default::default()
        };
        let mut store = Store::new(config);
        let a = root(&mut store, "a");
        child(&mut store, a, "b");
        child(&mut store, a, "c");
        child(&mut store, a, "d");

        assert_eq!(store.len(), 3);
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert_eq!(store.node_count(), 4);
    }

    #[test]
    fn evicted_ids_are_not_created_twice() {
        let config = StoreConfig {
            max_indexed_nodes: 3,
            ..Default::default()
        };
        let mut store = Store::new(config);
        let a = root(&mut store, "a");
        let b = child(&mut store, a, "b");
        child(&mut store, a, "c");
        child(&mut store, a, "d");
        assert!(!store.contains("b"));
        assert_eq!(store.locate("b"), Some(b));

        let again = store.create("b", "b".to_string(), Some("a".to_string())).unwrap();
        assert_eq!(again, Insertion::Existing(b));
        let under_evicted = store.create("e", "e".to_string(), Some("b".to_string())).unwrap();
        assert!(under_evicted.is_registered());
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.node_count(), 5);
        store.validate_invariants().unwrap();
    }

    #[test]
    fn validation_rejects_duplicate_live_ids() {
        let mut store = Store::default();
        root(&mut store, "a");
        store.nodes.insert(Node {
            id: "a".to_string(),
            value: None,
            parent: None,
            children: Vec::new(),
        });
        assert!(matches!(
            store.validate_invariants(),
            Err(Error::InconsistentState(_))
        ));
    }

    #[test]
    fn tree_encoding_follows_root() {
        let mut store = Store::default();
        let a = root(&mut store, "a");
        let b = child(&mut store, a, "b");
        assert_eq!(store.tree_encoding(b), TreeEncoding::Flat);
        store.set_tree_encoding(b, TreeEncoding::Nested).unwrap();
        assert_eq!(store.tree_encoding(a), TreeEncoding::Nested);
    }
}
