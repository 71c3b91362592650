use std::borrow::Borrow;
use std::hash::Hash;
use std::ops::ControlFlow;

use indexmap::IndexMap;
use tracing::trace;

use crate::ids::{NodeHandle, NodeKey, NodeValue};
use crate::store::NodeStore;
use crate::traverse::Traversal;

impl<I: NodeKey, V: NodeValue> NodeStore<I, V> {
    /// Re-derives the quickmap entries of the tree containing `from`.
    ///
    /// Climbs to the root, walks the whole tree depth-first in child order and
    /// swaps in a map holding exactly that tree's ids plus the still-live
    /// entries of other trees. The rebuilt tree moves to the young end of the
    /// map. Returns the number of visited nodes; a stale handle yields 0.
    pub fn rebuild(&mut self, from: NodeHandle) -> usize {
        let Some(root) = self.root_of(from) else {
            return 0;
        };
        let mut fresh: IndexMap<I, NodeHandle> = IndexMap::new();
        let mut visited = 0;
        let _ = self.walk(root, Traversal::DepthFirst, true, |handle, node| {
            visited += 1;
            fresh.insert(node.id.clone(), handle);
            ControlFlow::Continue(())
        });

        let mut merged: IndexMap<I, NodeHandle> = self
            .quickmap
            .iter()
            .filter(|(id, handle)| {
                !fresh.contains_key(*id)
                    && self.get(**handle).is_some_and(|n| n.id == **id)
                    && self.root_of(**handle) != Some(root)
            })
            .map(|(id, handle)| (id.clone(), *handle))
            .collect();
        merged.extend(fresh);
        self.quickmap = merged;
        self.refresh_roots();
        trace!(root = %root, visited, indexed = self.quickmap.len(), "rebuilt tree index");
        visited
    }

    pub fn rebuild_by_id<Q>(&mut self, id: &Q) -> usize
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.lookup(id) {
            Some(handle) => self.rebuild(handle),
            None => 0,
        }
    }

    /// Rebuilds every known tree. Returns the total number of visited nodes.
    pub fn rebuild_all(&mut self) -> usize {
        self.roots()
            .into_iter()
            .map(|root| self.rebuild(root))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Store = NodeStore<String, String>;

    fn build() -> (Store, NodeHandle, NodeHandle) {
        let mut store = Store::default();
        let a = store.insert_root("a", None).handle().unwrap();
        let a1 = store.insert_child(a, "a1", None).unwrap().handle().unwrap();
        store.insert_child(a1, "a1x", None).unwrap();
        let b = store.insert_root("b", None).handle().unwrap();
        store.insert_child(b, "b1", None).unwrap();
        (store, a1, b)
    }

    #[test]
    fn rebuild_from_any_node_visits_whole_tree() {
        let (mut store, a1, b) = build();
        assert_eq!(store.rebuild(a1), 3);
        assert_eq!(store.rebuild(b), 2);
        assert_eq!(store.len(), 5);
        store.validate_invariants().unwrap();
    }

    #[test]
    fn rebuild_restores_unregistered_ids() {
        let (mut store, a1, _) = build();
        store.unregister("a1x", None);
        assert!(!store.contains("a1x"));
        store.rebuild(a1);
        assert!(store.contains("a1x"));
        assert!(store.contains("b1"));
    }

    #[test]
    fn rebuild_of_stale_handle_is_empty() {
        let (mut store, a1, _) = build();
        store.remove_subtree(a1).unwrap();
        assert_eq!(store.rebuild(a1), 0);
    }

    #[test]
    fn rebuild_all_counts_every_tree() {
        let (mut store, _, _) = build();
        assert_eq!(store.rebuild_all(), 5);
        assert_eq!(store.rebuild_by_id("b1"), 2);
        assert_eq!(store.rebuild_by_id("missing"), 0);
        let keys: Vec<&String> = store.ids().collect();
        assert_eq!(keys.len(), 5);
    }
}
