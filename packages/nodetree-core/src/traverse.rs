use std::borrow::Borrow;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::hash::Hash;
use std::ops::ControlFlow;

use crate::ids::{NodeHandle, NodeKey, NodeValue};
use crate::store::{Node, NodeRole, NodeStore};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Traversal {
    /// Pre-order: a node, then each child's subtree in child order.
    DepthFirst,
    /// Level by level, each level in child order.
    BreadthFirst,
}

impl<I: NodeKey, V: NodeValue> NodeStore<I, V> {
    /// Visits the subtree under `start` in the store's child order. The visitor
    /// stops the walk by returning `ControlFlow::Break`.
    pub fn walk<F>(
        &self,
        start: NodeHandle,
        traversal: Traversal,
        include_self: bool,
        mut visit: F,
    ) -> ControlFlow<()>
    where
        F: FnMut(NodeHandle, &Node<I, V>) -> ControlFlow<()>,
    {
        if self.get(start).is_none() {
            return ControlFlow::Continue(());
        }
        let initial: Vec<NodeHandle> = if include_self {
            vec![start]
        } else {
            self.ordered_children(start)
        };
        match traversal {
            Traversal::DepthFirst => {
                let mut stack: Vec<NodeHandle> = initial.into_iter().rev().collect();
                while let Some(handle) = stack.pop() {
                    let Some(node) = self.get(handle) else {
                        continue;
                    };
                    visit(handle, node)?;
                    stack.extend(self.ordered_children(handle).into_iter().rev());
                }
            }
            Traversal::BreadthFirst => {
                let mut queue: VecDeque<NodeHandle> = initial.into();
                while let Some(handle) = queue.pop_front() {
                    let Some(node) = self.get(handle) else {
                        continue;
                    };
                    visit(handle, node)?;
                    queue.extend(self.ordered_children(handle));
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Every node below `node`, breadth-first.
    pub fn descendants(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let _ = self.walk(node, Traversal::BreadthFirst, false, |h, _| {
            out.push(h);
            ControlFlow::Continue(())
        });
        out
    }

    /// Node count of the subtree including `node`; 0 for a stale handle.
    pub fn subtree_size(&self, node: NodeHandle) -> usize {
        let mut count = 0;
        let _ = self.walk(node, Traversal::DepthFirst, true, |_, _| {
            count += 1;
            ControlFlow::Continue(())
        });
        count
    }

    /// Descendants grouped by depth relative to `node` (children are depth 1).
    pub fn descendants_by_depth(&self, node: NodeHandle) -> BTreeMap<usize, Vec<NodeHandle>> {
        let mut levels = BTreeMap::new();
        let mut frontier = self.ordered_children(node);
        let mut depth = 1;
        while !frontier.is_empty() {
            let next = frontier
                .iter()
                .flat_map(|h| self.ordered_children(*h))
                .collect();
            levels.insert(depth, std::mem::replace(&mut frontier, next));
            depth += 1;
        }
        levels
    }

    /// Parent chain, nearest first.
    pub fn ancestors(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut current = self.get(node).and_then(|n| n.parent);
        while let Some(handle) = current {
            let Some(parent) = self.get(handle) else {
                break;
            };
            out.push(handle);
            current = parent.parent;
        }
        out
    }

    /// Ids from the root down to `node`.
    pub fn id_path(&self, node: NodeHandle) -> Vec<I> {
        let Some(n) = self.get(node) else {
            return Vec::new();
        };
        let mut path: Vec<I> = self
            .ancestors(node)
            .into_iter()
            .rev()
            .filter_map(|h| self.get(h).map(|a| a.id.clone()))
            .collect();
        path.push(n.id.clone());
        path
    }

    /// Strict: a node is not its own descendant.
    pub fn is_descendant_of(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        self.ancestors(node).contains(&ancestor)
    }

    pub fn is_ancestor_of(&self, node: NodeHandle, descendant: NodeHandle) -> bool {
        self.is_descendant_of(descendant, node)
    }

    /// Breadth-first search for `id` in the subtree under `node`, itself included.
    pub fn find_descendant<Q>(&self, node: NodeHandle, id: &Q) -> Option<NodeHandle>
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut found = None;
        let _ = self.walk(node, Traversal::BreadthFirst, true, |h, n| {
            if <I as Borrow<Q>>::borrow(&n.id) == id {
                found = Some(h);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        found
    }

    /// Indented dump of a subtree: `+` root, `-` inner node, `^` leaf.
    pub fn tree_description(&self, node: NodeHandle) -> String {
        let base = self.depth(node).unwrap_or(0);
        let mut out = String::new();
        let _ = self.walk(node, Traversal::DepthFirst, true, |h, n| {
            let depth = self.depth(h).unwrap_or(base) - base;
            let marker = match n.role() {
                NodeRole::Root => '+',
                NodeRole::Node => '-',
                NodeRole::Leaf => '^',
            };
            let _ = write!(out, "{}{} {:?}", "  ".repeat(depth), marker, n.id);
            if let Some(value) = &n.value {
                let _ = write!(out, " = {value:?}");
            }
            out.push('\n');
            ControlFlow::Continue(())
        });
        out
    }
}
