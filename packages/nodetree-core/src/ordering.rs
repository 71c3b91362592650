use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::hash::stable_hash;
use crate::ids::{NodeHandle, NodeKey, NodeValue};
use crate::store::{Node, NodeStore};

pub type NodeComparator<I, V> = Arc<dyn Fn(&Node<I, V>, &Node<I, V>) -> Ordering + Send + Sync>;

/// Policy that orders a node's children for traversal, rebuilds and encoding.
///
/// Every policy except [`ChildOrder::Insertion`] falls back to the id hash when
/// its primary key ties, so structurally equal trees serialize identically no
/// matter in which order their nodes were created.
pub enum ChildOrder<I, V> {
    Insertion,
    ChildCount { ascending: bool },
    IdHash { ascending: bool },
    Id {
        ascending: bool,
        cmp: fn(&I, &I) -> Ordering,
    },
    /// Nodes without a value sort first.
    Value {
        ascending: bool,
        cmp: fn(&V, &V) -> Ordering,
    },
    Custom(NodeComparator<I, V>),
}

impl<I: Ord, V> ChildOrder<I, V> {
    pub fn by_id(ascending: bool) -> Self {
        ChildOrder::Id {
            ascending,
            cmp: <I as Ord>::cmp,
        }
    }
}

impl<I, V: Ord> ChildOrder<I, V> {
    pub fn by_value(ascending: bool) -> Self {
        ChildOrder::Value {
            ascending,
            cmp: <V as Ord>::cmp,
        }
    }
}

impl<I, V> ChildOrder<I, V> {
    pub fn custom<F>(cmp: F) -> Self
    where
        F: Fn(&Node<I, V>, &Node<I, V>) -> Ordering + Send + Sync + 'static,
    {
        ChildOrder::Custom(Arc::new(cmp))
    }
}

impl<I, V> Default for ChildOrder<I, V> {
    fn default() -> Self {
        ChildOrder::ChildCount { ascending: true }
    }
}

impl<I, V> Clone for ChildOrder<I, V> {
    fn clone(&self) -> Self {
        match self {
            ChildOrder::Insertion => ChildOrder::Insertion,
            ChildOrder::ChildCount { ascending } => ChildOrder::ChildCount {
                ascending: *ascending,
            },
            ChildOrder::IdHash { ascending } => ChildOrder::IdHash {
                ascending: *ascending,
            },
            ChildOrder::Id { ascending, cmp } => ChildOrder::Id {
                ascending: *ascending,
                cmp: *cmp,
            },
            ChildOrder::Value { ascending, cmp } => ChildOrder::Value {
                ascending: *ascending,
                cmp: *cmp,
            },
            ChildOrder::Custom(cmp) => ChildOrder::Custom(Arc::clone(cmp)),
        }
    }
}

impl<I, V> fmt::Debug for ChildOrder<I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildOrder::Insertion => f.write_str("Insertion"),
            ChildOrder::ChildCount { ascending } => f
                .debug_struct("ChildCount")
                .field("ascending", ascending)
                .finish(),
            ChildOrder::IdHash { ascending } => f
                .debug_struct("IdHash")
                .field("ascending", ascending)
                .finish(),
            ChildOrder::Id { ascending, .. } => {
                f.debug_struct("Id").field("ascending", ascending).finish()
            }
            ChildOrder::Value { ascending, .. } => f
                .debug_struct("Value")
                .field("ascending", ascending)
                .finish(),
            ChildOrder::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn directed(ordering: Ordering, ascending: bool) -> Ordering {
    if ascending {
        ordering
    } else {
        ordering.reverse()
    }
}

impl<I: NodeKey, V: NodeValue> ChildOrder<I, V> {
    /// `None` means "keep insertion order".
    pub fn compare(&self, a: &Node<I, V>, b: &Node<I, V>) -> Option<Ordering> {
        let by_hash = |ascending: bool| {
            directed(stable_hash(a.id()).cmp(&stable_hash(b.id())), ascending)
        };
        let ordering = match self {
            ChildOrder::Insertion => return None,
            ChildOrder::ChildCount { ascending } => directed(
                a.children().len().cmp(&b.children().len()),
                *ascending,
            )
            .then_with(|| by_hash(*ascending)),
            ChildOrder::IdHash { ascending } => by_hash(*ascending),
            ChildOrder::Id { ascending, cmp } => {
                directed(cmp(a.id(), b.id()), *ascending).then_with(|| by_hash(*ascending))
            }
            ChildOrder::Value { ascending, cmp } => {
                let primary = match (a.value(), b.value()) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(x), Some(y)) => directed(cmp(x, y), *ascending),
                };
                primary.then_with(|| by_hash(*ascending))
            }
            ChildOrder::Custom(cmp) => cmp(a, b).then_with(|| by_hash(true)),
        };
        Some(ordering)
    }
}

impl<I: NodeKey, V: NodeValue> NodeStore<I, V> {
    pub fn child_order(&self) -> &ChildOrder<I, V> {
        &self.order
    }

    pub fn set_child_order(&mut self, order: ChildOrder<I, V>) {
        self.order = order;
    }

    /// Children of `node` under the store's [`ChildOrder`]. Empty for a stale handle.
    pub fn ordered_children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let Some(n) = self.get(node) else {
            return Vec::new();
        };
        let mut children: Vec<(NodeHandle, &Node<I, V>)> = n
            .children()
            .iter()
            .filter_map(|h| self.get(*h).map(|child| (*h, child)))
            .collect();
        if !matches!(self.order, ChildOrder::Insertion) {
            children.sort_by(|(_, a), (_, b)| {
                self.order.compare(a, b).unwrap_or(Ordering::Equal)
            });
        }
        children.into_iter().map(|(h, _)| h).collect()
    }
}
