use std::hash::Hash;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::stable_hash;
use crate::ids::{NodeHandle, NodeKey, NodeValue};
use crate::store::NodeStore;
use crate::traverse::Traversal;

/// Compact summary of an encoded forest, checked after decode.
///
/// `hash_sum` XORs per-node hashes. That makes it independent of tree and
/// sibling order, and also blind to any change that cancels out under XOR:
/// losing two nodes with equal hashes, or one node appearing twice, leaves it
/// unchanged. Treat a match as "probably equal", never as proof.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDigest {
    pub trees_count: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duplicate_nodes_count: usize,
    pub total_items_count: usize,
    pub max_depth: usize,
    pub hash_sum: u64,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Per-subtree contribution to a [`TreeDigest`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubtreeSummary {
    pub node_count: usize,
    /// Deepest level below the subtree root, which is depth 0.
    pub max_depth: usize,
    pub hash_xor: u64,
}

impl TreeDigest {
    pub fn from_summaries<'a>(
        summaries: impl IntoIterator<Item = &'a SubtreeSummary>,
        duplicate_nodes_count: usize,
    ) -> Self {
        summaries.into_iter().fold(
            TreeDigest {
                duplicate_nodes_count,
                ..Default::default()
            },
            |mut digest, summary| {
                digest.trees_count += 1;
                digest.total_items_count += summary.node_count;
                digest.max_depth = digest.max_depth.max(summary.max_depth);
                digest.hash_sum ^= summary.hash_xor;
                digest
            },
        )
    }
}

/// Digest hash of one node. `parent` is `None` for the root of the summarized
/// subtree even when the live node has a parent, so a subtree hashes the same
/// before encoding and after it decodes as a standalone root.
pub fn node_hash<I: Hash, V: Hash>(id: &I, value: Option<&V>, parent: Option<&I>) -> u64 {
    stable_hash(&(id, value, parent))
}

impl<I: NodeKey, V: NodeValue + Hash> NodeStore<I, V> {
    /// Hash of `node` relative to the subtree rooted at `subtree_root`.
    pub fn relative_node_hash(&self, subtree_root: NodeHandle, node: NodeHandle) -> Result<u64> {
        let n = self.try_get(node)?;
        let parent = if node == subtree_root {
            None
        } else {
            n.parent.and_then(|p| self.get(p)).map(|p| &p.id)
        };
        Ok(node_hash(&n.id, n.value.as_ref(), parent))
    }

    pub fn summarize(&self, subtree_root: NodeHandle) -> Result<SubtreeSummary> {
        let base = self.try_get(subtree_root).map(|_| self.depth(subtree_root).unwrap_or(0))?;
        let mut summary = SubtreeSummary::default();
        let mut failure = None;
        let _ = self.walk(subtree_root, Traversal::DepthFirst, true, |handle, _| {
            match self.relative_node_hash(subtree_root, handle) {
                Ok(hash) => summary.hash_xor ^= hash,
                Err(err) => {
                    failure = Some(err);
                    return ControlFlow::Break(());
                }
            }
            summary.node_count += 1;
            let depth = self.depth(handle).unwrap_or(base) - base;
            summary.max_depth = summary.max_depth.max(depth);
            ControlFlow::Continue(())
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}
