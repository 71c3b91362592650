use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::TreeDigest;
use crate::store::NodeRole;

/// One encoded node. Which optional fields appear depends on the tree's
/// encoding and the node's position: `treeNodeTypeKey`, `rootInfo` and
/// `descendants` only on a tree root, `childrenIds` only in flat trees,
/// `children` only in nested trees.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode<I, V> {
    pub id: I,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<V>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<I>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_ids: Option<Vec<I>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<WireNode<I, V>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descendants: Option<Vec<WireNode<I, V>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_node_type_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_info: Option<NodeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_info: Option<RootInfo>,
}

impl<I, V> WireNode<I, V> {
    pub(crate) fn new(id: I, value: Option<V>, parent_id: Option<I>) -> Self {
        Self {
            id,
            value,
            parent_id,
            children_ids: None,
            children: None,
            descendants: None,
            tree_node_type_key: None,
            node_info: None,
            root_info: None,
        }
    }

    pub(crate) fn is_nested(&self) -> bool {
        self.children.is_some()
    }

    pub(crate) fn is_flat(&self) -> bool {
        self.children_ids.is_some() || self.descendants.is_some()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Relative to the encoded tree root.
    pub depth: usize,
    pub hash: u64,
    pub role: NodeRole,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    pub id_type_name: String,
    pub value_type_name: String,
    /// Nodes in the encoded tree, root included.
    pub total_items_count: usize,
}

/// Top-level forest document. Tree entries stay untyped until their
/// `treeNodeTypeKey` has been resolved.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCollection {
    pub collection: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_root_ids: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<TreeDigest>,
}

pub const TREE_NODE_TYPE_KEY: &str = "treeNodeTypeKey";
