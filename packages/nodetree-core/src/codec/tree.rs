use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::codec::wire::{NodeInfo, RootInfo, WireNode};
use crate::config::{EncodeOptions, TreeEncoding};
use crate::error::{Error, Result};
use crate::ids::{short_type_name, NodeHandle};
use crate::registry::{WireKey, WireValue};
use crate::store::{NodeRole, NodeStore};

/// Deepest tree encoded with recursive `children`; deeper trees fall back to flat.
pub const MAX_NESTED_DEPTH: usize = 32;

fn wire_node<I: WireKey, V: WireValue>(
    store: &NodeStore<I, V>,
    root: NodeHandle,
    base_depth: usize,
    handle: NodeHandle,
    options: &EncodeOptions,
) -> Result<WireNode<I, V>> {
    let node = store.try_get(handle)?;
    let parent_id = node.parent().and_then(|p| store.get(p)).map(|p| p.id().clone());
    let mut wire = WireNode::new(node.id().clone(), node.value().cloned(), parent_id);
    if options.with_node_info {
        let role = if handle == root {
            NodeRole::Root
        } else {
            node.role()
        };
        wire.node_info = Some(NodeInfo {
            depth: store.depth(handle).unwrap_or(base_depth) - base_depth,
            hash: store.relative_node_hash(root, handle)?,
            role,
        });
    }
    Ok(wire)
}

fn children_ids<I: WireKey, V: WireValue>(store: &NodeStore<I, V>, handle: NodeHandle) -> Vec<I> {
    store
        .ordered_children(handle)
        .into_iter()
        .filter_map(|h| store.get(h).map(|n| n.id().clone()))
        .collect()
}

fn nested<I: WireKey, V: WireValue>(
    store: &NodeStore<I, V>,
    root: NodeHandle,
    base_depth: usize,
    handle: NodeHandle,
    options: &EncodeOptions,
) -> Result<WireNode<I, V>> {
    let mut wire = wire_node(store, root, base_depth, handle, options)?;
    let children = store.ordered_children(handle);
    if !children.is_empty() {
        wire.children = Some(
            children
                .into_iter()
                .map(|child| nested(store, root, base_depth, child, options))
                .collect::<Result<Vec<_>>>()?,
        );
    }
    Ok(wire)
}

/// Encodes the subtree under `root` as one tree entry.
pub fn encode_tree<I: WireKey, V: WireValue>(
    store: &NodeStore<I, V>,
    root: NodeHandle,
    encoding: TreeEncoding,
    options: &EncodeOptions,
) -> Result<Value> {
    let base_depth = store.depth(root).ok_or(Error::StaleHandle(root))?;
    let mut encoding = encoding;
    if encoding == TreeEncoding::Nested {
        let deepest = store.descendants_by_depth(root).len();
        if deepest > MAX_NESTED_DEPTH {
            warn!(
                root = %root,
                depth = deepest,
                max = MAX_NESTED_DEPTH,
                "tree too deep for nested encoding; encoding flat"
            );
            encoding = TreeEncoding::Flat;
        }
    }

    let mut top = match encoding {
        TreeEncoding::Nested => nested(store, root, base_depth, root, options)?,
        TreeEncoding::Flat => {
            let mut top = wire_node(store, root, base_depth, root, options)?;
            top.children_ids = Some(children_ids(store, root));
            let descendants = store
                .descendants(root)
                .into_iter()
                .map(|h| {
                    let mut node = wire_node(store, root, base_depth, h, options)?;
                    node.children_ids = Some(children_ids(store, h));
                    Ok(node)
                })
                .collect::<Result<Vec<_>>>()?;
            top.descendants = Some(descendants);
            top
        }
    };
    top.tree_node_type_key = Some(store.type_key().to_string());
    if options.with_root_info {
        top.root_info = Some(RootInfo {
            id_type_name: short_type_name::<I>(),
            value_type_name: short_type_name::<V>(),
            total_items_count: store.subtree_size(root),
        });
    }
    Ok(serde_json::to_value(top)?)
}

/// Node to create during decode; `parent` indexes an earlier step.
struct Step<I, V> {
    id: I,
    value: Option<V>,
    parent: Option<usize>,
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::MalformedEncoding(msg.into())
}

fn plan_flat<I: WireKey, V: WireValue>(wire: WireNode<I, V>) -> Result<Vec<Step<I, V>>> {
    let WireNode {
        id,
        value,
        children_ids,
        descendants,
        ..
    } = wire;
    let mut index: HashMap<I, usize> = HashMap::from([(id.clone(), 0)]);
    let mut listed: Vec<Option<Vec<I>>> = vec![children_ids];
    let mut actual: Vec<Vec<I>> = vec![Vec::new()];
    let mut steps = vec![Step {
        id,
        value,
        parent: None,
    }];

    for node in descendants.unwrap_or_default() {
        if node.is_nested() || node.descendants.is_some() {
            return Err(malformed(format!(
                "flat descendant {:?} carries nested children",
                node.id
            )));
        }
        let parent_id = node
            .parent_id
            .ok_or_else(|| malformed(format!("descendant {:?} has no parentId", node.id)))?;
        let parent = *index.get(&parent_id).ok_or_else(|| {
            malformed(format!(
                "descendant {:?} precedes its parent {:?}",
                node.id, parent_id
            ))
        })?;
        let position = steps.len();
        if index.insert(node.id.clone(), position).is_some() {
            return Err(malformed(format!("duplicate id {:?}", node.id)));
        }
        actual[parent].push(node.id.clone());
        actual.push(Vec::new());
        listed.push(node.children_ids);
        steps.push(Step {
            id: node.id,
            value: node.value,
            parent: Some(parent),
        });
    }

    for (position, expected) in listed.into_iter().enumerate() {
        let Some(expected) = expected else {
            continue;
        };
        let found: HashSet<&I> = actual[position].iter().collect();
        let matches = expected.len() == actual[position].len()
            && expected.iter().all(|id| found.contains(id));
        if !matches {
            return Err(malformed(format!(
                "childrenIds of {:?} do not match its descendants",
                steps[position].id
            )));
        }
    }
    Ok(steps)
}

fn plan_nested<I: WireKey, V: WireValue>(wire: WireNode<I, V>) -> Result<Vec<Step<I, V>>> {
    let mut steps: Vec<Step<I, V>> = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<(WireNode<I, V>, Option<usize>)> = vec![(wire, None)];
    while let Some((node, parent)) = stack.pop() {
        if parent.is_some() && node.is_flat() {
            return Err(malformed(format!(
                "node {:?} mixes children with childrenIds",
                node.id
            )));
        }
        if let (Some(parent), Some(declared)) = (parent, &node.parent_id) {
            let parent_id = &steps[parent].id;
            if parent_id != declared {
                return Err(malformed(format!(
                    "node {:?} declares parent {:?} but is nested under {:?}",
                    node.id, declared, parent_id
                )));
            }
        }
        if !seen.insert(node.id.clone()) {
            return Err(malformed(format!("duplicate id {:?}", node.id)));
        }
        let position = steps.len();
        steps.push(Step {
            id: node.id,
            value: node.value,
            parent,
        });
        if let Some(children) = node.children {
            stack.extend(children.into_iter().rev().map(|c| (c, Some(position))));
        }
    }
    Ok(steps)
}

/// Decodes one tree entry into `store`. The entry root always becomes a root of
/// `store`, whatever `parentId` it carries.
pub fn decode_tree<I: WireKey, V: WireValue>(
    store: &mut NodeStore<I, V>,
    raw: &Value,
) -> Result<NodeHandle> {
    let wire = WireNode::<I, V>::deserialize(raw)
        .map_err(|e| malformed(format!("tree entry: {e}")))?;
    if let Some(key) = &wire.tree_node_type_key {
        if key != store.type_key() {
            return Err(malformed(format!(
                "entry type {key} does not match store type {}",
                store.type_key()
            )));
        }
    }
    if wire.is_nested() && wire.is_flat() {
        return Err(malformed(format!(
            "node {:?} mixes children with childrenIds or descendants",
            wire.id
        )));
    }
    let encoding = if wire.is_nested() {
        TreeEncoding::Nested
    } else {
        TreeEncoding::Flat
    };
    let steps = match encoding {
        TreeEncoding::Flat => plan_flat(wire)?,
        TreeEncoding::Nested => plan_nested(wire)?,
    };
    if let Some(step) = steps.iter().find(|s| store.locate(&s.id).is_some()) {
        return Err(Error::InvalidOperation(format!(
            "id {:?} already present in store",
            step.id
        )));
    }

    let count = steps.len();
    let root = store.with_deferred_attempts(|store| {
        let mut handles: Vec<NodeHandle> = Vec::with_capacity(count);
        for step in steps {
            let insertion = match step.parent {
                None => store.insert_root(step.id, step.value),
                Some(parent) => store.insert_child(handles[parent], step.id, step.value)?,
            };
            let handle = insertion.handle().ok_or_else(|| {
                Error::InconsistentState("decoded node was not materialized".into())
            })?;
            handles.push(handle);
        }
        handles
            .first()
            .copied()
            .ok_or_else(|| Error::InconsistentState("decoded tree is empty".into()))
    })?;
    store.rebuild(root);
    store.set_tree_encoding(root, encoding)?;
    debug!(root = %root, nodes = count, encoding = ?encoding, "decoded tree");
    trace!(shape = %store.tree_description(root), "decoded tree shape");
    Ok(root)
}
