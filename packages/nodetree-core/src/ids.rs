use std::any::type_name;
use std::fmt;
use std::hash::Hash;

/// Generation-checked reference to a node slot inside a [`crate::NodeStore`].
///
/// A handle stays valid until its node is removed. After that the slot may be
/// reused, but the bumped generation makes every old handle resolve to nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Identity type of a node. Unique within one store.
pub trait NodeKey: Clone + Eq + Hash + fmt::Debug + Send + 'static {}

impl<T> NodeKey for T where T: Clone + Eq + Hash + fmt::Debug + Send + 'static {}

/// Payload type carried by a node.
pub trait NodeValue: Clone + fmt::Debug + Send + 'static {}

impl<T> NodeValue for T where T: Clone + fmt::Debug + Send + 'static {}

/// String identifying the concrete `(id, value)` pair of a store. Written as
/// `treeNodeTypeKey` on every encoded tree root.
///
/// Built from path-free type names, e.g. `TreeNode<String,u64>`, so keys do
/// not depend on crate layout or on how a compiler version spells module
/// paths. Two same-named types from different modules share a key.
pub fn type_key<I: 'static, V: 'static>() -> String {
    format!("TreeNode<{},{}>", short_type_name::<I>(), short_type_name::<V>())
}

/// `type_name` with module paths removed, e.g. `Vec<u8>` for `alloc::vec::Vec<u8>`.
pub fn short_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else {
            out.push_str(&segment);
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(&segment);
    out
}
