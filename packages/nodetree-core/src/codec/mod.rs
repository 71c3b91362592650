//! Wire format for trees and forests.
//!
//! A forest document is `{ "collection": [tree, ...], "duplicateRootIds"?: [id, ...],
//! "info"?: digest }`. Each tree entry is its encoded root node carrying
//! `treeNodeTypeKey`, which selects the [`crate::TreeFactory`] that decodes it.

pub mod collection;
pub mod tree;
pub mod wire;

pub use collection::{CollectionCodec, DecodedForest};
pub use tree::{decode_tree, encode_tree, MAX_NESTED_DEPTH};
pub use wire::{NodeInfo, RootInfo, WireCollection, WireNode};
