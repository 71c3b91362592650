#![forbid(unsafe_code)]
//! Identity-addressed tree-node store with out-of-order reconstruction.
//! Nodes can be created in any arrival order, children before their parents,
//! and still converge to one consistent tree per root. Forests of such trees
//! round-trip through a self-describing wire format (flat or nested) that
//! dispatches on a registered type key.

pub mod actor;
pub mod arena;
pub mod codec;
pub mod config;
pub mod digest;
pub mod error;
pub mod hash;
pub mod ids;
pub mod index;
pub mod ordering;
pub mod reconstruction;
pub mod registry;
pub mod store;
pub mod stores;
pub mod traverse;

pub use actor::StoreHandle;
pub use codec::{CollectionCodec, DecodedForest};
pub use config::{EncodeOptions, StoreConfig, TreeEncoding};
pub use digest::{SubtreeSummary, TreeDigest};
pub use error::{Error, Result};
pub use ids::{type_key, NodeHandle, NodeKey, NodeValue};
pub use ordering::ChildOrder;
pub use reconstruction::{DepthHint, ReconstructionItem, ReconstructionQueue, ReconstructionReport};
pub use registry::{TreeFactory, TypeRegistry, TypedFactory, WireKey, WireValue};
pub use store::{Insertion, Node, NodeRole, NodeStore};
pub use stores::{ForestEntry, TreeStores};
pub use traverse::Traversal;
