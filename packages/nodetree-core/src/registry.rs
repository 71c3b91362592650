use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::codec::tree::{decode_tree, encode_tree};
use crate::config::{EncodeOptions, TreeEncoding};
use crate::digest::SubtreeSummary;
use crate::error::{Error, Result};
use crate::ids::{type_key, NodeHandle, NodeKey, NodeValue};
use crate::stores::TreeStores;

/// Id types that can cross the wire.
pub trait WireKey: NodeKey + Serialize + DeserializeOwned {}

impl<T> WireKey for T where T: NodeKey + Serialize + DeserializeOwned {}

/// Value types that can cross the wire and feed the digest.
pub trait WireValue: NodeValue + Hash + Serialize + DeserializeOwned {}

impl<T> WireValue for T where T: NodeValue + Hash + Serialize + DeserializeOwned {}

/// Type-erased access to one concrete node store.
///
/// The codec only sees forests as `(type key, handle)` pairs; everything that
/// needs the concrete `(id, value)` types goes through the factory registered
/// under that key. Implement it to plug a store with custom wire handling into
/// [`TypeRegistry`].
pub trait TreeFactory: Send + Sync {
    fn type_key(&self) -> &str;

    fn encode_tree(
        &self,
        stores: &TreeStores,
        root: NodeHandle,
        encoding: TreeEncoding,
        options: &EncodeOptions,
    ) -> Result<Value>;

    /// Decodes one tree entry into the matching store; returns its root.
    fn decode_tree(&self, stores: &mut TreeStores, raw: &Value) -> Result<NodeHandle>;

    fn summarize(&self, stores: &TreeStores, root: NodeHandle) -> Result<SubtreeSummary>;

    fn tree_encoding(&self, stores: &TreeStores, node: NodeHandle) -> TreeEncoding;

    fn is_descendant(&self, stores: &TreeStores, node: NodeHandle, ancestor: NodeHandle) -> bool;

    fn encoded_id(&self, stores: &TreeStores, node: NodeHandle) -> Result<Value>;

    /// Breadth-first search below `root` (inclusive) for an encoded id.
    fn find_by_encoded_id(
        &self,
        stores: &TreeStores,
        root: NodeHandle,
        id: &Value,
    ) -> Result<Option<NodeHandle>>;
}

/// Factory for the built-in [`crate::NodeStore`] of `(I, V)`.
pub struct TypedFactory<I, V> {
    key: String,
    _marker: PhantomData<fn() -> (I, V)>,
}

impl<I: WireKey, V: WireValue> Default for TypedFactory<I, V> {
    fn default() -> Self {
        Self {
            key: type_key::<I, V>(),
            _marker: PhantomData,
        }
    }
}

impl<I: WireKey, V: WireValue> TreeFactory for TypedFactory<I, V> {
    fn type_key(&self) -> &str {
        &self.key
    }

    fn encode_tree(
        &self,
        stores: &TreeStores,
        root: NodeHandle,
        encoding: TreeEncoding,
        options: &EncodeOptions,
    ) -> Result<Value> {
        let store = stores
            .store::<I, V>()
            .ok_or(Error::StaleHandle(root))?;
        encode_tree(store, root, encoding, options)
    }

    fn decode_tree(&self, stores: &mut TreeStores, raw: &Value) -> Result<NodeHandle> {
        decode_tree(stores.store_mut::<I, V>(), raw)
    }

    fn summarize(&self, stores: &TreeStores, root: NodeHandle) -> Result<SubtreeSummary> {
        stores
            .store::<I, V>()
            .ok_or(Error::StaleHandle(root))?
            .summarize(root)
    }

    fn tree_encoding(&self, stores: &TreeStores, node: NodeHandle) -> TreeEncoding {
        stores
            .store::<I, V>()
            .map(|s| s.tree_encoding(node))
            .unwrap_or(stores.config().default_encoding)
    }

    fn is_descendant(&self, stores: &TreeStores, node: NodeHandle, ancestor: NodeHandle) -> bool {
        stores
            .store::<I, V>()
            .is_some_and(|s| s.is_descendant_of(node, ancestor))
    }

    fn encoded_id(&self, stores: &TreeStores, node: NodeHandle) -> Result<Value> {
        let store = stores
            .store::<I, V>()
            .ok_or(Error::StaleHandle(node))?;
        Ok(serde_json::to_value(store.try_get(node)?.id())?)
    }

    fn find_by_encoded_id(
        &self,
        stores: &TreeStores,
        root: NodeHandle,
        id: &Value,
    ) -> Result<Option<NodeHandle>> {
        // An id of another type simply is not in this tree.
        let Ok(id) = I::deserialize(id) else {
            return Ok(None);
        };
        Ok(stores
            .store::<I, V>()
            .and_then(|s| s.find_descendant(root, &id)))
    }
}

/// Type key → factory table. First registration of a key wins.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    factories: HashMap<String, Arc<dyn TreeFactory>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the key was already registered; the table is unchanged.
    pub fn register(&mut self, factory: Arc<dyn TreeFactory>) -> bool {
        let key = factory.type_key().to_string();
        if self.factories.contains_key(&key) {
            debug!(type_key = %key, "type already registered");
            return false;
        }
        debug!(type_key = %key, "registered node type");
        self.factories.insert(key, factory);
        true
    }

    pub fn register_type<I: WireKey, V: WireValue>(&mut self) -> bool {
        self.register(Arc::new(TypedFactory::<I, V>::default()))
    }

    pub fn resolve(&self, type_key: &str) -> Option<Arc<dyn TreeFactory>> {
        self.factories.get(type_key).cloned()
    }

    pub fn contains(&self, type_key: &str) -> bool {
        self.factories.contains_key(type_key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}
