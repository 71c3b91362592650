use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::config::StoreConfig;
use crate::ids::{NodeHandle, NodeKey, NodeValue};
use crate::registry::{TypeRegistry, WireKey, WireValue};
use crate::store::NodeStore;

/// A node as submitted to the forest codec.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ForestEntry {
    pub type_key: String,
    pub handle: NodeHandle,
}

/// Owner of every per-type [`NodeStore`] plus the shared [`TypeRegistry`].
///
/// Pass it (or a [`crate::StoreHandle`] wrapping it) to whatever needs
/// stores; independent instances never share state.
pub struct TreeStores {
    config: StoreConfig,
    registry: TypeRegistry,
    stores: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Default for TreeStores {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl TreeStores {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_registry(config, TypeRegistry::new())
    }

    /// Starts from an existing registry, e.g. one shared by several collections.
    pub fn with_registry(config: StoreConfig, registry: TypeRegistry) -> Self {
        Self {
            config,
            registry,
            stores: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn store<I: NodeKey, V: NodeValue>(&self) -> Option<&NodeStore<I, V>> {
        self.stores
            .get(&TypeId::of::<NodeStore<I, V>>())
            .and_then(|s| s.downcast_ref())
    }

    /// The store for `(I, V)`, created with this collection's config on first use.
    pub fn store_mut<I: NodeKey, V: NodeValue>(&mut self) -> &mut NodeStore<I, V> {
        let config = &self.config;
        self.stores
            .entry(TypeId::of::<NodeStore<I, V>>())
            .or_insert_with(|| Box::new(NodeStore::<I, V>::new(config.clone())))
            .downcast_mut()
            .expect("stores are keyed by their own TypeId")
    }

    pub fn register_type<I: WireKey, V: WireValue>(&mut self) -> bool {
        self.registry.register_type::<I, V>()
    }

    /// Wraps `handle` for the codec, registering `(I, V)` on first use.
    pub fn forest_entry<I: WireKey, V: WireValue>(&mut self, handle: NodeHandle) -> ForestEntry {
        self.register_type::<I, V>();
        ForestEntry {
            type_key: crate::ids::type_key::<I, V>(),
            handle,
        }
    }

    /// Number of per-type stores created so far.
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Drops every store; the registry is kept.
    pub fn clear(&mut self) {
        self.stores.clear();
    }
}
