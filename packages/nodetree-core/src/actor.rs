//! Single-owner task serializing all access to a [`TreeStores`].
//!
//! Every operation is a message in one bounded mailbox and runs to completion
//! before the next one starts, in arrival order per sender. Callers either
//! await the reply ([`StoreHandle::call`] and the typed helpers) or fire and
//! forget ([`StoreHandle::post`]).

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::codec::{CollectionCodec, DecodedForest};
use crate::error::{Error, Result};
use crate::ids::{NodeHandle, NodeKey, NodeValue};
use crate::reconstruction::ReconstructionReport;
use crate::registry::{WireKey, WireValue};
use crate::store::{Insertion, NodeStore};
use crate::stores::{ForestEntry, TreeStores};

type Job = Box<dyn FnOnce(&mut TreeStores) + Send>;

/// Cloneable sender side of the store actor.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    tx: mpsc::Sender<Job>,
}

impl StoreHandle {
    /// Moves `stores` into a new task. The task ends once every handle is
    /// dropped and hands the stores back through the join handle.
    pub fn spawn(stores: TreeStores) -> (Self, JoinHandle<TreeStores>) {
        let capacity = stores.config().mailbox_capacity.max(1);
        let (tx, mut rx) = mpsc::channel::<Job>(capacity);
        let task = tokio::spawn(async move {
            let mut stores = stores;
            debug!(capacity, "store actor started");
            while let Some(job) = rx.recv().await {
                job(&mut stores);
            }
            debug!("store actor stopped");
            stores
        });
        (Self { tx }, task)
    }

    /// Runs `f` on the actor and waits for its result.
    pub async fn call<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut TreeStores) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::new(move |stores| {
            // The caller may have stopped waiting.
            let _ = reply.send(f(stores));
        });
        self.tx.send(job).await.map_err(|_| Error::ActorClosed)?;
        rx.await.map_err(|_| Error::ActorClosed)
    }

    /// Queues `f` without waiting. Fails instead of blocking on a full mailbox.
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut TreeStores) + Send + 'static,
    {
        self.tx.try_send(Box::new(f)).map_err(|err| match err {
            TrySendError::Full(_) => Error::MailboxFull,
            TrySendError::Closed(_) => Error::ActorClosed,
        })
    }

    /// Runs `f` against the `(I, V)` store.
    pub async fn with_store<I, V, R, F>(&self, f: F) -> Result<R>
    where
        I: NodeKey,
        V: NodeValue,
        F: FnOnce(&mut NodeStore<I, V>) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.call(move |stores| f(stores.store_mut::<I, V>())).await
    }

    pub async fn create<I: NodeKey, V: NodeValue>(
        &self,
        id: I,
        value: Option<V>,
        parent_id: Option<I>,
    ) -> Result<Insertion> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.create(id, value, parent_id))
            .await?
    }

    pub async fn insert_root<I: NodeKey, V: NodeValue>(
        &self,
        id: I,
        value: Option<V>,
    ) -> Result<Insertion> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.insert_root(id, value))
            .await
    }

    pub async fn register<I: NodeKey, V: NodeValue>(&self, node: NodeHandle) -> Result<bool> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.register(node))
            .await?
    }

    pub async fn unregister<I: NodeKey, V: NodeValue>(
        &self,
        id: I,
        node: Option<NodeHandle>,
    ) -> Result<bool> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.unregister(&id, node))
            .await
    }

    pub async fn lookup<I: NodeKey, V: NodeValue>(&self, id: I) -> Result<Option<NodeHandle>> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.lookup(&id))
            .await
    }

    pub async fn contains<I: NodeKey, V: NodeValue>(&self, id: I) -> Result<bool> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.contains(&id))
            .await
    }

    pub async fn roots<I: NodeKey, V: NodeValue>(&self) -> Result<Vec<NodeHandle>> {
        self.with_store(|store: &mut NodeStore<I, V>| store.roots()).await
    }

    pub async fn len<I: NodeKey, V: NodeValue>(&self) -> Result<usize> {
        self.with_store(|store: &mut NodeStore<I, V>| store.len()).await
    }

    pub async fn attempt<I: NodeKey, V: NodeValue>(
        &self,
        rebuild: bool,
    ) -> Result<ReconstructionReport> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.attempt(rebuild))
            .await
    }

    pub async fn rebuild<I: NodeKey, V: NodeValue>(&self, from: NodeHandle) -> Result<usize> {
        self.with_store(move |store: &mut NodeStore<I, V>| store.rebuild(from))
            .await
    }

    pub async fn forest_entry<I: WireKey, V: WireValue>(
        &self,
        node: NodeHandle,
    ) -> Result<ForestEntry> {
        self.call(move |stores| stores.forest_entry::<I, V>(node))
            .await
    }

    pub async fn encode(
        &self,
        codec: CollectionCodec,
        forest: Vec<ForestEntry>,
    ) -> Result<Vec<u8>> {
        self.call(move |stores| codec.encode(stores, &forest)).await?
    }

    pub async fn decode(&self, codec: CollectionCodec, bytes: Vec<u8>) -> Result<DecodedForest> {
        self.call(move |stores| codec.decode(stores, &bytes)).await?
    }
}
