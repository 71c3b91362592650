use std::borrow::Borrow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::ids::{NodeKey, NodeValue};
use crate::store::NodeStore;

/// Depth the submitter believed the node to have.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DepthHint {
    Known(usize),
    /// Treated as depth 0 when deciding whether a parentless item is a root.
    Unknown,
}

impl DepthHint {
    fn is_root_level(self) -> bool {
        matches!(self, DepthHint::Known(0) | DepthHint::Unknown)
    }
}

/// A creation request waiting for its parent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructionItem<I, V> {
    pub id: I,
    pub value: Option<V>,
    pub parent_id: Option<I>,
    pub depth_hint: DepthHint,
    pub submitted_at: DateTime<Utc>,
}

impl<I, V> ReconstructionItem<I, V> {
    pub fn new(id: I, value: Option<V>, parent_id: Option<I>, depth_hint: DepthHint) -> Self {
        Self {
            id,
            value,
            parent_id,
            depth_hint,
            submitted_at: Utc::now(),
        }
    }
}

/// FIFO of pending creation requests plus the ids they wait for.
#[derive(Debug)]
pub struct ReconstructionQueue<I, V> {
    items: VecDeque<ReconstructionItem<I, V>>,
    expected: HashSet<I>,
}

impl<I, V> Default for ReconstructionQueue<I, V> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            expected: HashSet::new(),
        }
    }
}

impl<I: NodeKey, V: NodeValue> ReconstructionQueue<I, V> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReconstructionItem<I, V>> + '_ {
        self.items.iter()
    }

    pub fn expects<Q>(&self, id: &Q) -> bool
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.expected.contains(id)
    }

    pub(crate) fn forget_expected(&mut self, id: &I) {
        self.expected.remove(id);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.expected.clear();
    }
}

/// Counters from one [`NodeStore::attempt`] call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconstructionReport {
    pub materialized: usize,
    /// Items dropped because their id had been created directly meanwhile.
    pub already_present: usize,
    pub expired: usize,
    pub still_pending: usize,
}

impl<I: NodeKey, V: NodeValue> NodeStore<I, V> {
    pub fn pending(&self) -> &ReconstructionQueue<I, V> {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn expects<Q>(&self, id: &Q) -> bool
    where
        I: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.pending.expects(id)
    }

    /// Queues a creation request whose parent is not available yet.
    pub fn enqueue(
        &mut self,
        id: impl Into<I>,
        value: impl Into<Option<V>>,
        parent_id: Option<I>,
        depth_hint: DepthHint,
    ) {
        let item = ReconstructionItem::new(id.into(), value.into(), parent_id, depth_hint);
        self.enqueue_item(item);
    }

    /// Queues a prebuilt item, keeping its `submitted_at`.
    pub fn enqueue_item(&mut self, mut item: ReconstructionItem<I, V>) {
        if item.parent_id.as_ref() == Some(&item.id) {
            debug!(id = ?item.id, "pending item declared itself as parent; treating as root");
            item.parent_id = None;
        }
        if let Some(max) = self.config.max_pending {
            if max == 0 {
                warn!(id = ?item.id, "reconstruction queue disabled; dropping item");
                return;
            }
            while self.pending.items.len() >= max {
                if let Some(dropped) = self.pending.items.pop_front() {
                    warn!(id = ?dropped.id, max, "reconstruction queue full; dropped oldest item");
                }
            }
        }
        if let Some(parent) = &item.parent_id {
            self.pending.expected.insert(parent.clone());
        }
        trace!(id = ?item.id, parent = ?item.parent_id, "queued for reconstruction");
        self.pending.items.push_back(item);
        if self.config.auto_reconstruct && !self.reconstructing {
            self.attempt(true);
        }
    }

    fn expire_pending(&mut self) -> usize {
        let Some(ttl) = self.config.pending_ttl_secs else {
            return 0;
        };
        let ttl = i64::try_from(ttl).unwrap_or(i64::MAX);
        let now = Utc::now();
        let before = self.pending.items.len();
        self.pending.items.retain(|item| {
            let keep = (now - item.submitted_at).num_seconds() <= ttl;
            if !keep {
                warn!(id = ?item.id, parent = ?item.parent_id, "pending item expired");
            }
            keep
        });
        before - self.pending.items.len()
    }

    /// Runs `f` with reconstruction suspended, then retries the queue once.
    pub(crate) fn with_deferred_attempts<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let outer = std::mem::replace(&mut self.reconstructing, true);
        let out = f(self);
        self.reconstructing = outer;
        if !outer && !self.pending.is_empty() {
            self.attempt(false);
        }
        out
    }

    /// Materializes every queued item whose dependency is now satisfied.
    ///
    /// Items wait keyed by parent id; materializing a node releases the items
    /// waiting on it within the same call, so a queued chain resolves in one
    /// pass whatever its queue order. Registrations made while the pass runs do
    /// not re-enter. With `rebuild` (or `auto_reconstruct`) every known root's
    /// index is rebuilt afterwards.
    #[tracing::instrument(level = "debug", skip(self), fields(type_key = %self.type_key))]
    pub fn attempt(&mut self, rebuild: bool) -> ReconstructionReport {
        let mut report = ReconstructionReport::default();
        if self.reconstructing {
            report.still_pending = self.pending.len();
            return report;
        }
        self.reconstructing = true;
        report.expired = self.expire_pending();

        let mut slots: Vec<Option<ReconstructionItem<I, V>>> =
            self.pending.items.drain(..).map(Some).collect();
        let mut waiting: HashMap<I, Vec<usize>> = HashMap::new();
        let mut ready: VecDeque<usize> = VecDeque::new();
        for (slot, item) in slots.iter().enumerate() {
            let Some(item) = item else { continue };
            match &item.parent_id {
                Some(parent) if self.locate(parent).is_none() => {
                    waiting.entry(parent.clone()).or_default().push(slot);
                }
                Some(_) => ready.push_back(slot),
                None if item.depth_hint.is_root_level() => ready.push_back(slot),
                None => {}
            }
        }

        while let Some(slot) = ready.pop_front() {
            let Some(item) = slots[slot].take() else {
                continue;
            };
            if self.locate(&item.id).is_some() {
                debug!(id = ?item.id, "pending node already exists; direct creation raced reconstruction");
                report.already_present += 1;
                continue;
            }
            let id = item.id.clone();
            let placed = match item.parent_id.as_ref().map(|p| self.locate(p)) {
                None => {
                    self.insert_root(item.id, item.value);
                    true
                }
                Some(Some(parent)) => {
                    match self.insert_child(parent, item.id.clone(), item.value.clone()) {
                        Ok(_) => true,
                        Err(err) => {
                            warn!(id = ?item.id, error = %err, "could not materialize pending node");
                            slots[slot] = Some(item);
                            false
                        }
                    }
                }
                Some(None) => {
                    slots[slot] = Some(item);
                    false
                }
            };
            if placed {
                report.materialized += 1;
                if let Some(released) = waiting.remove(&id) {
                    ready.extend(released);
                }
            }
        }
        self.pending.items = slots.into_iter().flatten().collect();

        self.refresh_roots();
        self.reconstructing = false;
        if rebuild || self.config.auto_reconstruct {
            self.rebuild_all();
        }
        report.still_pending = self.pending.len();
        if report.materialized > 0 || report.expired > 0 {
            debug!(
                materialized = report.materialized,
                already_present = report.already_present,
                expired = report.expired,
                still_pending = report.still_pending,
                "reconstruction pass complete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::store::Insertion;

    type Store = NodeStore<String, String>;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn queued_child_materializes_when_parent_registers() {
        let mut store = Store::default();
        let root = store.create("1", s("root"), None).unwrap().handle().unwrap();
        assert_eq!(store.roots(), vec![root]);

        let deferred = store.create("3b", s("child3b"), Some(s("2b"))).unwrap();
        assert_eq!(deferred, Insertion::Deferred);
        assert_eq!(store.len(), 1);

        let b = store
            .insert_child(root, "2b", s("child2b"))
            .unwrap()
            .handle()
            .unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.pending_len(), 0);
        let c = store.lookup("3b").unwrap();
        assert_eq!(store.get(c).unwrap().parent(), Some(b));
        assert_eq!(store.id_path(c), vec![s("1"), s("2b"), s("3b")]);
    }

    #[test]
    fn chain_of_missing_ancestors_resolves_in_one_attempt() {
        let mut store = Store::default();
        store.enqueue("d", None, Some(s("c")), DepthHint::Known(3));
        store.enqueue("c", None, Some(s("b")), DepthHint::Known(2));
        store.enqueue("b", None, Some(s("a")), DepthHint::Known(1));
        store.enqueue("a", None, None, DepthHint::Known(0));
        assert_eq!(store.len(), 0);

        let report = store.attempt(true);
        assert_eq!(report.materialized, 4);
        assert_eq!(report.still_pending, 0);
        let d = store.lookup("d").unwrap();
        assert_eq!(store.depth(d), Some(3));
        assert_eq!(store.roots().len(), 1);
        store.validate_invariants().unwrap();
    }

    #[test]
    fn parentless_item_with_nonzero_depth_waits() {
        let mut store = Store::default();
        store.enqueue("x", None, None, DepthHint::Known(2));
        let report = store.attempt(false);
        assert_eq!(report.materialized, 0);
        assert_eq!(report.still_pending, 1);
    }

    #[test]
    fn direct_creation_satisfies_pending_item() {
        let mut store = Store::default();
        store.enqueue("a", s("queued"), Some(s("p")), DepthHint::Unknown);
        store.insert_root("a", s("direct"));
        assert_eq!(store.pending_len(), 0);
        let a = store.lookup_node("a").unwrap();
        assert_eq!(a.value().map(String::as_str), Some("direct"));
    }

    #[test]
    fn self_parent_is_sanitized_on_enqueue() {
        let mut store = Store::default();
        store.enqueue("a", None, Some(s("a")), DepthHint::Unknown);
        assert!(!store.expects("a"));
        let report = store.attempt(false);
        assert_eq!(report.materialized, 1);
        assert!(store.lookup_node("a").unwrap().is_root());
    }

    #[test]
    fn orphans_stay_queued_by_default() {
        let mut store = Store::default();
        store.enqueue("orphan", None, Some(s("never")), DepthHint::Unknown);
        for _ in 0..3 {
            assert_eq!(store.attempt(false).still_pending, 1);
        }
        assert!(store.expects("never"));
    }

    #[test]
    fn bounded_queue_drops_oldest() {
        let config = StoreConfig {
            max_pending: Some(2),
            ..Default::default()
        };
        let mut store = Store::new(config);
        store.enqueue("a", None, Some(s("x")), DepthHint::Unknown);
        store.enqueue("b", None, Some(s("x")), DepthHint::Unknown);
        store.enqueue("c", None, Some(s("x")), DepthHint::Unknown);
        let ids: Vec<_> = store.pending().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![s("b"), s("c")]);
    }

    #[test]
    fn stale_items_expire() {
        let config = StoreConfig {
            pending_ttl_secs: Some(60),
            ..Default::default()
        };
        let mut store = Store::new(config);
        let mut old = ReconstructionItem::new(s("old"), None, Some(s("x")), DepthHint::Unknown);
        old.submitted_at = Utc::now() - chrono::Duration::seconds(120);
        store.enqueue_item(old);
        store.enqueue("new", None, Some(s("x")), DepthHint::Unknown);

        let report = store.attempt(false);
        assert_eq!(report.expired, 1);
        assert_eq!(report.still_pending, 1);
        assert_eq!(store.pending().iter().next().unwrap().id, "new");
    }

    #[test]
    fn huge_ttl_never_expires() {
        let config = StoreConfig {
            pending_ttl_secs: Some(u64::MAX),
            ..Default::default()
        };
        let mut store = Store::new(config);
        store.enqueue("fresh", None, Some(s("x")), DepthHint::Unknown);

        let report = store.attempt(false);
        assert_eq!(report.expired, 0);
        assert_eq!(report.still_pending, 1);
    }

    #[test]
    fn waiting_items_keep_queue_order() {
        let mut store = Store::default();
        store.enqueue("a", None, Some(s("x")), DepthHint::Unknown);
        store.enqueue("r", None, None, DepthHint::Unknown);
        store.enqueue("b", None, Some(s("y")), DepthHint::Unknown);
        store.enqueue("c", None, Some(s("x")), DepthHint::Unknown);

        let report = store.attempt(false);
        assert_eq!(report.materialized, 1);
        let ids: Vec<_> = store.pending().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![s("a"), s("b"), s("c")]);
    }

    #[test]
    fn long_reversed_chain_resolves_in_one_attempt() {
        let mut store = Store::default();
        for i in (1..500).rev() {
            store.enqueue(format!("n{i}"), None, Some(format!("n{}", i - 1)), DepthHint::Unknown);
        }
        store.enqueue("n0", None, None, DepthHint::Known(0));

        let report = store.attempt(false);
        assert_eq!(report.materialized, 500);
        assert_eq!(report.still_pending, 0);
        let tail = store.lookup("n499").unwrap();
        assert_eq!(store.depth(tail), Some(499));
    }

    #[test]
    fn auto_reconstruct_materializes_on_enqueue() {
        let config = StoreConfig {
            auto_reconstruct: true,
            ..Default::default()
        };
        let mut store = Store::new(config);
        store.enqueue("r", s("root"), None, DepthHint::Unknown);
        assert!(store.contains("r"));
        assert_eq!(store.pending_len(), 0);
    }
}
