//! Shared fixtures for NodeTree store and codec suites.

use std::collections::{BTreeMap, HashSet};
use std::sync::Once;

use nodetree_core::{NodeHandle, NodeKey, NodeStore, NodeValue};

/// One out-of-order creation call: `(id, value, parent id)`.
pub type CreateCall = (String, String, Option<String>);

/// Creation calls for the reference tree, parents first:
///
/// ```text
/// 1 ─┬─ 2a ─┬─ 2a1
///    │      └─ 2a2 ── 2a2a ─┬─ 2a2aX
///    │                      └─ 2a2aY
///    ├─ 2b
///    ├─ 2c ── 2c1
///    └─ 2d
/// ```
pub fn sample_calls() -> Vec<CreateCall> {
    [
        ("1", "root", None),
        ("2a", "childA", Some("1")),
        ("2b", "childB", Some("1")),
        ("2c", "childC", Some("1")),
        ("2d", "child4", Some("1")),
        ("2a1", "gchild2a1", Some("2a")),
        ("2a2", "gchild2a2", Some("2a")),
        ("2c1", "gchild2c1", Some("2c")),
        ("2a2a", "ggchild2a2a", Some("2a2")),
        ("2a2aX", "ggchild2a2aX", Some("2a2a")),
        ("2a2aY", "ggchild2a2aY", Some("2a2a")),
    ]
    .into_iter()
    .map(|(id, value, parent)| (id.to_string(), value.to_string(), parent.map(str::to_string)))
    .collect()
}

pub const SAMPLE_SIZE: usize = 11;
pub const SAMPLE_MAX_DEPTH: usize = 4;

/// Replays `calls` through `create`, then settles the reconstruction queue.
pub fn replay(store: &mut NodeStore<String, String>, calls: &[CreateCall]) {
    for (id, value, parent) in calls {
        store
            .create(id.clone(), value.clone(), parent.clone())
            .expect("create");
    }
    store.attempt(true);
}

/// Builds the reference tree and returns its root.
pub fn sample_store() -> (NodeStore<String, String>, NodeHandle) {
    let mut store = NodeStore::default();
    replay(&mut store, &sample_calls());
    let root = store.lookup("1").expect("sample root");
    (store, root)
}

/// Every permutation of `items`, via Heap's algorithm.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap_permute<T: Clone>(k: usize, items: &mut [T], res: &mut Vec<Vec<T>>) {
        if k <= 1 {
            res.push(items.to_vec());
            return;
        }
        heap_permute(k - 1, items, res);
        for i in 0..(k - 1) {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            heap_permute(k - 1, items, res);
        }
    }
    let mut res = Vec::new();
    heap_permute(items.len(), &mut items.to_vec(), &mut res);
    res
}

/// `id → parent id` for every indexed node; comparable across stores.
pub fn shape<I, V>(store: &NodeStore<I, V>) -> BTreeMap<I, Option<I>>
where
    I: NodeKey + Ord,
    V: NodeValue,
{
    store
        .ids()
        .filter_map(|id| {
            let node = store.lookup_node(id)?;
            let parent = node.parent().and_then(|p| store.get(p)).map(|p| p.id().clone());
            Some((id.clone(), parent))
        })
        .collect()
}

/// Structural invariants, plus every indexed node hanging under a listed root.
pub fn assert_store_consistent<I: NodeKey, V: NodeValue>(store: &mut NodeStore<I, V>) {
    store.validate_invariants().expect("store invariants");
    let roots: HashSet<NodeHandle> = store.roots().into_iter().collect();
    for id in store.ids() {
        let handle = store.lookup(id).expect("indexed id");
        let root = store.root_of(handle).expect("live node");
        assert!(roots.contains(&root), "{id:?} hangs under an unlisted root");
    }
}

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber once per process; honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
