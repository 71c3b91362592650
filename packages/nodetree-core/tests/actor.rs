use nodetree_core::{CollectionCodec, NodeStore, StoreHandle, TreeStores};
use nodetree_test_support::{init_tracing, sample_calls, sample_store, shape, SAMPLE_SIZE};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creators_converge_on_one_tree() {
    init_tracing();
    let (handle, task) = StoreHandle::spawn(TreeStores::default());

    let mut calls = sample_calls();
    calls.reverse();
    let mut workers = Vec::new();
    for chunk in calls.chunks(3) {
        let handle = handle.clone();
        let chunk = chunk.to_vec();
        workers.push(tokio::spawn(async move {
            for (id, value, parent) in chunk {
                handle
                    .create::<String, String>(id, Some(value), parent)
                    .await
                    .unwrap();
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }
    handle.attempt::<String, String>(true).await.unwrap();

    assert_eq!(handle.len::<String, String>().await.unwrap(), SAMPLE_SIZE);
    let root = handle
        .lookup::<String, String>("1".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.roots::<String, String>().await.unwrap(), vec![root]);

    drop(handle);
    let stores = task.await.unwrap();
    let store: &NodeStore<String, String> = stores.store().unwrap();
    let (reference, _) = sample_store();
    assert_eq!(shape(store), shape(&reference));
    store.validate_invariants().unwrap();
}

#[tokio::test]
async fn forest_round_trips_between_actors() {
    let mut source = TreeStores::default();
    source.register_type::<String, String>();
    let (sender, _sender_task) = StoreHandle::spawn(source);
    for (id, value, parent) in sample_calls() {
        sender
            .create::<String, String>(id, Some(value), parent)
            .await
            .unwrap();
    }
    let root = sender
        .lookup::<String, String>("1".to_string())
        .await
        .unwrap()
        .unwrap();
    let entry = sender.forest_entry::<String, String>(root).await.unwrap();
    let codec = CollectionCodec::default();
    let bytes = sender.encode(codec.clone(), vec![entry]).await.unwrap();

    let mut target = TreeStores::default();
    target.register_type::<String, String>();
    let (receiver, _receiver_task) = StoreHandle::spawn(target);
    let decoded = receiver.decode(codec, bytes).await.unwrap();
    assert_eq!(decoded.digest_matches, Some(true));
    assert_eq!(receiver.len::<String, String>().await.unwrap(), SAMPLE_SIZE);
    assert!(receiver
        .contains::<String, String>("2a2aY".to_string())
        .await
        .unwrap());
}
