//! Integration tests for the cache facade surface.

mod common;

use cachegrid_core::{CacheError, COLLECTION_ITEM_KEY};
use cachegrid_node::{CollectionKind, GridCluster};

use common::{join, unique_name, wait_for_propagation, RecordingListener};

#[tokio::test]
async fn test_collection_events_use_placeholder_key() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache = join(&cluster, "node-a").await;

    let set = cache
        .get_distributed_collection(CollectionKind::Set, "tags")
        .unwrap();
    let (listener, calls) = RecordingListener::new("tagged");
    cache.add_listener_for(&set, listener).await.unwrap();

    let handle = set.as_set().unwrap();
    handle.add("rust".into());
    handle.remove(&"rust".into());

    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![
            format!("put:{}=\"rust\"", COLLECTION_ITEM_KEY),
            format!("remove:{}", COLLECTION_ITEM_KEY),
        ]
    );
}

#[tokio::test]
async fn test_queue_listener_sees_offer_and_poll() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache = join(&cluster, "node-a").await;

    let queue = cache
        .get_distributed_collection(CollectionKind::Queue, "jobs")
        .unwrap();
    let (listener, calls) = RecordingListener::new("jobs-watch");
    cache.add_listener_for(&queue, listener).await.unwrap();

    let handle = queue.as_queue().unwrap();
    handle.offer("job-1".into());
    assert_eq!(handle.poll(), Some("job-1".into()));

    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![
            format!("put:{}=\"job-1\"", COLLECTION_ITEM_KEY),
            format!("remove:{}", COLLECTION_ITEM_KEY),
        ]
    );
}

#[tokio::test]
async fn test_list_listener_flow() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache = join(&cluster, "node-a").await;

    let list = cache
        .get_distributed_collection(CollectionKind::List, "log")
        .unwrap();
    let (listener, calls) = RecordingListener::new("log-watch");
    cache.add_listener_for(&list, listener).await.unwrap();

    list.as_list().unwrap().add("line".into());
    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![format!("put:{}=\"line\"", COLLECTION_ITEM_KEY)]
    );
    assert_eq!(cache.listener_ids_for(&list), vec!["log-watch".to_string()]);
}

#[tokio::test]
async fn test_instance_listener_sees_created_and_destroyed() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache_a = join(&cluster, "node-a").await;
    let cache_b = join(&cluster, "node-b").await;

    let (listener, calls) = RecordingListener::new("watcher");
    assert!(cache_a.add_instance_listener(listener).await.unwrap());

    // Creation on another member is observed here.
    let fresh = cache_b.get_distributed_map("fresh").unwrap();
    assert_eq!(
        calls.lock().unwrap().clone(),
        vec!["put:MAP:fresh=\"fresh\"".to_string()]
    );

    fresh.as_map().unwrap().destroy();
    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![
            "put:MAP:fresh=\"fresh\"".to_string(),
            "remove:MAP:fresh".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_instance_listener_is_local_only() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache = join(&cluster, "node-a").await;

    let (listener, _) = RecordingListener::new("watcher");
    assert!(cache.add_instance_listener(listener).await.unwrap());

    // Never replicated: the registry's cluster-wide view stays empty.
    assert!(cache.all_listener_ids().is_empty());

    // Duplicate ids are rejected here too.
    let (duplicate, _) = RecordingListener::new("watcher");
    assert!(!cache.add_instance_listener(duplicate).await.unwrap());

    // Removal is immediate and local, no grace interval involved.
    cache.remove_instance_listener("watcher").await.unwrap();
    assert!(matches!(
        cache.remove_instance_listener("watcher").await,
        Err(CacheError::Listener(_))
    ));
}

#[tokio::test]
async fn test_listener_ids_in_attach_order() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache = join(&cluster, "node-a").await;

    let (first, _) = RecordingListener::new("L1");
    let (second, _) = RecordingListener::new("L2");
    cache.add_listener(first).await.unwrap();
    cache.add_listener(second).await.unwrap();

    assert_eq!(
        cache.listener_ids(),
        vec!["L1".to_string(), "L2".to_string()]
    );
}

#[tokio::test]
async fn test_broadcast_shutdown_stops_every_member() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache_a = join(&cluster, "node-a").await;
    let cache_b = join(&cluster, "node-b").await;

    assert_eq!(cluster.members().len(), 2);

    cache_a.broadcast_shutdown().await.unwrap();
    wait_for_propagation().await;

    assert!(!cache_a.is_active());
    assert!(!cache_b.is_active());
    assert!(cluster.members().is_empty());

    assert!(matches!(cache_b.get("k"), Err(CacheError::Instance(_))));
}

#[tokio::test]
async fn test_local_shutdown_leaves_other_members_running() {
    let cluster = GridCluster::new(unique_name("cluster"));
    let cache_a = join(&cluster, "node-a").await;
    let cache_b = join(&cluster, "node-b").await;

    cache_a.shutdown();

    assert!(!cache_a.is_active());
    assert!(cache_b.is_active());
    cache_b.put("k", "v".into()).unwrap();
    assert_eq!(cluster.members().len(), 1);
}
