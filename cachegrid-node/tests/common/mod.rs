//! Common test utilities for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cachegrid_core::GridValue;
use cachegrid_node::{CacheConfig, CacheListener, ClusterCache, GridCluster};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Grace interval used by every test facade; short to keep the suite fast.
pub const TEST_GRACE: Duration = Duration::from_millis(50);

pub fn unique_name(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}", prefix, std::process::id(), id)
}

pub fn test_config(instance_name: &str) -> CacheConfig {
    CacheConfig::builder()
        .instance_name(instance_name)
        .propagation_grace(TEST_GRACE)
        .build()
        .expect("failed to build config")
}

pub async fn join(cluster: &GridCluster, instance_name: &str) -> ClusterCache {
    ClusterCache::join(cluster, test_config(instance_name))
        .await
        .expect("failed to join cluster")
}

/// Sleeps long enough for admin messages to have been processed everywhere.
pub async fn wait_for_propagation() {
    tokio::time::sleep(TEST_GRACE * 2).await;
}

/// Records every callback as a `kind:key[=value]` string, in arrival order.
pub struct RecordingListener {
    id: String,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    pub fn new(id: &str) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let listener = Arc::new(Self {
            id: id.to_string(),
            calls: Arc::clone(&calls),
        });
        (listener, calls)
    }
}

impl CacheListener for RecordingListener {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_put(&self, key: &str, value: &GridValue) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("put:{}={}", key, value));
    }

    fn on_update(&self, key: &str, value: &GridValue, _old_value: Option<&GridValue>) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update:{}={}", key, value));
    }

    fn on_remove(&self, key: &str, _old_value: Option<&GridValue>) {
        self.calls.lock().unwrap().push(format!("remove:{}", key));
    }

    fn on_evict(&self, key: &str, _old_value: Option<&GridValue>) {
        self.calls.lock().unwrap().push(format!("evict:{}", key));
    }
}
