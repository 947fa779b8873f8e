//! Example: cluster-wide listener coordination.
//!
//! Two members join the same cluster; one attaches a listener, the other
//! performs mutations and finally requests the detach. Run with:
//! `cargo run --example listener_fanout`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cachegrid_node::{CacheConfig, ClusterCache, FnCacheListener, GridCluster};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cluster = GridCluster::new("dev");

    let cache_a = ClusterCache::join(
        &cluster,
        CacheConfig::builder().instance_name("node-a").build()?,
    )
    .await?;
    let cache_b = ClusterCache::join(
        &cluster,
        CacheConfig::builder().instance_name("node-b").build()?,
    )
    .await?;

    // Track event counts
    let put_count = Arc::new(AtomicUsize::new(0));
    let put_counter = Arc::clone(&put_count);

    let listener = FnCacheListener::builder("demo-listener")
        .on_put(move |key, value| {
            put_counter.fetch_add(1, Ordering::SeqCst);
            println!("[PUT] {} -> {}", key, value);
        })
        .on_update(|key, value, old_value| {
            println!("[UPDATE] {} -> {} (was: {:?})", key, value, old_value);
        })
        .on_remove(|key, _| {
            println!("[REMOVE] {}", key);
        })
        .build();

    cache_a.add_listener(Arc::new(listener)).await?;
    println!("listener ids: {:?}", cache_a.listener_ids());

    println!("\n--- Performing cache operations on node-b ---\n");

    cache_b.put("user:1", "Alice".into())?;
    cache_b.put("user:2", "Bob".into())?;
    cache_b.put("user:1", "Alice Smith".into())?; // update
    cache_b.remove("user:2")?;

    println!("\nputs observed on node-a: {}", put_count.load(Ordering::SeqCst));

    // Detach propagates to every member; the call waits the grace interval.
    cache_b.remove_listener("demo-listener").await?;
    println!("listener ids after detach: {:?}", cache_a.listener_ids());

    cache_a.shutdown();
    cache_b.shutdown();

    Ok(())
}
