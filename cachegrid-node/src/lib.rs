//! cachegrid node: in-process data grid plus cluster-consistent listener
//! coordination.
//!
//! The grid substrate ([`grid`]) provides replicated maps, collections,
//! FIFO topics, transactions, and cluster membership. On top of it, the
//! listener subsystem keeps every member's view of "which listeners are
//! attached to which distributed object" consistent: attach is local and
//! transactional, detach is broadcast on an admin topic and converges
//! eventually, and one adapter shape normalizes keyed entry events, keyless
//! item events, and object lifecycle events into a single listener contract.
//!
//! # Example
//!
//! ```ignore
//! use cachegrid_node::{CacheConfig, ClusterCache, FnCacheListener, GridCluster};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cachegrid_core::Result<()> {
//!     let cluster = GridCluster::new("dev");
//!     let cache = ClusterCache::join(&cluster, CacheConfig::default()).await?;
//!
//!     let listener = FnCacheListener::builder("auditor")
//!         .on_put(|key, value| println!("put: {} -> {}", key, value))
//!         .build();
//!     cache.add_listener(Arc::new(listener)).await?;
//!
//!     cache.put("greeting", "hello".into())?;
//!     cache.remove_listener("auditor").await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod grid;
pub mod listener;
pub mod registry;

pub use broadcast::{AdminChannel, AdminMessage};
pub use cache::ClusterCache;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use grid::collection::{GridList, GridQueue, GridSet};
pub use grid::map::GridMap;
pub use grid::object::{CollectionKind, DistributedObject};
pub use grid::topic::{GridTopic, TopicMessage, TopicSubscription};
pub use grid::transaction::{TransactionContext, TransactionState};
pub use grid::{GridCluster, GridInstance, Member};
pub use listener::adapter::{adapt, EventAdapter};
pub use listener::{
    CacheListener, FnCacheListener, FnCacheListenerBuilder, SharedCacheListener,
};
pub use registry::{ListenerRegistry, RegistrationState};

pub use cachegrid_core as core;
