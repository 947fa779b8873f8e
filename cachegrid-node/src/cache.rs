//! The per-process cache facade.
//!
//! [`ClusterCache`] is the entry point a process uses to work with the
//! cluster: direct key/value operations on a shared top-level map,
//! distributed map/collection/topic accessors, and listener coordination.
//! Each facade owns the adapters it creates and runs one subscriber task on
//! the admin broadcast topic to apply detach and shutdown messages from
//! every member, itself included.
//!
//! A listener's lifecycle as seen from here: unattached, then attached
//! (local adapter plus replicated id), then detach-requested once the admin
//! message is published, then detached when the message has been processed
//! cluster-wide. No transition skips the detach-requested step.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use cachegrid_core::{from_grid_value, to_grid_value, CacheError, GridValue, Result};

use crate::broadcast::{AdminChannel, AdminMessage};
use crate::config::CacheConfig;
use crate::grid::map::GridMap;
use crate::grid::object::{CollectionKind, DistributedObject};
use crate::grid::topic::{GridTopic, TopicSubscription};
use crate::grid::{GridCluster, GridInstance};
use crate::listener::adapter::EventAdapter;
use crate::listener::SharedCacheListener;
use crate::registry::ListenerRegistry;

/// A process's entry point to the clustered cache.
pub struct ClusterCache {
    config: CacheConfig,
    instance: GridInstance,
    data: GridMap,
    registry: Arc<ListenerRegistry>,
    admin_task: JoinHandle<()>,
}

impl ClusterCache {
    /// Joins the cluster and starts this process's admin subscriber.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; kept fallible because joining a
    /// remote substrate is.
    pub async fn join(cluster: &GridCluster, config: CacheConfig) -> Result<Self> {
        let instance = cluster.join(config.instance_name());
        let data = instance.get_map(config.data_map_name());
        let table = instance.get_map(config.registry_map_name());
        let admin = AdminChannel::new(
            instance.get_topic(config.admin_topic_name()),
            config.propagation_grace(),
        );

        let mut registry = ListenerRegistry::new(instance.clone(), table, admin);
        if let Some(hook) = config.rollback_hook() {
            let hook = Arc::clone(hook);
            registry = registry.with_rollback_hook(move || (*hook)());
        }
        let registry = Arc::new(registry);

        let subscription = registry.admin().subscribe();
        let admin_task = tokio::spawn(admin_loop(
            subscription,
            Arc::clone(&registry),
            instance.clone(),
        ));

        tracing::info!(
            cluster = %cluster.name(),
            instance = %instance.name(),
            "cache joined cluster"
        );

        Ok(Self {
            config,
            instance,
            data,
            registry,
            admin_task,
        })
    }

    /// Returns this facade's configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the wrapped grid instance.
    ///
    /// Exposed deliberately so tests and diagnostics can reach the substrate
    /// without reflection-style tricks.
    pub fn grid(&self) -> &GridInstance {
        &self.instance
    }

    /// Returns this facade's listener registry.
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Returns `true` until this facade's instance is shut down.
    pub fn is_active(&self) -> bool {
        self.instance.is_active()
    }

    // ------------------------------------------------------------------
    // Shared data map operations
    // ------------------------------------------------------------------

    /// Returns the value under `key` in the shared data map.
    pub fn get(&self, key: &str) -> Result<Option<GridValue>> {
        self.ensure_active()?;
        Ok(self.data.get(key))
    }

    /// Stores `value` under `key`, returning the previous value if any.
    pub fn put(&self, key: &str, value: GridValue) -> Result<Option<GridValue>> {
        self.ensure_active()?;
        Ok(self.data.put(key, value))
    }

    /// Removes the entry under `key`, returning its value if any.
    pub fn remove(&self, key: &str) -> Result<Option<GridValue>> {
        self.ensure_active()?;
        Ok(self.data.remove(key))
    }

    /// Returns `true` if the shared data map contains `key`.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.ensure_active()?;
        Ok(self.data.contains_key(key))
    }

    /// Wraps any serializable value and stores it under `key`.
    ///
    /// The value round-trips transparently through [`get_value`](Self::get_value).
    pub fn put_value<T: Serialize>(&self, key: &str, value: &T) -> Result<Option<GridValue>> {
        let wrapped = to_grid_value(value)?;
        self.put(key, wrapped)
    }

    /// Reads the value under `key` back into `T`.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(from_grid_value(value)?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Distributed object accessors
    // ------------------------------------------------------------------

    /// Returns the distributed map with the given name, creating it on
    /// first access from any member.
    pub fn get_distributed_map(&self, name: &str) -> Result<DistributedObject> {
        self.ensure_active()?;
        Ok(DistributedObject::from(self.instance.get_map(name)))
    }

    /// Returns the distributed collection of the given kind and name.
    pub fn get_distributed_collection(
        &self,
        kind: CollectionKind,
        name: &str,
    ) -> Result<DistributedObject> {
        self.ensure_active()?;
        Ok(match kind {
            CollectionKind::List => DistributedObject::from(self.instance.get_list(name)),
            CollectionKind::Set => DistributedObject::from(self.instance.get_set(name)),
            CollectionKind::Queue => DistributedObject::from(self.instance.get_queue(name)),
        })
    }

    /// Returns the pub/sub topic with the given name.
    pub fn topic(&self, name: &str) -> Result<GridTopic> {
        self.ensure_active()?;
        Ok(self.instance.get_topic(name))
    }

    // ------------------------------------------------------------------
    // Listener coordination
    // ------------------------------------------------------------------

    /// Attaches a listener to the shared top-level data map.
    ///
    /// Returns `Ok(false)` when the listener id is already registered.
    pub async fn add_listener(&self, listener: SharedCacheListener) -> Result<bool> {
        let target = DistributedObject::from(self.data.clone());
        self.add_listener_for(&target, listener).await
    }

    /// Requests the cluster-wide detach of a listener id from the shared
    /// data map.
    pub async fn remove_listener(&self, listener_id: &str) -> Result<()> {
        let target = DistributedObject::from(self.data.clone());
        self.remove_listener_for(&target, listener_id).await
    }

    /// Returns the listener ids attached to the shared data map, in attach
    /// order as observed locally.
    pub fn listener_ids(&self) -> Vec<String> {
        let target = DistributedObject::from(self.data.clone());
        self.registry.listener_ids_for(&target)
    }

    /// Attaches a listener to any substrate-managed distributed object.
    ///
    /// Holding a [`DistributedObject`] proves the target is substrate
    /// managed; categories without listener support (topics) fail with an
    /// error naming the supported categories.
    pub async fn add_listener_for(
        &self,
        target: &DistributedObject,
        listener: SharedCacheListener,
    ) -> Result<bool> {
        let adapter = EventAdapter::new(listener)?.with_event_logging(self.config.log_events());
        self.registry.attach(target, adapter).await
    }

    /// Requests the cluster-wide detach of a listener id from a target.
    ///
    /// Returns once the admin message is published and the grace interval
    /// has elapsed; removal on every member is eventual, not immediate.
    pub async fn remove_listener_for(
        &self,
        target: &DistributedObject,
        listener_id: &str,
    ) -> Result<()> {
        self.registry.detach(target, listener_id).await
    }

    /// Returns the listener ids attached to a target, in attach order.
    pub fn listener_ids_for(&self, target: &DistributedObject) -> Vec<String> {
        self.registry.listener_ids_for(target)
    }

    /// Returns every listener id in the replicated registry, sorted.
    pub fn all_listener_ids(&self) -> BTreeSet<String> {
        self.registry.all_listener_ids()
    }

    /// Attaches a listener for object created/destroyed events.
    ///
    /// Instance listeners are tracked only in this process's adapter table;
    /// they are never replicated.
    pub async fn add_instance_listener(&self, listener: SharedCacheListener) -> Result<bool> {
        let adapter = EventAdapter::new(listener)?.with_event_logging(self.config.log_events());
        self.registry.attach_instance(adapter).await
    }

    /// Removes an instance listener. Immediate and local only.
    pub async fn remove_instance_listener(&self, listener_id: &str) -> Result<()> {
        self.registry.detach_instance(listener_id).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Broadcasts a shutdown message: every member receiving it, this one
    /// included, stops its own grid instance.
    pub async fn broadcast_shutdown(&self) -> Result<()> {
        self.ensure_active()?;
        self.registry.admin().publish(&AdminMessage::Shutdown).await
    }

    /// Stops this process's instance and admin subscriber. Local only.
    pub fn shutdown(&self) {
        self.admin_task.abort();
        self.instance.shutdown();
    }

    fn ensure_active(&self) -> Result<()> {
        if self.instance.is_active() {
            Ok(())
        } else {
            Err(CacheError::Instance(format!(
                "instance '{}' has been shut down",
                self.instance.name()
            )))
        }
    }
}

impl Drop for ClusterCache {
    fn drop(&mut self) {
        self.admin_task.abort();
    }
}

impl fmt::Debug for ClusterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCache")
            .field("instance", &self.instance.name())
            .field("data_map", &self.data.name())
            .field("active", &self.is_active())
            .finish()
    }
}

async fn admin_loop(
    mut subscription: TopicSubscription,
    registry: Arc<ListenerRegistry>,
    instance: GridInstance,
) {
    while let Some(message) = subscription.recv().await {
        match AdminChannel::decode(&message) {
            Ok(AdminMessage::Detach {
                object,
                listener_id,
            }) => {
                registry.apply_detach(&object, &listener_id).await;
            }
            Ok(AdminMessage::Attach {
                object,
                listener_id,
            }) => {
                // The replicated registry already carries the id.
                tracing::debug!(
                    listener = %listener_id,
                    object = %object,
                    "listener attached elsewhere in the cluster"
                );
            }
            Ok(AdminMessage::Shutdown) => {
                tracing::info!(instance = %instance.name(), "shutdown broadcast received");
                instance.shutdown();
                break;
            }
            Err(error) => {
                tracing::warn!(%error, "ignoring undecodable admin message");
            }
        }
    }
    tracing::debug!(instance = %instance.name(), "admin subscriber stopped");
}
