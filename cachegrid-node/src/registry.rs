//! Cluster-consistent listener registry.
//!
//! Listener callbacks are live objects that cannot be replicated, so the
//! registry splits state in two: a process-local adapter table holding the
//! callbacks, and a replicated table in the grid itself mapping each object
//! key to the ordered list of listener ids attached to it. The replicated
//! table is the authoritative cluster-wide view; the local table only ever
//! holds the slice of adapters this process created.
//!
//! Attach happens locally inside a transaction. Detach is asynchronous: it
//! publishes an admin message, and every member (including the sender)
//! removes its local slice when its own subscriber processes the message.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use cachegrid_core::{
    CacheError, GridValue, NativeEvent, ObjectId, Result, LISTENER_CATEGORIES,
};

use crate::broadcast::{AdminChannel, AdminMessage};
use crate::grid::map::GridMap;
use crate::grid::object::DistributedObject;
use crate::grid::GridInstance;
use crate::listener::adapter::EventAdapter;

/// Where a local registration sits in its lifecycle.
///
/// A registration is created attached; requesting a detach moves it to
/// [`DetachRequested`](Self::DetachRequested) until the admin message comes
/// back around and removes the entry entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Local adapter installed, id present in the replicated table.
    Attached,
    /// Detach published; removal converges asynchronously.
    DetachRequested,
}

enum NativeAttachment {
    Object {
        target: DistributedObject,
        registration: Uuid,
    },
    Lifecycle {
        registration: Uuid,
    },
}

struct LocalRegistration {
    adapter: Arc<EventAdapter>,
    attachment: NativeAttachment,
    state: RegistrationState,
}

type RollbackHook = Arc<dyn Fn() + Send + Sync>;

/// The per-process listener registry.
pub struct ListenerRegistry {
    instance: GridInstance,
    table: GridMap,
    admin: AdminChannel,
    local: Mutex<HashMap<String, LocalRegistration>>,
    rollback_hook: Option<RollbackHook>,
}

impl ListenerRegistry {
    /// Creates a registry over the given replicated table and admin channel.
    pub fn new(instance: GridInstance, table: GridMap, admin: AdminChannel) -> Self {
        Self {
            instance,
            table,
            admin,
            local: Mutex::new(HashMap::new()),
            rollback_hook: None,
        }
    }

    /// Installs a hook invoked after a failed attach has been rolled back.
    pub fn with_rollback_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.rollback_hook = Some(Arc::new(hook));
        self
    }

    /// Returns the admin channel this registry publishes on.
    pub fn admin(&self) -> &AdminChannel {
        &self.admin
    }

    /// Attaches an adapter to a distributed object.
    ///
    /// Returns `Ok(false)` without error when the listener id is already
    /// registered, locally or anywhere in the cluster; retries from
    /// at-least-once delivery paths are expected and harmless.
    ///
    /// # Errors
    ///
    /// Fails when the target category does not support listeners (the error
    /// names the supported categories) or when the instance is shut down.
    /// A failure after the transaction began is rolled back and re-raised
    /// with the original cause attached.
    pub async fn attach(&self, target: &DistributedObject, adapter: EventAdapter) -> Result<bool> {
        self.ensure_active()?;
        let adapter = Arc::new(adapter);
        let listener_id = adapter.id().to_string();
        let object_key = target.id().to_string();

        let mut local = self.local.lock().await;
        if local.contains_key(&listener_id) {
            tracing::warn!(
                listener = %listener_id,
                "listener already registered in this process; attach rejected"
            );
            return Ok(false);
        }
        let mut ids = self.replicated_ids(&object_key);
        if ids.iter().any(|id| id == &listener_id) {
            tracing::warn!(
                listener = %listener_id,
                object = %object_key,
                "listener already attached elsewhere in the cluster; attach rejected"
            );
            return Ok(false);
        }

        let mut txn = self.instance.new_transaction();
        txn.begin()?;

        ids.push(listener_id.clone());
        self.store_replicated_ids(&object_key, ids);

        match native_attach(target, Arc::clone(&adapter)) {
            Ok(registration) => {
                local.insert(
                    listener_id.clone(),
                    LocalRegistration {
                        adapter,
                        attachment: NativeAttachment::Object {
                            target: target.clone(),
                            registration,
                        },
                        state: RegistrationState::Attached,
                    },
                );
                txn.commit()?;
                tracing::info!(listener = %listener_id, object = %object_key, "listener attached");
                Ok(true)
            }
            Err(error) => {
                // The grid applies writes immediately, so compensate the
                // replicated insert before reporting the rollback.
                let mut ids = self.replicated_ids(&object_key);
                ids.retain(|id| id != &listener_id);
                self.store_replicated_ids(&object_key, ids);
                if let Err(rollback_error) = txn.rollback() {
                    tracing::warn!(%rollback_error, "rollback failed after attach error");
                }
                if let Some(ref hook) = self.rollback_hook {
                    hook();
                }
                Err(CacheError::rolled_back(error))
            }
        }
    }

    /// Requests the cluster-wide detach of a listener id.
    ///
    /// Publishes a detach message and returns once the grace interval has
    /// elapsed. Completion does not imply removal has taken effect on every
    /// member; convergence is eventual.
    ///
    /// # Errors
    ///
    /// Fails when the id is not present in the target's replicated id list.
    pub async fn detach(&self, target: &DistributedObject, listener_id: &str) -> Result<()> {
        self.ensure_active()?;
        if listener_id.is_empty() {
            return Err(CacheError::Listener(
                "listener id must not be empty".to_string(),
            ));
        }
        let object_key = target.id().to_string();
        {
            let mut local = self.local.lock().await;
            let ids = self.replicated_ids(&object_key);
            if !ids.iter().any(|id| id == listener_id) {
                return Err(CacheError::Listener(format!(
                    "listener '{}' is not registered on '{}'",
                    listener_id, object_key
                )));
            }
            if let Some(registration) = local.get_mut(listener_id) {
                registration.state = RegistrationState::DetachRequested;
            }
        }
        self.admin
            .publish(&AdminMessage::Detach {
                object: target.id(),
                listener_id: listener_id.to_string(),
            })
            .await
    }

    /// Applies a detach message received from the admin channel.
    ///
    /// Removes the local adapter when this process holds one (absence is
    /// normal for members that never attached the id) and drops the id from
    /// the replicated table. Idempotent across members.
    pub async fn apply_detach(&self, object: &ObjectId, listener_id: &str) {
        let removed = self.local.lock().await.remove(listener_id);
        match removed {
            Some(registration) => {
                self.native_detach(&registration.attachment);
                tracing::debug!(
                    listener = %listener_id,
                    object = %object,
                    "local adapter removed"
                );
            }
            None => {
                tracing::debug!(
                    listener = %listener_id,
                    object = %object,
                    "detach for listener with no local adapter"
                );
            }
        }

        let key = object.to_string();
        let mut ids = self.replicated_ids(&key);
        let before = ids.len();
        ids.retain(|id| id != listener_id);
        if ids.len() != before {
            self.store_replicated_ids(&key, ids);
        }
    }

    /// Registers an object-lifecycle adapter, tracked only in this process.
    ///
    /// Returns `Ok(false)` when the listener id is already registered here.
    pub async fn attach_instance(&self, adapter: EventAdapter) -> Result<bool> {
        self.ensure_active()?;
        let adapter = Arc::new(adapter);
        let listener_id = adapter.id().to_string();

        let mut local = self.local.lock().await;
        if local.contains_key(&listener_id) {
            tracing::warn!(
                listener = %listener_id,
                "listener already registered in this process; attach rejected"
            );
            return Ok(false);
        }

        let handler = Arc::clone(&adapter);
        let registration = self
            .instance
            .add_object_listener(move |event| handler.handle(NativeEvent::Object(event)));
        local.insert(
            listener_id.clone(),
            LocalRegistration {
                adapter,
                attachment: NativeAttachment::Lifecycle { registration },
                state: RegistrationState::Attached,
            },
        );
        tracing::info!(listener = %listener_id, "instance listener attached");
        Ok(true)
    }

    /// Removes an object-lifecycle adapter. Immediate and local only.
    ///
    /// # Errors
    ///
    /// Fails when the id is unknown here or names a non-lifecycle listener.
    pub async fn detach_instance(&self, listener_id: &str) -> Result<()> {
        let mut local = self.local.lock().await;
        match local.get(listener_id).map(|reg| &reg.attachment) {
            Some(NativeAttachment::Lifecycle { registration }) => {
                let registration = *registration;
                local.remove(listener_id);
                self.instance.remove_object_listener(registration);
                tracing::info!(listener = %listener_id, "instance listener detached");
                Ok(())
            }
            Some(NativeAttachment::Object { .. }) => Err(CacheError::Listener(format!(
                "listener '{}' is not an instance listener",
                listener_id
            ))),
            None => Err(CacheError::Listener(format!(
                "instance listener '{}' is not registered",
                listener_id
            ))),
        }
    }

    /// Returns the replicated listener ids for a target, in attach order.
    ///
    /// Targets without a tracking structure (topics) yield an empty list.
    pub fn listener_ids_for(&self, target: &DistributedObject) -> Vec<String> {
        if !target.category().supports_listeners() {
            return Vec::new();
        }
        self.replicated_ids(&target.id().to_string())
    }

    /// Returns every listener id in the replicated table, deduplicated and
    /// sorted.
    pub fn all_listener_ids(&self) -> BTreeSet<String> {
        self.table
            .entries()
            .into_iter()
            .flat_map(|(_, value)| decode_ids(value))
            .collect()
    }

    /// Returns the ids of adapters held by this process, sorted.
    pub async fn local_listener_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.local.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the lifecycle state of a locally held registration.
    pub async fn registration_state(&self, listener_id: &str) -> Option<RegistrationState> {
        self.local
            .lock()
            .await
            .get(listener_id)
            .map(|reg| reg.state)
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

    fn replicated_ids(&self, object_key: &str) -> Vec<String> {
        self.table.get(object_key).map(decode_ids).unwrap_or_default()
    }

    fn store_replicated_ids(&self, object_key: &str, ids: Vec<String>) {
        if ids.is_empty() {
            self.table.remove(object_key);
        } else {
            self.table.put(
                object_key,
                GridValue::Array(ids.into_iter().map(GridValue::String).collect()),
            );
        }
    }

    fn native_detach(&self, attachment: &NativeAttachment) {
        match attachment {
            NativeAttachment::Object {
                target,
                registration,
            } => match target {
                DistributedObject::Map(map) => {
                    map.remove_entry_listener(*registration);
                }
                DistributedObject::Set(set) => {
                    set.remove_item_listener(*registration);
                }
                DistributedObject::List(list) => {
                    list.remove_item_listener(*registration);
                }
                DistributedObject::Queue(queue) => {
                    queue.remove_item_listener(*registration);
                }
                DistributedObject::Topic(_) => {}
            },
            NativeAttachment::Lifecycle { registration } => {
                self.instance.remove_object_listener(*registration);
            }
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("instance", &self.instance.name())
            .field("table", &self.table.name())
            .finish()
    }
}

fn decode_ids(value: GridValue) -> Vec<String> {
    match value {
        GridValue::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn native_attach(target: &DistributedObject, adapter: Arc<EventAdapter>) -> Result<Uuid> {
    match target {
        DistributedObject::Map(map) => {
            Ok(map.add_entry_listener(move |event| adapter.handle(NativeEvent::Entry(event))))
        }
        DistributedObject::Set(set) => {
            Ok(set.add_item_listener(move |event| adapter.handle(NativeEvent::Item(event))))
        }
        DistributedObject::List(list) => {
            Ok(list.add_item_listener(move |event| adapter.handle(NativeEvent::Item(event))))
        }
        DistributedObject::Queue(queue) => {
            Ok(queue.add_item_listener(move |event| adapter.handle(NativeEvent::Item(event))))
        }
        DistributedObject::Topic(topic) => Err(unsupported_target(&topic.id())),
    }
}

fn unsupported_target(object: &ObjectId) -> CacheError {
    let supported: Vec<&str> = LISTENER_CATEGORIES.iter().map(|c| c.as_str()).collect();
    CacheError::Configuration(format!(
        "cannot attach listener to '{}': {} objects do not carry listeners; supported categories: {}",
        object,
        object.category,
        supported.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridCluster;
    use crate::listener::adapter::adapt;
    use crate::listener::FnCacheListener;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn registry() -> (GridCluster, Arc<ListenerRegistry>) {
        let cluster = GridCluster::new("test");
        let instance = cluster.join("node");
        let table = instance.get_map("registry");
        let admin = AdminChannel::new(instance.get_topic("admin"), Duration::from_millis(1));
        (
            cluster.clone(),
            Arc::new(ListenerRegistry::new(instance, table, admin)),
        )
    }

    fn listener(id: &str) -> EventAdapter {
        adapt(FnCacheListener::builder(id).build()).unwrap()
    }

    #[tokio::test]
    async fn test_attach_then_duplicate_rejected() {
        let (cluster, registry) = registry();
        let target = DistributedObject::from(cluster.join("peer").get_map("m"));

        assert!(registry.attach(&target, listener("L1")).await.unwrap());
        assert!(!registry.attach(&target, listener("L1")).await.unwrap());
        assert_eq!(registry.listener_ids_for(&target), vec!["L1".to_string()]);
    }

    #[tokio::test]
    async fn test_attached_listener_receives_events() {
        let (cluster, registry) = registry();
        let map = cluster.join("peer").get_map("m");
        let target = DistributedObject::from(map.clone());

        let puts = Arc::new(AtomicU32::new(0));
        let puts_clone = Arc::clone(&puts);
        let adapter = adapt(
            FnCacheListener::builder("L1")
                .on_put(move |_, _| {
                    puts_clone.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        )
        .unwrap();

        registry.attach(&target, adapter).await.unwrap();
        map.put("k", "v".into());
        assert_eq!(puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_topic_target_rolls_back_with_supported_categories() {
        let (cluster, registry) = registry();
        let target = DistributedObject::from(cluster.join("peer").get_topic("t"));

        let error = registry.attach(&target, listener("L1")).await.unwrap_err();
        let message = error.to_string();
        assert!(message.contains("attach rolled back"));
        assert!(message.contains("LIST, SET, QUEUE, MAP"));
        assert!(registry.listener_ids_for(&target).is_empty());
        assert!(registry.local_listener_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_hook_runs_on_failed_attach() {
        let (cluster, _) = registry();
        let hook_calls = Arc::new(AtomicU32::new(0));
        let hook_calls_clone = Arc::clone(&hook_calls);
        let instance = cluster.join("node-2");
        let registry = ListenerRegistry::new(
            instance.clone(),
            instance.get_map("registry"),
            AdminChannel::new(instance.get_topic("admin"), Duration::from_millis(1)),
        )
        .with_rollback_hook(move || {
            hook_calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let target = DistributedObject::from(instance.get_topic("t"));
        assert!(registry.attach(&target, listener("L1")).await.is_err());
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detach_unregistered_id_fails() {
        let (cluster, registry) = registry();
        let target = DistributedObject::from(cluster.join("peer").get_map("m"));

        let error = registry.detach(&target, "ghost").await.unwrap_err();
        assert!(matches!(error, CacheError::Listener(_)));
        assert!(error.to_string().contains("not registered"));
    }

    #[tokio::test]
    async fn test_detach_publishes_and_apply_converges() {
        let (cluster, registry) = registry();
        let map = cluster.join("peer").get_map("m");
        let target = DistributedObject::from(map.clone());

        registry.attach(&target, listener("L1")).await.unwrap();
        let mut subscription = registry.admin().subscribe();

        registry.detach(&target, "L1").await.unwrap();
        assert_eq!(
            registry.registration_state("L1").await,
            Some(RegistrationState::DetachRequested)
        );

        let message = AdminChannel::decode(&subscription.recv().await.unwrap()).unwrap();
        match message {
            AdminMessage::Detach {
                object,
                listener_id,
            } => {
                registry.apply_detach(&object, &listener_id).await;
            }
            other => panic!("unexpected admin message: {:?}", other),
        }

        assert!(registry.listener_ids_for(&target).is_empty());
        assert!(registry.local_listener_ids().await.is_empty());
        assert_eq!(registry.registration_state("L1").await, None);
        assert_eq!(map.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_detach_without_local_adapter_is_tolerated() {
        let (cluster, registry) = registry();
        let target = DistributedObject::from(cluster.join("peer").get_map("m"));
        registry.attach(&target, listener("L1")).await.unwrap();

        // A second member never held the adapter locally.
        let other_instance = cluster.join("other");
        let other = ListenerRegistry::new(
            other_instance.clone(),
            other_instance.get_map("registry"),
            AdminChannel::new(other_instance.get_topic("admin"), Duration::from_millis(1)),
        );

        other.apply_detach(&target.id(), "L1").await;
        assert!(other.listener_ids_for(&target).is_empty());
    }

    #[tokio::test]
    async fn test_listener_ids_for_topic_is_empty() {
        let (cluster, registry) = registry();
        let target = DistributedObject::from(cluster.join("peer").get_topic("t"));
        assert!(registry.listener_ids_for(&target).is_empty());
    }

    #[tokio::test]
    async fn test_all_listener_ids_sorted_union() {
        let (cluster, registry) = registry();
        let peer = cluster.join("peer");
        let map = DistributedObject::from(peer.get_map("m"));
        let set = DistributedObject::from(peer.get_set("s"));

        registry.attach(&map, listener("zeta")).await.unwrap();
        registry.attach(&set, listener("alpha")).await.unwrap();

        let ids: Vec<String> = registry.all_listener_ids().into_iter().collect();
        assert_eq!(ids, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn test_instance_listener_attach_and_detach() {
        let (cluster, registry) = registry();

        assert!(registry.attach_instance(listener("watcher")).await.unwrap());
        assert!(!registry.attach_instance(listener("watcher")).await.unwrap());

        registry.detach_instance("watcher").await.unwrap();
        assert!(matches!(
            registry.detach_instance("watcher").await,
            Err(CacheError::Listener(_))
        ));
        let _ = cluster;
    }

    #[tokio::test]
    async fn test_attach_after_shutdown_fails() {
        let cluster = GridCluster::new("test");
        let instance = cluster.join("node");
        let registry = ListenerRegistry::new(
            instance.clone(),
            instance.get_map("registry"),
            AdminChannel::new(instance.get_topic("admin"), Duration::from_millis(1)),
        );
        let target = DistributedObject::from(instance.get_map("m"));

        instance.shutdown();
        let error = registry.attach(&target, listener("L1")).await.unwrap_err();
        assert!(matches!(error, CacheError::Instance(_)));
    }
}
