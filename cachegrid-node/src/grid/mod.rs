//! In-process data grid fabric.
//!
//! A [`GridCluster`] is the shared fabric any number of [`GridInstance`]
//! members join. Distributed objects (maps, collections, topics) live in the
//! fabric and are visible to every member; replication is zero-delay shared
//! state. Entry and item listeners fire synchronously on the mutating call,
//! while topic delivery is asynchronous FIFO per subscriber and never blocks
//! the publisher.

pub mod collection;
pub mod map;
pub mod object;
pub mod topic;
pub mod transaction;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use cachegrid_core::{DistributedObjectEvent, ObjectCategory, ObjectEventType, ObjectId};

use self::collection::{CollectionCore, GridList, GridQueue, GridSet};
use self::map::{GridMap, MapCore};
use self::topic::{GridTopic, TopicCore};
use self::transaction::TransactionContext;

// A poisoned lock only means another thread panicked mid-update; the guarded
// state is still structurally sound, so ride through instead of propagating.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A cluster member's identity: a cluster-unique id plus a human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    id: Uuid,
    name: String,
}

impl Member {
    fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Returns the member's cluster-unique id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the member's human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

type ObjectEventHandler = Arc<dyn Fn(DistributedObjectEvent) + Send + Sync>;

struct ObjectListenerReg {
    id: Uuid,
    member: Uuid,
    handler: ObjectEventHandler,
}

struct ClusterInner {
    name: String,
    members: RwLock<Vec<Member>>,
    maps: RwLock<HashMap<String, Arc<MapCore>>>,
    collections: RwLock<HashMap<String, Arc<CollectionCore>>>,
    topics: RwLock<HashMap<String, Arc<TopicCore>>>,
    object_listeners: RwLock<Vec<ObjectListenerReg>>,
}

/// The shared in-process grid fabric.
///
/// Cloning a `GridCluster` yields another handle to the same fabric.
#[derive(Clone)]
pub struct GridCluster {
    inner: Arc<ClusterInner>,
}

impl GridCluster {
    /// Creates a new, empty cluster fabric.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ClusterInner {
                name: name.into(),
                members: RwLock::new(Vec::new()),
                maps: RwLock::new(HashMap::new()),
                collections: RwLock::new(HashMap::new()),
                topics: RwLock::new(HashMap::new()),
                object_listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns the cluster name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Joins the cluster as a new member and returns its instance handle.
    pub fn join(&self, instance_name: impl Into<String>) -> GridInstance {
        let member = Member::new(instance_name);
        write_lock(&self.inner.members).push(member.clone());

        tracing::info!(
            cluster = %self.inner.name,
            member = %member,
            "member joined cluster"
        );

        GridInstance {
            cluster: self.clone(),
            member,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns a snapshot of the current cluster members.
    pub fn members(&self) -> Vec<Member> {
        read_lock(&self.inner.members).clone()
    }

    /// Generates a cluster-unique id with the given prefix.
    pub fn generate_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }

    fn notify_object_event(&self, event: DistributedObjectEvent) {
        let handlers: Vec<ObjectEventHandler> = read_lock(&self.inner.object_listeners)
            .iter()
            .map(|reg| Arc::clone(&reg.handler))
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    fn add_object_listener(&self, member: Uuid, handler: ObjectEventHandler) -> Uuid {
        let id = Uuid::new_v4();
        write_lock(&self.inner.object_listeners).push(ObjectListenerReg {
            id,
            member,
            handler,
        });
        id
    }

    fn remove_object_listener(&self, id: Uuid) -> bool {
        let mut listeners = write_lock(&self.inner.object_listeners);
        let before = listeners.len();
        listeners.retain(|reg| reg.id != id);
        listeners.len() != before
    }

    fn map_core(&self, name: &str, member: &Member) -> Arc<MapCore> {
        let (core, created) = {
            let mut maps = write_lock(&self.inner.maps);
            match maps.get(name) {
                Some(core) => (Arc::clone(core), false),
                None => {
                    let core = Arc::new(MapCore::new(name));
                    maps.insert(name.to_string(), Arc::clone(&core));
                    (core, true)
                }
            }
        };
        if created {
            self.notify_object_event(DistributedObjectEvent::new(
                ObjectId::new(ObjectCategory::Map, name),
                ObjectEventType::Created,
                member.id(),
            ));
        }
        core
    }

    fn collection_core(
        &self,
        category: ObjectCategory,
        name: &str,
        member: &Member,
    ) -> Arc<CollectionCore> {
        let key = format!("{}:{}", category, name);
        let (core, created) = {
            let mut collections = write_lock(&self.inner.collections);
            match collections.get(&key) {
                Some(core) => (Arc::clone(core), false),
                None => {
                    let core = Arc::new(CollectionCore::new(name, category));
                    collections.insert(key, Arc::clone(&core));
                    (core, true)
                }
            }
        };
        if created {
            self.notify_object_event(DistributedObjectEvent::new(
                ObjectId::new(category, name),
                ObjectEventType::Created,
                member.id(),
            ));
        }
        core
    }

    fn topic_core(&self, name: &str, member: &Member) -> Arc<TopicCore> {
        let (core, created) = {
            let mut topics = write_lock(&self.inner.topics);
            match topics.get(name) {
                Some(core) => (Arc::clone(core), false),
                None => {
                    let core = Arc::new(TopicCore::new(name));
                    topics.insert(name.to_string(), Arc::clone(&core));
                    (core, true)
                }
            }
        };
        if created {
            self.notify_object_event(DistributedObjectEvent::new(
                ObjectId::new(ObjectCategory::Topic, name),
                ObjectEventType::Created,
                member.id(),
            ));
        }
        core
    }

    pub(crate) fn destroy_object(&self, id: &ObjectId, member: Uuid) -> bool {
        let removed = match id.category {
            ObjectCategory::Map => write_lock(&self.inner.maps).remove(&id.name).is_some(),
            ObjectCategory::Topic => write_lock(&self.inner.topics).remove(&id.name).is_some(),
            category => write_lock(&self.inner.collections)
                .remove(&format!("{}:{}", category, id.name))
                .is_some(),
        };
        if removed {
            self.notify_object_event(DistributedObjectEvent::new(
                id.clone(),
                ObjectEventType::Destroyed,
                member,
            ));
        }
        removed
    }
}

impl fmt::Debug for GridCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridCluster")
            .field("name", &self.inner.name)
            .field("members", &read_lock(&self.inner.members).len())
            .finish()
    }
}

/// A single member's handle onto the cluster fabric.
///
/// All distributed object accessors are create-or-retrieve: the underlying
/// structure comes into existence on first access from any member.
#[derive(Clone)]
pub struct GridInstance {
    cluster: GridCluster,
    member: Member,
    active: Arc<AtomicBool>,
}

impl GridInstance {
    /// Returns the cluster this instance belongs to.
    pub fn cluster(&self) -> &GridCluster {
        &self.cluster
    }

    /// Returns this member's identity.
    pub fn member(&self) -> &Member {
        &self.member
    }

    /// Returns this member's cluster-unique id.
    pub fn member_id(&self) -> Uuid {
        self.member.id()
    }

    /// Returns this member's human-readable name.
    pub fn name(&self) -> &str {
        self.member.name()
    }

    /// Returns `true` until [`shutdown`](Self::shutdown) is called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Gracefully stops this member: it leaves the cluster and drops its
    /// object lifecycle listeners. Other members are unaffected.
    pub fn shutdown(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            write_lock(&self.cluster.inner.members).retain(|m| m.id() != self.member.id());
            write_lock(&self.cluster.inner.object_listeners)
                .retain(|reg| reg.member != self.member.id());
            tracing::info!(
                cluster = %self.cluster.name(),
                member = %self.member,
                "member left cluster"
            );
        }
    }

    /// Returns a snapshot of the current cluster members.
    pub fn members(&self) -> Vec<Member> {
        self.cluster.members()
    }

    /// Returns the distributed map with the given name, creating it on first
    /// access from any member.
    pub fn get_map(&self, name: &str) -> GridMap {
        let core = self.cluster.map_core(name, &self.member);
        GridMap::new(self.cluster.clone(), core, self.member.clone())
    }

    /// Returns the distributed set with the given name.
    pub fn get_set(&self, name: &str) -> GridSet {
        let core = self
            .cluster
            .collection_core(ObjectCategory::Set, name, &self.member);
        GridSet::new(self.cluster.clone(), core, self.member.clone())
    }

    /// Returns the distributed list with the given name.
    pub fn get_list(&self, name: &str) -> GridList {
        let core = self
            .cluster
            .collection_core(ObjectCategory::List, name, &self.member);
        GridList::new(self.cluster.clone(), core, self.member.clone())
    }

    /// Returns the distributed queue with the given name.
    pub fn get_queue(&self, name: &str) -> GridQueue {
        let core = self
            .cluster
            .collection_core(ObjectCategory::Queue, name, &self.member);
        GridQueue::new(self.cluster.clone(), core, self.member.clone())
    }

    /// Returns the distributed topic with the given name.
    pub fn get_topic(&self, name: &str) -> GridTopic {
        let core = self.cluster.topic_core(name, &self.member);
        GridTopic::new(self.cluster.clone(), core, self.member.clone())
    }

    /// Registers a handler for object created/destroyed events.
    ///
    /// Returns a registration id accepted by
    /// [`remove_object_listener`](Self::remove_object_listener).
    pub fn add_object_listener<F>(&self, handler: F) -> Uuid
    where
        F: Fn(DistributedObjectEvent) + Send + Sync + 'static,
    {
        self.cluster
            .add_object_listener(self.member.id(), Arc::new(handler))
    }

    /// Removes a previously registered object lifecycle handler.
    pub fn remove_object_listener(&self, id: Uuid) -> bool {
        self.cluster.remove_object_listener(id)
    }

    /// Creates a new transaction context bound to this member.
    pub fn new_transaction(&self) -> TransactionContext {
        TransactionContext::new(self.member.clone())
    }
}

impl fmt::Debug for GridInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridInstance")
            .field("cluster", &self.cluster.name())
            .field("member", &self.member)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_join_adds_members() {
        let cluster = GridCluster::new("test");
        let a = cluster.join("node-a");
        let b = cluster.join("node-b");

        let members = cluster.members();
        assert_eq!(members.len(), 2);
        assert_ne!(a.member_id(), b.member_id());
        assert_eq!(a.name(), "node-a");
        assert_eq!(b.name(), "node-b");
    }

    #[test]
    fn test_generate_id_is_unique() {
        let cluster = GridCluster::new("test");
        let first = cluster.generate_id("listener");
        let second = cluster.generate_id("listener");
        assert!(first.starts_with("listener-"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_maps_are_shared_across_members() {
        let cluster = GridCluster::new("test");
        let a = cluster.join("node-a");
        let b = cluster.join("node-b");

        a.get_map("orders").put("k", "v".into());
        assert_eq!(b.get_map("orders").get("k"), Some("v".into()));
    }

    #[test]
    fn test_object_created_event_fires_once() {
        let cluster = GridCluster::new("test");
        let instance = cluster.join("node-a");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        instance.add_object_listener(move |event| {
            seen_clone
                .lock()
                .unwrap()
                .push((event.object.to_string(), event.event_type));
        });

        instance.get_map("orders");
        instance.get_map("orders");

        let events = seen.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![("MAP:orders".to_string(), ObjectEventType::Created)]
        );
    }

    #[test]
    fn test_destroy_fires_destroyed_event() {
        let cluster = GridCluster::new("test");
        let instance = cluster.join("node-a");
        let map = instance.get_map("orders");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        instance.add_object_listener(move |event| {
            seen_clone.lock().unwrap().push(event.event_type);
        });

        assert!(map.destroy());
        assert!(!map.destroy());

        let events = seen.lock().unwrap().clone();
        assert_eq!(events, vec![ObjectEventType::Destroyed]);
    }

    #[test]
    fn test_shutdown_removes_member_and_listeners() {
        let cluster = GridCluster::new("test");
        let a = cluster.join("node-a");
        let b = cluster.join("node-b");

        a.add_object_listener(|_| {});
        assert!(a.is_active());

        a.shutdown();
        assert!(!a.is_active());
        assert_eq!(cluster.members().len(), 1);
        assert_eq!(read_lock(&cluster.inner.object_listeners).len(), 0);

        // shutdown is idempotent
        a.shutdown();
        assert_eq!(cluster.members().len(), 1);
        assert!(b.is_active());
    }

    #[test]
    fn test_collections_qualified_by_category() {
        let cluster = GridCluster::new("test");
        let instance = cluster.join("node-a");

        instance.get_set("shared").add("x".into());
        assert_eq!(instance.get_list("shared").len(), 0);
        assert_eq!(instance.get_set("shared").len(), 1);
    }

    #[test]
    fn test_grid_instance_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GridInstance>();
        assert_send_sync::<GridCluster>();
    }
}
