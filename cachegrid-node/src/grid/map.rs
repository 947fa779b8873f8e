//! Distributed map handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use cachegrid_core::{EntryEvent, EntryEventType, GridValue, ObjectCategory, ObjectId};

use super::{read_lock, write_lock, GridCluster, Member};

type EntryEventHandler = Arc<dyn Fn(EntryEvent) + Send + Sync>;

struct EntryListenerReg {
    id: Uuid,
    handler: EntryEventHandler,
}

pub(crate) struct MapCore {
    name: String,
    entries: RwLock<HashMap<String, GridValue>>,
    listeners: RwLock<Vec<EntryListenerReg>>,
}

impl MapCore {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    fn dispatch(&self, event: EntryEvent) {
        let handlers: Vec<EntryEventHandler> = read_lock(&self.listeners)
            .iter()
            .map(|reg| Arc::clone(&reg.handler))
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

/// A member's handle onto a distributed key/value map.
///
/// The underlying entries are shared by every member of the cluster. Entry
/// listeners registered through any handle observe mutations performed by
/// every member, in mutation order.
#[derive(Clone)]
pub struct GridMap {
    cluster: GridCluster,
    core: Arc<MapCore>,
    member: Member,
}

impl GridMap {
    pub(crate) fn new(cluster: GridCluster, core: Arc<MapCore>, member: Member) -> Self {
        Self {
            cluster,
            core,
            member,
        }
    }

    /// Returns the map's name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Returns the map's cluster-wide identity.
    pub fn id(&self) -> ObjectId {
        ObjectId::new(ObjectCategory::Map, self.name())
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<GridValue> {
        read_lock(&self.core.entries).get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value if one existed.
    pub fn put(&self, key: impl Into<String>, value: GridValue) -> Option<GridValue> {
        let key = key.into();
        let old = write_lock(&self.core.entries).insert(key.clone(), value.clone());
        let event_type = if old.is_some() {
            EntryEventType::Updated
        } else {
            EntryEventType::Added
        };
        self.core.dispatch(EntryEvent::new(
            self.name(),
            key,
            Some(value),
            old.clone(),
            event_type,
            self.member.id(),
        ));
        old
    }

    /// Removes the entry under `key`, returning its value if one existed.
    pub fn remove(&self, key: &str) -> Option<GridValue> {
        let old = write_lock(&self.core.entries).remove(key);
        if let Some(ref old_value) = old {
            self.core.dispatch(EntryEvent::new(
                self.name(),
                key,
                None,
                Some(old_value.clone()),
                EntryEventType::Removed,
                self.member.id(),
            ));
        }
        old
    }

    /// Evicts the entry under `key` on the cache's own initiative.
    ///
    /// Fires an `Evicted` event rather than `Removed`, so listeners can tell
    /// cache-initiated removal apart from client calls.
    pub fn evict(&self, key: &str) -> Option<GridValue> {
        let old = write_lock(&self.core.entries).remove(key);
        if let Some(ref old_value) = old {
            self.core.dispatch(EntryEvent::new(
                self.name(),
                key,
                None,
                Some(old_value.clone()),
                EntryEventType::Evicted,
                self.member.id(),
            ));
        }
        old
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        read_lock(&self.core.entries).contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        read_lock(&self.core.entries).len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        read_lock(&self.core.entries).is_empty()
    }

    /// Returns a snapshot of the map's keys.
    pub fn keys(&self) -> Vec<String> {
        read_lock(&self.core.entries).keys().cloned().collect()
    }

    /// Returns a snapshot of the map's entries.
    pub fn entries(&self) -> Vec<(String, GridValue)> {
        read_lock(&self.core.entries)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Removes every entry. Fires no per-entry events.
    pub fn clear(&self) {
        write_lock(&self.core.entries).clear();
    }

    /// Registers a handler for entry events on this map.
    ///
    /// Returns a registration id accepted by
    /// [`remove_entry_listener`](Self::remove_entry_listener).
    pub fn add_entry_listener<F>(&self, handler: F) -> Uuid
    where
        F: Fn(EntryEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        write_lock(&self.core.listeners).push(EntryListenerReg {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Removes a previously registered entry listener.
    pub fn remove_entry_listener(&self, id: Uuid) -> bool {
        let mut listeners = write_lock(&self.core.listeners);
        let before = listeners.len();
        listeners.retain(|reg| reg.id != id);
        listeners.len() != before
    }

    /// Returns the number of registered entry listeners.
    pub fn listener_count(&self) -> usize {
        read_lock(&self.core.listeners).len()
    }

    /// Destroys the map cluster-wide, firing an object `Destroyed` event.
    pub fn destroy(&self) -> bool {
        self.cluster.destroy_object(&self.id(), self.member.id())
    }
}

impl fmt::Debug for GridMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridMap")
            .field("name", &self.core.name)
            .field("member", &self.member)
            .finish()
    }
}
