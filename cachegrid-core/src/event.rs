//! Native event model for grid data structures.
//!
//! Three event shapes exist: keyed entry events from maps, keyless item
//! events from collections, and object lifecycle events from the cluster.
//! [`NativeEvent`] closes the set so dispatch happens once, at the adapter
//! boundary, instead of by downcasting at every call site.

use std::fmt;

use uuid::Uuid;

use crate::object::ObjectId;
use crate::value::GridValue;

/// Placeholder key delivered with events from keyless collections.
///
/// Sets, lists, and queues fire item events that carry no key. Listeners
/// still receive a `(key, value)` pair; for those events the key is always
/// this constant, never the item itself and never empty.
pub const COLLECTION_ITEM_KEY: &str = "__collection_item__";

/// Type of entry event fired by map mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryEventType {
    /// A new entry was added.
    Added,
    /// An existing entry was overwritten.
    Updated,
    /// An entry was removed by a client call.
    Removed,
    /// An entry was evicted by the cache itself.
    Evicted,
}

impl EntryEventType {
    /// Returns the uppercase name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Updated => "UPDATED",
            Self::Removed => "REMOVED",
            Self::Evicted => "EVICTED",
        }
    }
}

impl fmt::Display for EntryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event fired when a map entry is added, updated, removed, or evicted.
#[derive(Debug, Clone)]
pub struct EntryEvent {
    /// Name of the map that fired the event.
    pub name: String,
    /// The affected key.
    pub key: String,
    /// The entry's new value; absent for removals and evictions.
    pub value: Option<GridValue>,
    /// The entry's previous value, when one existed.
    pub old_value: Option<GridValue>,
    /// The type of mutation.
    pub event_type: EntryEventType,
    /// Id of the cluster member that performed the mutation.
    pub member: Uuid,
}

impl EntryEvent {
    /// Creates a new entry event.
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        value: Option<GridValue>,
        old_value: Option<GridValue>,
        event_type: EntryEventType,
        member: Uuid,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value,
            old_value,
            event_type,
            member,
        }
    }
}

/// Type of item event fired by collection mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemEventType {
    /// An item was added to the collection.
    Added,
    /// An item was removed from the collection.
    Removed,
}

impl ItemEventType {
    /// Returns the uppercase name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for ItemEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event fired when an item is added to or removed from a collection.
#[derive(Debug, Clone)]
pub struct ItemEvent {
    /// Name of the collection that fired the event.
    pub name: String,
    /// The item that was added or removed.
    pub item: GridValue,
    /// The type of mutation.
    pub event_type: ItemEventType,
    /// Id of the cluster member that performed the mutation.
    pub member: Uuid,
}

impl ItemEvent {
    /// Creates a new item event.
    pub fn new(
        name: impl Into<String>,
        item: GridValue,
        event_type: ItemEventType,
        member: Uuid,
    ) -> Self {
        Self {
            name: name.into(),
            item,
            event_type,
            member,
        }
    }
}

/// Type of object lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectEventType {
    /// A distributed object came into existence.
    Created,
    /// A distributed object was destroyed.
    Destroyed,
}

impl ObjectEventType {
    /// Returns the uppercase name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Destroyed => "DESTROYED",
        }
    }
}

impl fmt::Display for ObjectEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event fired when a distributed object is created or destroyed.
#[derive(Debug, Clone)]
pub struct DistributedObjectEvent {
    /// Identity of the affected object.
    pub object: ObjectId,
    /// Whether the object was created or destroyed.
    pub event_type: ObjectEventType,
    /// Id of the cluster member that triggered the event.
    pub member: Uuid,
}

impl DistributedObjectEvent {
    /// Creates a new object lifecycle event.
    pub fn new(object: ObjectId, event_type: ObjectEventType, member: Uuid) -> Self {
        Self {
            object,
            event_type,
            member,
        }
    }
}

/// The closed set of native event shapes delivered to adapters.
#[derive(Debug, Clone)]
pub enum NativeEvent {
    /// A keyed entry event from a map.
    Entry(EntryEvent),
    /// A keyless item event from a collection.
    Item(ItemEvent),
    /// An object lifecycle event from the cluster.
    Object(DistributedObjectEvent),
}

impl NativeEvent {
    /// Returns a short label for this event, for logging.
    pub fn label(&self) -> String {
        match self {
            Self::Entry(e) => format!("entry {} on '{}'", e.event_type, e.name),
            Self::Item(e) => format!("item {} on '{}'", e.event_type, e.name),
            Self::Object(e) => format!("object {} for '{}'", e.event_type, e.object),
        }
    }
}
