//! A tagged handle over every distributed object category.

use std::fmt;

use cachegrid_core::{ObjectCategory, ObjectId};

use super::collection::{GridList, GridQueue, GridSet};
use super::map::GridMap;
use super::topic::GridTopic;

/// The collection categories a cache can hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// An ordered list that keeps duplicates.
    List,
    /// A deduplicating set.
    Set,
    /// A FIFO queue.
    Queue,
}

impl CollectionKind {
    /// Returns the uppercase name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "LIST",
            Self::Set => "SET",
            Self::Queue => "QUEUE",
        }
    }

    /// Returns the object category this kind maps onto.
    pub fn category(&self) -> ObjectCategory {
        match self {
            Self::List => ObjectCategory::List,
            Self::Set => ObjectCategory::Set,
            Self::Queue => ObjectCategory::Queue,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A substrate-managed distributed object of any category.
///
/// Holding one of these proves the target came from the grid, which is what
/// listener operations validate against. Dispatch over the category happens
/// here, in one place, instead of by inspecting handles at call sites.
#[derive(Clone)]
pub enum DistributedObject {
    /// A distributed map.
    Map(GridMap),
    /// A distributed set.
    Set(GridSet),
    /// A distributed list.
    List(GridList),
    /// A distributed queue.
    Queue(GridQueue),
    /// A distributed topic.
    Topic(GridTopic),
}

impl DistributedObject {
    /// Returns the object's cluster-wide identity.
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Map(map) => map.id(),
            Self::Set(set) => set.id(),
            Self::List(list) => list.id(),
            Self::Queue(queue) => queue.id(),
            Self::Topic(topic) => topic.id(),
        }
    }

    /// Returns the object's category.
    pub fn category(&self) -> ObjectCategory {
        self.id().category
    }

    /// Returns the object's name within its category.
    pub fn name(&self) -> String {
        self.id().name
    }

    /// Returns the map handle if this is a map.
    pub fn as_map(&self) -> Option<&GridMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the set handle if this is a set.
    pub fn as_set(&self) -> Option<&GridSet> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Returns the list handle if this is a list.
    pub fn as_list(&self) -> Option<&GridList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Returns the queue handle if this is a queue.
    pub fn as_queue(&self) -> Option<&GridQueue> {
        match self {
            Self::Queue(queue) => Some(queue),
            _ => None,
        }
    }

    /// Returns the topic handle if this is a topic.
    pub fn as_topic(&self) -> Option<&GridTopic> {
        match self {
            Self::Topic(topic) => Some(topic),
            _ => None,
        }
    }
}

impl fmt::Debug for DistributedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DistributedObject({})", self.id())
    }
}

impl From<GridMap> for DistributedObject {
    fn from(map: GridMap) -> Self {
        Self::Map(map)
    }
}

impl From<GridSet> for DistributedObject {
    fn from(set: GridSet) -> Self {
        Self::Set(set)
    }
}

impl From<GridList> for DistributedObject {
    fn from(list: GridList) -> Self {
        Self::List(list)
    }
}

impl From<GridQueue> for DistributedObject {
    fn from(queue: GridQueue) -> Self {
        Self::Queue(queue)
    }
}

impl From<GridTopic> for DistributedObject {
    fn from(topic: GridTopic) -> Self {
        Self::Topic(topic)
    }
}
