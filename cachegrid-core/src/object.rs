//! Identity of distributed objects managed by the grid.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The category of a distributed object.
///
/// Listener attachment is supported for maps, sets, lists, and queues.
/// Topics carry their own message listeners and cannot be targeted by the
/// cache listener registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    /// A distributed key/value map.
    Map,
    /// A distributed set.
    Set,
    /// A distributed list.
    List,
    /// A distributed FIFO queue.
    Queue,
    /// A distributed pub/sub topic.
    Topic,
}

impl ObjectCategory {
    /// Returns the uppercase name of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Map => "MAP",
            Self::Set => "SET",
            Self::List => "LIST",
            Self::Queue => "QUEUE",
            Self::Topic => "TOPIC",
        }
    }

    /// Returns `true` if objects of this category accept cache listeners.
    pub fn supports_listeners(&self) -> bool {
        !matches!(self, Self::Topic)
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories that accept cache listeners, in the order error messages cite them.
pub const LISTENER_CATEGORIES: [ObjectCategory; 4] = [
    ObjectCategory::List,
    ObjectCategory::Set,
    ObjectCategory::Queue,
    ObjectCategory::Map,
];

/// Category-qualified identity of a distributed object.
///
/// Object names are unique per category within a cluster; the qualified
/// rendering (`MAP:orders`) is unique cluster-wide and is the key under
/// which listener registrations are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    /// The object's category.
    pub category: ObjectCategory,
    /// The object's name within its category.
    pub name: String,
}

impl ObjectId {
    /// Creates a new object id.
    pub fn new(category: ObjectCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}
