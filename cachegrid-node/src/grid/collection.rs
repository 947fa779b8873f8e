//! Distributed collection handles: sets, lists, and queues.
//!
//! Collections share one core: an ordered item store with item listeners.
//! The handle types differ only in the mutation surface they expose (set
//! semantics deduplicate, queues are FIFO).

use std::fmt;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use cachegrid_core::{GridValue, ItemEvent, ItemEventType, ObjectCategory, ObjectId};

use super::{read_lock, write_lock, GridCluster, Member};

type ItemEventHandler = Arc<dyn Fn(ItemEvent) + Send + Sync>;

struct ItemListenerReg {
    id: Uuid,
    handler: ItemEventHandler,
}

pub(crate) struct CollectionCore {
    name: String,
    category: ObjectCategory,
    items: RwLock<Vec<GridValue>>,
    listeners: RwLock<Vec<ItemListenerReg>>,
}

impl CollectionCore {
    pub(crate) fn new(name: &str, category: ObjectCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            items: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    fn dispatch(&self, item: GridValue, event_type: ItemEventType, member: Uuid) {
        let event = ItemEvent::new(self.name.clone(), item, event_type, member);
        let handlers: Vec<ItemEventHandler> = read_lock(&self.listeners)
            .iter()
            .map(|reg| Arc::clone(&reg.handler))
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    fn add(&self, item: GridValue, deduplicate: bool, member: Uuid) -> bool {
        {
            let mut items = write_lock(&self.items);
            if deduplicate && items.contains(&item) {
                return false;
            }
            items.push(item.clone());
        }
        self.dispatch(item, ItemEventType::Added, member);
        true
    }

    fn remove(&self, item: &GridValue, member: Uuid) -> bool {
        let removed = {
            let mut items = write_lock(&self.items);
            match items.iter().position(|existing| existing == item) {
                Some(index) => {
                    items.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.dispatch(item.clone(), ItemEventType::Removed, member);
        }
        removed
    }

    fn poll(&self, member: Uuid) -> Option<GridValue> {
        let item = {
            let mut items = write_lock(&self.items);
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        if let Some(ref polled) = item {
            self.dispatch(polled.clone(), ItemEventType::Removed, member);
        }
        item
    }

    fn contains(&self, item: &GridValue) -> bool {
        read_lock(&self.items).contains(item)
    }

    fn len(&self) -> usize {
        read_lock(&self.items).len()
    }

    fn snapshot(&self) -> Vec<GridValue> {
        read_lock(&self.items).clone()
    }

    fn clear(&self) {
        write_lock(&self.items).clear();
    }

    fn add_listener(&self, handler: ItemEventHandler) -> Uuid {
        let id = Uuid::new_v4();
        write_lock(&self.listeners).push(ItemListenerReg { id, handler });
        id
    }

    fn remove_listener(&self, id: Uuid) -> bool {
        let mut listeners = write_lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|reg| reg.id != id);
        listeners.len() != before
    }
}

macro_rules! collection_handle {
    ($(#[$doc:meta])* $handle:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $handle {
            cluster: GridCluster,
            core: Arc<CollectionCore>,
            member: Member,
        }

        impl $handle {
            pub(crate) fn new(
                cluster: GridCluster,
                core: Arc<CollectionCore>,
                member: Member,
            ) -> Self {
                Self {
                    cluster,
                    core,
                    member,
                }
            }

            /// Returns the collection's name.
            pub fn name(&self) -> &str {
                &self.core.name
            }

            /// Returns the collection's cluster-wide identity.
            pub fn id(&self) -> ObjectId {
                ObjectId::new(self.core.category, self.name())
            }

            /// Returns `true` if the collection contains `item`.
            pub fn contains(&self, item: &GridValue) -> bool {
                self.core.contains(item)
            }

            /// Returns the number of items.
            pub fn len(&self) -> usize {
                self.core.len()
            }

            /// Returns `true` if the collection has no items.
            pub fn is_empty(&self) -> bool {
                self.core.len() == 0
            }

            /// Returns a snapshot of the items in storage order.
            pub fn items(&self) -> Vec<GridValue> {
                self.core.snapshot()
            }

            /// Removes every item. Fires no per-item events.
            pub fn clear(&self) {
                self.core.clear();
            }

            /// Registers a handler for item events on this collection.
            ///
            /// Returns a registration id accepted by
            /// [`remove_item_listener`](Self::remove_item_listener).
            pub fn add_item_listener<F>(&self, handler: F) -> Uuid
            where
                F: Fn(ItemEvent) + Send + Sync + 'static,
            {
                self.core.add_listener(Arc::new(handler))
            }

            /// Removes a previously registered item listener.
            pub fn remove_item_listener(&self, id: Uuid) -> bool {
                self.core.remove_listener(id)
            }

            /// Destroys the collection cluster-wide, firing an object
            /// `Destroyed` event.
            pub fn destroy(&self) -> bool {
                self.cluster.destroy_object(&self.id(), self.member.id())
            }
        }

        impl fmt::Debug for $handle {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($handle))
                    .field("name", &self.core.name)
                    .field("member", &self.member)
                    .finish()
            }
        }
    };
}

collection_handle!(
    /// A member's handle onto a distributed set.
    GridSet
);

collection_handle!(
    /// A member's handle onto a distributed list.
    GridList
);

collection_handle!(
    /// A member's handle onto a distributed FIFO queue.
    GridQueue
);

impl GridSet {
    /// Adds `item` to the set. Returns `false` if it was already present.
    pub fn add(&self, item: GridValue) -> bool {
        self.core.add(item, true, self.member.id())
    }

    /// Removes `item` from the set. Returns `false` if it was absent.
    pub fn remove(&self, item: &GridValue) -> bool {
        self.core.remove(item, self.member.id())
    }
}

impl GridList {
    /// Appends `item` to the list.
    pub fn add(&self, item: GridValue) {
        self.core.add(item, false, self.member.id());
    }

    /// Removes the first occurrence of `item`. Returns `false` if absent.
    pub fn remove(&self, item: &GridValue) -> bool {
        self.core.remove(item, self.member.id())
    }
}

impl GridQueue {
    /// Appends `item` to the tail of the queue.
    pub fn offer(&self, item: GridValue) {
        self.core.add(item, false, self.member.id());
    }

    /// Removes and returns the head of the queue, if any.
    pub fn poll(&self) -> Option<GridValue> {
        self.core.poll(self.member.id())
    }

    /// Returns the head of the queue without removing it.
    pub fn peek(&self) -> Option<GridValue> {
        read_lock(&self.core.items).first().cloned()
    }

    /// Removes the first occurrence of `item`. Returns `false` if absent.
    pub fn remove(&self, item: &GridValue) -> bool {
        self.core.remove(item, self.member.id())
    }
}
