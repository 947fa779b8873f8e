//! Adapter translating native grid events into the cache listener contract.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use cachegrid_core::{
    CacheError, EntryEvent, EntryEventType, GridValue, ItemEvent, ItemEventType, NativeEvent,
    ObjectEventType, Result, COLLECTION_ITEM_KEY,
};

use super::SharedCacheListener;

type KeyConverter = Box<dyn Fn(&str) -> String + Send + Sync>;
type ValueConverter = Box<dyn Fn(GridValue) -> Result<GridValue> + Send + Sync>;

/// Wraps one cache listener and feeds it normalized events.
///
/// Three native shapes arrive here: keyed entry events pass straight
/// through; keyless item events are delivered under
/// [`COLLECTION_ITEM_KEY`]; object lifecycle events go through two
/// conversion points (object id to key, native value to value), both
/// identity by default.
///
/// Two adapters are equal exactly when their wrapped listeners' ids are
/// equal, regardless of listener instance, so registries can deduplicate
/// across re-wrapping.
pub struct EventAdapter {
    listener: SharedCacheListener,
    key_converter: Option<KeyConverter>,
    value_converter: Option<ValueConverter>,
    log_events: bool,
}

impl EventAdapter {
    /// Wraps a listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's id is empty.
    pub fn new(listener: SharedCacheListener) -> Result<Self> {
        if listener.id().is_empty() {
            return Err(CacheError::Listener(
                "listener id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            listener,
            key_converter: None,
            value_converter: None,
            log_events: false,
        })
    }

    /// Replaces the identity conversion from object ids to listener keys.
    pub fn with_key_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.key_converter = Some(Box::new(f));
        self
    }

    /// Replaces the identity conversion from native lifecycle values.
    ///
    /// A converter that fails stops delivery of that event; the failure is
    /// logged and the listener is not invoked.
    pub fn with_value_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(GridValue) -> Result<GridValue> + Send + Sync + 'static,
    {
        self.value_converter = Some(Box::new(f));
        self
    }

    /// Enables or disables per-event debug logging.
    pub fn with_event_logging(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Returns the wrapped listener's id.
    pub fn id(&self) -> &str {
        self.listener.id()
    }

    /// Returns the wrapped listener.
    pub fn listener(&self) -> &SharedCacheListener {
        &self.listener
    }

    /// Dispatches one native event to the wrapped listener.
    pub fn handle(&self, event: NativeEvent) {
        if self.log_events {
            tracing::debug!(listener = %self.id(), event = %event.label(), "dispatching event");
        }
        match event {
            NativeEvent::Entry(entry) => self.handle_entry(entry),
            NativeEvent::Item(item) => self.handle_item(item),
            NativeEvent::Object(object) => {
                let key = match self.key_converter {
                    Some(ref convert) => convert(&object.object.to_string()),
                    None => object.object.to_string(),
                };
                let native = GridValue::String(object.object.name.clone());
                let value = match self.value_converter {
                    Some(ref convert) => match convert(native) {
                        Ok(value) => value,
                        Err(error) => {
                            tracing::error!(
                                listener = %self.id(),
                                object = %object.object,
                                %error,
                                "lifecycle value conversion failed; event dropped"
                            );
                            return;
                        }
                    },
                    None => native,
                };
                match object.event_type {
                    ObjectEventType::Created => self.listener.on_put(&key, &value),
                    ObjectEventType::Destroyed => self.listener.on_remove(&key, Some(&value)),
                }
            }
        }
    }

    fn handle_entry(&self, event: EntryEvent) {
        let value = event.value.unwrap_or(GridValue::Null);
        match event.event_type {
            EntryEventType::Added => self.listener.on_put(&event.key, &value),
            EntryEventType::Updated => {
                self.listener
                    .on_update(&event.key, &value, event.old_value.as_ref())
            }
            EntryEventType::Removed => self.listener.on_remove(&event.key, event.old_value.as_ref()),
            EntryEventType::Evicted => self.listener.on_evict(&event.key, event.old_value.as_ref()),
        }
    }

    fn handle_item(&self, event: ItemEvent) {
        match event.event_type {
            ItemEventType::Added => self.listener.on_put(COLLECTION_ITEM_KEY, &event.item),
            ItemEventType::Removed => self
                .listener
                .on_remove(COLLECTION_ITEM_KEY, Some(&event.item)),
        }
    }
}

impl PartialEq for EventAdapter {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for EventAdapter {}

impl Hash for EventAdapter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for EventAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventAdapter")
            .field("listener", &self.id())
            .field("log_events", &self.log_events)
            .finish()
    }
}

/// Convenience constructor wrapping an owned listener.
pub fn adapt<L: super::CacheListener + 'static>(listener: L) -> Result<EventAdapter> {
    EventAdapter::new(Arc::new(listener))
}
