//! The uniform cache listener contract.
//!
//! One trait covers every event source: keyed map entries, keyless
//! collection items (delivered under [`COLLECTION_ITEM_KEY`]), and object
//! lifecycle events. The [`EventAdapter`](adapter::EventAdapter) translates
//! native event shapes into these callbacks.
//!
//! [`COLLECTION_ITEM_KEY`]: cachegrid_core::COLLECTION_ITEM_KEY

pub mod adapter;

use std::sync::Arc;

use cachegrid_core::GridValue;

/// A listener for cache mutations.
///
/// Every listener carries a cluster-unique string id; registries and
/// adapters identify listeners solely by it, never by object reference.
/// All callbacks have default empty implementations.
///
/// # Example
///
/// ```ignore
/// struct Auditor;
///
/// impl CacheListener for Auditor {
///     fn id(&self) -> &str {
///         "auditor"
///     }
///
///     fn on_put(&self, key: &str, value: &GridValue) {
///         println!("put: {} -> {}", key, value);
///     }
/// }
/// ```
pub trait CacheListener: Send + Sync {
    /// Returns this listener's cluster-unique id.
    fn id(&self) -> &str;

    /// Called when an entry or item is added.
    fn on_put(&self, key: &str, value: &GridValue) {
        let _ = (key, value);
    }

    /// Called when an existing entry is overwritten.
    fn on_update(&self, key: &str, value: &GridValue, old_value: Option<&GridValue>) {
        let _ = (key, value, old_value);
    }

    /// Called when an entry or item is removed by a client call.
    fn on_remove(&self, key: &str, old_value: Option<&GridValue>) {
        let _ = (key, old_value);
    }

    /// Called when an entry is evicted by the cache itself rather than a
    /// client call.
    fn on_evict(&self, key: &str, old_value: Option<&GridValue>) {
        let _ = (key, old_value);
    }
}

/// A shared, type-erased cache listener.
pub type SharedCacheListener = Arc<dyn CacheListener>;

type PutHandler = Box<dyn Fn(&str, &GridValue) + Send + Sync>;
type UpdateHandler = Box<dyn Fn(&str, &GridValue, Option<&GridValue>) + Send + Sync>;
type RemoveHandler = Box<dyn Fn(&str, Option<&GridValue>) + Send + Sync>;

/// A cache listener implementation using closures.
///
/// Use [`FnCacheListener::builder`] to create one.
pub struct FnCacheListener {
    id: String,
    on_put: Option<PutHandler>,
    on_update: Option<UpdateHandler>,
    on_remove: Option<RemoveHandler>,
    on_evict: Option<RemoveHandler>,
}

impl FnCacheListener {
    /// Creates a new builder with the given listener id.
    pub fn builder(id: impl Into<String>) -> FnCacheListenerBuilder {
        FnCacheListenerBuilder {
            id: id.into(),
            on_put: None,
            on_update: None,
            on_remove: None,
            on_evict: None,
        }
    }
}

impl CacheListener for FnCacheListener {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_put(&self, key: &str, value: &GridValue) {
        if let Some(ref f) = self.on_put {
            f(key, value);
        }
    }

    fn on_update(&self, key: &str, value: &GridValue, old_value: Option<&GridValue>) {
        if let Some(ref f) = self.on_update {
            f(key, value, old_value);
        }
    }

    fn on_remove(&self, key: &str, old_value: Option<&GridValue>) {
        if let Some(ref f) = self.on_remove {
            f(key, old_value);
        }
    }

    fn on_evict(&self, key: &str, old_value: Option<&GridValue>) {
        if let Some(ref f) = self.on_evict {
            f(key, old_value);
        }
    }
}

impl std::fmt::Debug for FnCacheListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCacheListener")
            .field("id", &self.id)
            .field("on_put", &self.on_put.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}

/// Builder for [`FnCacheListener`] instances.
pub struct FnCacheListenerBuilder {
    id: String,
    on_put: Option<PutHandler>,
    on_update: Option<UpdateHandler>,
    on_remove: Option<RemoveHandler>,
    on_evict: Option<RemoveHandler>,
}

impl FnCacheListenerBuilder {
    /// Sets the handler for put events.
    pub fn on_put<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &GridValue) + Send + Sync + 'static,
    {
        self.on_put = Some(Box::new(f));
        self
    }

    /// Sets the handler for update events.
    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &GridValue, Option<&GridValue>) + Send + Sync + 'static,
    {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Sets the handler for remove events.
    pub fn on_remove<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<&GridValue>) + Send + Sync + 'static,
    {
        self.on_remove = Some(Box::new(f));
        self
    }

    /// Sets the handler for evict events.
    pub fn on_evict<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<&GridValue>) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(f));
        self
    }

    /// Builds the [`FnCacheListener`].
    pub fn build(self) -> FnCacheListener {
        FnCacheListener {
            id: self.id,
            on_put: self.on_put,
            on_update: self.on_update,
            on_remove: self.on_remove,
            on_evict: self.on_evict,
        }
    }
}

impl std::fmt::Debug for FnCacheListenerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCacheListenerBuilder")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_listener_trait_is_object_safe() {
        struct TestListener;
        impl CacheListener for TestListener {
            fn id(&self) -> &str {
                "test"
            }
        }

        let listener: SharedCacheListener = Arc::new(TestListener);
        assert_eq!(listener.id(), "test");
    }

    #[test]
    fn test_default_callbacks_do_nothing() {
        struct EmptyListener;
        impl CacheListener for EmptyListener {
            fn id(&self) -> &str {
                "empty"
            }
        }

        let listener = EmptyListener;
        let value = GridValue::from("v");
        listener.on_put("k", &value);
        listener.on_update("k", &value, None);
        listener.on_remove("k", Some(&value));
        listener.on_evict("k", None);
    }

    #[test]
    fn test_fn_listener_builder() {
        let puts = Arc::new(AtomicU32::new(0));
        let puts_clone = Arc::clone(&puts);
        let listener = FnCacheListener::builder("counter")
            .on_put(move |_, _| {
                puts_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        assert_eq!(listener.id(), "counter");
        listener.on_put("k", &GridValue::from(1));
        listener.on_put("k", &GridValue::from(2));
        listener.on_remove("k", None); // no handler installed
        assert_eq!(puts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fn_listener_debug() {
        let listener = FnCacheListener::builder("x").on_put(|_, _| {}).build();
        let rendered = format!("{:?}", listener);
        assert!(rendered.contains("\"x\""));
        assert!(rendered.contains("on_put: true"));
        assert!(rendered.contains("on_remove: false"));
    }

    #[test]
    fn test_fn_listener_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FnCacheListener>();
    }
}
