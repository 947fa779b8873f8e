//! Cache facade configuration types and builder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cachegrid_core::{CacheError, Result};

/// Default instance name.
const DEFAULT_INSTANCE_NAME: &str = "cachegrid-node";
/// Default name of the shared top-level data map.
const DEFAULT_DATA_MAP_NAME: &str = "cache:data";
/// Default name of the replicated listener registry map.
const DEFAULT_REGISTRY_MAP_NAME: &str = "cache:listener-registry";
/// Default name of the admin broadcast topic.
const DEFAULT_ADMIN_TOPIC_NAME: &str = "cache:admin";
/// Default propagation grace interval after publishing an admin message.
const DEFAULT_PROPAGATION_GRACE: Duration = Duration::from_millis(250);

type RollbackHook = Arc<dyn Fn() + Send + Sync>;

/// Configuration for a [`ClusterCache`](crate::cache::ClusterCache).
#[derive(Clone)]
pub struct CacheConfig {
    instance_name: String,
    data_map_name: String,
    registry_map_name: String,
    admin_topic_name: String,
    propagation_grace: Duration,
    log_events: bool,
    rollback_hook: Option<RollbackHook>,
}

impl CacheConfig {
    /// Creates a new builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Returns the instance name used when joining the cluster.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Returns the name of the shared top-level data map.
    pub fn data_map_name(&self) -> &str {
        &self.data_map_name
    }

    /// Returns the name of the replicated listener registry map.
    pub fn registry_map_name(&self) -> &str {
        &self.registry_map_name
    }

    /// Returns the name of the admin broadcast topic.
    pub fn admin_topic_name(&self) -> &str {
        &self.admin_topic_name
    }

    /// Returns the propagation grace interval.
    pub fn propagation_grace(&self) -> Duration {
        self.propagation_grace
    }

    /// Returns whether adapters log every dispatched event.
    pub fn log_events(&self) -> bool {
        self.log_events
    }

    /// Returns the rollback hook, if one is configured.
    pub fn rollback_hook(&self) -> Option<&RollbackHook> {
        self.rollback_hook.as_ref()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            data_map_name: DEFAULT_DATA_MAP_NAME.to_string(),
            registry_map_name: DEFAULT_REGISTRY_MAP_NAME.to_string(),
            admin_topic_name: DEFAULT_ADMIN_TOPIC_NAME.to_string(),
            propagation_grace: DEFAULT_PROPAGATION_GRACE,
            log_events: false,
            rollback_hook: None,
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("instance_name", &self.instance_name)
            .field("data_map_name", &self.data_map_name)
            .field("registry_map_name", &self.registry_map_name)
            .field("admin_topic_name", &self.admin_topic_name)
            .field("propagation_grace", &self.propagation_grace)
            .field("log_events", &self.log_events)
            .field("rollback_hook", &self.rollback_hook.is_some())
            .finish()
    }
}

/// Builder for [`CacheConfig`].
#[derive(Default)]
pub struct CacheConfigBuilder {
    instance_name: Option<String>,
    data_map_name: Option<String>,
    registry_map_name: Option<String>,
    admin_topic_name: Option<String>,
    propagation_grace: Option<Duration>,
    log_events: bool,
    rollback_hook: Option<RollbackHook>,
}

impl CacheConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance name used when joining the cluster.
    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = Some(name.into());
        self
    }

    /// Sets the name of the shared top-level data map.
    pub fn data_map_name(mut self, name: impl Into<String>) -> Self {
        self.data_map_name = Some(name.into());
        self
    }

    /// Sets the name of the replicated listener registry map.
    pub fn registry_map_name(mut self, name: impl Into<String>) -> Self {
        self.registry_map_name = Some(name.into());
        self
    }

    /// Sets the name of the admin broadcast topic.
    pub fn admin_topic_name(mut self, name: impl Into<String>) -> Self {
        self.admin_topic_name = Some(name.into());
        self
    }

    /// Sets the propagation grace interval.
    pub fn propagation_grace(mut self, grace: Duration) -> Self {
        self.propagation_grace = Some(grace);
        self
    }

    /// Enables per-event debug logging on adapters.
    pub fn log_events(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Installs a hook invoked after a failed attach has been rolled back.
    pub fn rollback_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.rollback_hook = Some(Arc::new(hook));
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any name is empty, or if the data map and the
    /// registry map share a name.
    pub fn build(self) -> Result<CacheConfig> {
        let defaults = CacheConfig::default();
        let config = CacheConfig {
            instance_name: self.instance_name.unwrap_or(defaults.instance_name),
            data_map_name: self.data_map_name.unwrap_or(defaults.data_map_name),
            registry_map_name: self.registry_map_name.unwrap_or(defaults.registry_map_name),
            admin_topic_name: self.admin_topic_name.unwrap_or(defaults.admin_topic_name),
            propagation_grace: self.propagation_grace.unwrap_or(defaults.propagation_grace),
            log_events: self.log_events,
            rollback_hook: self.rollback_hook,
        };

        if config.instance_name.is_empty() {
            return Err(CacheError::Configuration(
                "instance name must not be empty".to_string(),
            ));
        }
        if config.data_map_name.is_empty()
            || config.registry_map_name.is_empty()
            || config.admin_topic_name.is_empty()
        {
            return Err(CacheError::Configuration(
                "map and topic names must not be empty".to_string(),
            ));
        }
        if config.data_map_name == config.registry_map_name {
            return Err(CacheError::Configuration(format!(
                "data map and registry map must use distinct names, both are '{}'",
                config.data_map_name
            )));
        }

        Ok(config)
    }
}

impl fmt::Debug for CacheConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfigBuilder").finish()
    }
}
