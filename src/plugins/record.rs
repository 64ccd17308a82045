//! Plugin records: a registered instance plus its metadata.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use super::descriptor::PluginDescriptor;

/// A plugin instance as held by the registry.
///
/// Identity is the name. Everything is fixed at construction except the
/// enabled flag.
pub struct PluginRecord<T: ?Sized> {
    descriptor: Arc<PluginDescriptor>,
    enabled: AtomicBool,
    instance: Arc<T>,
    configuration: HashMap<String, Value>,
}

impl<T: ?Sized> PluginRecord<T> {
    pub fn new(
        descriptor: Arc<PluginDescriptor>,
        instance: Arc<T>,
        configuration: HashMap<String, Value>,
    ) -> Self {
        let enabled = AtomicBool::new(descriptor.enabled_by_default);
        Self {
            descriptor,
            enabled,
            instance,
            configuration,
        }
    }

    /// Record with default descriptor values and no configuration.
    pub fn named(name: impl Into<String>, instance: Arc<T>) -> Self {
        Self::new(
            Arc::new(PluginDescriptor::new(name)),
            instance,
            HashMap::new(),
        )
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn configuration(&self) -> &HashMap<String, Value> {
        &self.configuration
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl<T: ?Sized> std::fmt::Debug for PluginRecord<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRecord")
            .field("name", &self.descriptor.name)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
