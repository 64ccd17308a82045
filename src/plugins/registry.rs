//! Plugin registry.
//!
//! # Responsibilities
//! - Hold every registered plugin, filed once per capability it provides
//! - Build and bind a pipeline for each registered service
//! - Resolve request paths to pipelines
//!
//! # Design Decisions
//! - Dispatch reads are lock-free snapshots (`PathTable`, `ArcSwap`);
//!   writers are serialized by one registration mutex that requests never
//!   touch
//! - A request keeps the pipeline it resolved even if the path is rebound
//!   while it runs
//! - The registry is an ordinary value passed around as `Arc`; there is no
//!   global instance
//!
//! # Service slot states
//! ```text
//! unregistered → registering → bound → unregistering → unregistered
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use super::capabilities::{Initializer, Interceptor, Plugin, Service};
use super::descriptor::{InitPoint, PluginDescriptor};
use super::record::PluginRecord;
use crate::config::PluginConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::pipeline::{
    InterceptorEntry, InterceptorTable, Pipeline, PipelineBuilder, PipelineInfo, PipelineSettings,
};
use crate::routing::{Bound, MatchPolicy, PathTable};
use crate::security::{
    AuthMechanism, Authenticator, Authorizer, SecurityPredicate, SecurityTables, TokenManager,
};

/// A pipeline bound to a path.
pub type Binding = Bound<Arc<Pipeline>>;

/// Lifecycle state of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Registering,
    Bound,
    Unregistering,
}

struct ServiceEntry {
    record: Arc<PluginRecord<dyn Service>>,
    info: Arc<PipelineInfo>,
    state: SlotState,
}

/// Listing entry for a live service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub description: String,
    pub uri: String,
    pub match_policy: MatchPolicy,
    pub secured: bool,
    pub enabled: bool,
    pub state: SlotState,
}

/// Listing entry for a registered interceptor.
#[derive(Debug, Clone, Serialize)]
pub struct InterceptorSummary {
    pub name: String,
    pub point: String,
    pub priority: i32,
    pub requires_content: bool,
    pub enabled: bool,
}

impl From<&InterceptorEntry> for InterceptorSummary {
    fn from(entry: &InterceptorEntry) -> Self {
        Self {
            name: entry.name().to_string(),
            point: entry.meta.point.to_string(),
            priority: entry.meta.priority,
            requires_content: entry.meta.requires_content,
            enabled: entry.record.is_enabled(),
        }
    }
}

/// Process-wide store of plugins and path bindings.
pub struct PluginRegistry {
    builder: PipelineBuilder,
    plugin_config: BTreeMap<String, PluginConfig>,
    paths: PathTable<Arc<Pipeline>>,
    services: DashMap<String, ServiceEntry>,
    interceptors: Arc<InterceptorTable>,
    security: Arc<SecurityTables>,
    authenticators: DashMap<String, Arc<PluginRecord<dyn Authenticator>>>,
    initializers: ArcSwap<Vec<Arc<PluginRecord<dyn Initializer>>>>,
    writer: Mutex<()>,
}

impl PluginRegistry {
    pub fn new(settings: PipelineSettings, plugin_config: BTreeMap<String, PluginConfig>) -> Self {
        let interceptors = Arc::new(InterceptorTable::new());
        let security = Arc::new(SecurityTables::default());
        Self {
            builder: PipelineBuilder::new(settings, interceptors.clone(), security.clone()),
            plugin_config,
            paths: PathTable::new(),
            services: DashMap::new(),
            interceptors,
            security,
            authenticators: DashMap::new(),
            initializers: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        self.builder.settings()
    }

    /// Configuration overrides for the plugin called `name`.
    pub fn plugin_config(&self, name: &str) -> Option<&PluginConfig> {
        self.plugin_config.get(name)
    }

    /// Register a plugin under every capability it provides.
    ///
    /// Configuration may disable the plugin, move a service to another URI
    /// or change whether it is secured.
    pub fn register_plugin(
        &self,
        descriptor: PluginDescriptor,
        plugin: Arc<dyn Plugin>,
    ) -> Result<(), GatewayError> {
        descriptor.validate()?;

        let overrides = self
            .plugin_config
            .get(&descriptor.name)
            .cloned()
            .unwrap_or_default();
        if !overrides.enabled.unwrap_or(descriptor.enabled_by_default) {
            tracing::info!(plugin = %descriptor.name, "Plugin disabled, not registered");
            return Ok(());
        }

        let descriptor = Arc::new(descriptor);
        let configuration = overrides.extra.clone();
        let mut provided = 0;

        // The fallible capabilities go first, so a rejected plugin leaves
        // nothing registered.
        let mut interceptor_added = false;
        if let Some(interceptor) = plugin.clone().as_interceptor() {
            self.register_interceptor(enabled_record(&descriptor, interceptor, &configuration))?;
            interceptor_added = true;
            provided += 1;
        }
        if let Some(service) = plugin.clone().as_service() {
            let record = enabled_record(&descriptor, service, &configuration);
            let uri = overrides
                .uri
                .clone()
                .unwrap_or_else(|| descriptor.default_uri());
            let secured = overrides.secured.unwrap_or(descriptor.secured);
            if let Err(e) = self.register_service(record, &uri, descriptor.match_policy, secured) {
                if interceptor_added {
                    self.unregister_interceptor(&descriptor.name);
                }
                return Err(e);
            }
            provided += 1;
        }
        if let Some(initializer) = plugin.clone().as_initializer() {
            self.register_initializer(enabled_record(&descriptor, initializer, &configuration));
            provided += 1;
        }
        if let Some(mechanism) = plugin.clone().as_auth_mechanism() {
            self.register_auth_mechanism(enabled_record(&descriptor, mechanism, &configuration));
            provided += 1;
        }
        if let Some(authenticator) = plugin.clone().as_authenticator() {
            self.register_authenticator(enabled_record(&descriptor, authenticator, &configuration));
            provided += 1;
        }
        if let Some(authorizer) = plugin.clone().as_authorizer() {
            self.register_authorizer(enabled_record(&descriptor, authorizer, &configuration));
            provided += 1;
        }
        if let Some(tokens) = plugin.as_token_manager() {
            self.set_token_manager(Some(tokens));
            provided += 1;
        }

        if provided == 0 {
            return Err(GatewayError::Config(format!(
                "plugin '{}' provides no capability",
                descriptor.name
            )));
        }

        tracing::info!(plugin = %descriptor.name, capabilities = provided, "Plugin registered");
        Ok(())
    }

    /// Build a pipeline for `record` and bind it at (uri, policy).
    ///
    /// Registering the same service at the same URI rebuilds its pipeline.
    /// A service name can only be live at one binding.
    pub fn register_service(
        &self,
        record: Arc<PluginRecord<dyn Service>>,
        uri: &str,
        policy: MatchPolicy,
        secured: bool,
    ) -> Result<Arc<PipelineInfo>, GatewayError> {
        record.descriptor().validate()?;
        if !uri.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "URI '{}' of service '{}' must start with '/'",
                uri,
                record.name()
            )));
        }

        let _guard = self.lock();
        let name = record.name().to_string();

        if let Some(existing) = self.services.get(&name) {
            let same_slot = existing.info.path == crate::routing::matcher::normalize(uri)
                && existing.info.match_policy == policy;
            if !same_slot {
                return Err(GatewayError::Config(format!(
                    "service '{}' is already bound at {} ({})",
                    name, existing.info.path, existing.info.match_policy
                )));
            }
        }

        let pipeline = Arc::new(self.builder.build(record.clone(), uri, policy, secured));
        let info = pipeline.info().clone();
        self.services.insert(
            name.clone(),
            ServiceEntry {
                record,
                info: info.clone(),
                state: SlotState::Registering,
            },
        );

        if let Some(displaced) = self.paths.bind(&info.path, policy, pipeline) {
            let displaced_name = &displaced.value.info().service_name;
            if *displaced_name != name {
                tracing::warn!(
                    path = %info.path,
                    displaced = %displaced_name,
                    service = %name,
                    "Binding replaced another service"
                );
                self.services.remove(displaced_name);
            }
        }

        if let Some(mut entry) = self.services.get_mut(&name) {
            entry.state = SlotState::Bound;
        }
        metrics::record_bound_paths(self.paths.len());

        tracing::info!(
            service = %name,
            path = %info.path,
            policy = %policy,
            secured,
            "Service bound"
        );
        Ok(info)
    }

    /// Remove the service bound at exactly (uri, policy). No-op if absent.
    pub fn unregister_service(&self, uri: &str, policy: MatchPolicy) -> Option<Arc<PipelineInfo>> {
        let _guard = self.lock();
        self.unbind_locked(uri, policy, None)
    }

    /// Remove the service bound at (uri, policy) only while that slot still
    /// holds the service called `name`.
    pub fn unregister_service_owned(
        &self,
        uri: &str,
        policy: MatchPolicy,
        name: &str,
    ) -> Option<Arc<PipelineInfo>> {
        let _guard = self.lock();
        self.unbind_locked(uri, policy, Some(name))
    }

    /// Remove a service by name, wherever it is bound.
    pub fn unregister_service_named(&self, name: &str) -> Option<Arc<PipelineInfo>> {
        let _guard = self.lock();
        let (path, policy) = {
            let entry = self.services.get(name)?;
            (entry.info.path.clone(), entry.info.match_policy)
        };
        self.unbind_locked(&path, policy, Some(name))
    }

    fn unbind_locked(
        &self,
        uri: &str,
        policy: MatchPolicy,
        owner: Option<&str>,
    ) -> Option<Arc<PipelineInfo>> {
        let bound = self.paths.get(uri, policy)?;
        let info = bound.value.info().clone();
        if owner.is_some_and(|name| name != info.service_name) {
            return None;
        }

        if let Some(mut entry) = self.services.get_mut(&info.service_name) {
            entry.state = SlotState::Unregistering;
        }
        self.services.remove(&info.service_name);
        self.paths.unbind(uri, policy);
        metrics::record_bound_paths(self.paths.len());

        tracing::info!(service = %info.service_name, path = %info.path, "Service unbound");
        Some(info)
    }

    /// Where the live service `name` is bound.
    pub fn service_binding(&self, name: &str) -> Option<Arc<PipelineInfo>> {
        self.services.get(name).map(|e| e.info.clone())
    }

    /// State of the service slot for `name`; `None` means unregistered.
    pub fn service_state(&self, name: &str) -> Option<SlotState> {
        self.services.get(name).map(|e| e.state)
    }

    pub fn register_interceptor(
        &self,
        record: Arc<PluginRecord<dyn Interceptor>>,
    ) -> Result<(), GatewayError> {
        record.descriptor().validate()?;
        let name = record.name().to_string();
        let point = record.descriptor().intercept_point;
        self.interceptors.insert(record)?;
        tracing::info!(interceptor = %name, point = %point, "Interceptor registered");
        Ok(())
    }

    pub fn unregister_interceptor(&self, name: &str) -> bool {
        let removed = self.interceptors.remove(name).is_some();
        if removed {
            tracing::info!(interceptor = %name, "Interceptor unregistered");
        }
        removed
    }

    pub fn interceptors(&self) -> Vec<InterceptorSummary> {
        self.interceptors
            .entries()
            .iter()
            .map(|e| InterceptorSummary::from(e.as_ref()))
            .collect()
    }

    /// Add an auth mechanism. Mechanisms run in registration order.
    pub fn register_auth_mechanism(&self, record: Arc<PluginRecord<dyn AuthMechanism>>) {
        let _guard = self.lock();
        tracing::info!(mechanism = record.name(), "Auth mechanism registered");
        self.security.update(|set| {
            set.mechanisms.retain(|m| m.name() != record.name());
            set.mechanisms.push(record);
        });
    }

    pub fn register_authenticator(&self, record: Arc<PluginRecord<dyn Authenticator>>) {
        tracing::info!(authenticator = record.name(), "Authenticator registered");
        self.authenticators.insert(record.name().to_string(), record);
    }

    /// Look up an authenticator by name, for mechanisms that delegate.
    pub fn authenticator(&self, name: &str) -> Result<Arc<dyn Authenticator>, GatewayError> {
        self.authenticators
            .get(name)
            .filter(|r| r.is_enabled())
            .map(|r| r.instance().clone())
            .ok_or_else(|| GatewayError::Config(format!("authenticator '{name}' not found")))
    }

    pub fn register_authorizer(&self, record: Arc<PluginRecord<dyn Authorizer>>) {
        let _guard = self.lock();
        tracing::info!(authorizer = record.name(), "Authorizer registered");
        self.security.update(|set| {
            set.authorizers.retain(|a| a.name() != record.name());
            set.authorizers.push(record);
        });
    }

    pub fn set_token_manager(&self, tokens: Option<Arc<dyn TokenManager>>) {
        let _guard = self.lock();
        self.security.update(|set| set.token_manager = tokens);
    }

    pub fn token_manager(&self) -> Option<Arc<dyn TokenManager>> {
        self.security.load().token_manager.clone()
    }

    /// Add a check every secured request must pass.
    pub fn add_global_security_predicate(&self, predicate: Arc<dyn SecurityPredicate>) {
        let _guard = self.lock();
        self.security.update(|set| set.predicates.push(predicate));
    }

    pub fn register_initializer(&self, record: Arc<PluginRecord<dyn Initializer>>) {
        let _guard = self.lock();
        let mut next = Vec::clone(&self.initializers.load_full());
        next.retain(|i| i.name() != record.name());
        next.push(record);
        next.sort_by_key(|i| i.descriptor().priority);
        self.initializers.store(Arc::new(next));
    }

    /// Initializers for `point`, in priority order.
    pub fn initializers(&self, point: InitPoint) -> Vec<Arc<PluginRecord<dyn Initializer>>> {
        self.initializers
            .load()
            .iter()
            .filter(|i| i.is_enabled() && i.descriptor().init_point == point)
            .cloned()
            .collect()
    }

    /// Run the initializers of `point`. Failures are logged and skipped.
    /// Returns how many succeeded.
    pub async fn run_initializers(self: &Arc<Self>, point: InitPoint) -> usize {
        let mut succeeded = 0;
        for initializer in self.initializers(point) {
            match initializer.instance().init(self).await {
                Ok(()) => {
                    tracing::debug!(initializer = initializer.name(), "Initializer completed");
                    succeeded += 1;
                }
                Err(e) => {
                    tracing::error!(initializer = initializer.name(), error = %e, "Initializer failed");
                }
            }
        }
        succeeded
    }

    /// The binding a request path resolves to.
    pub fn lookup(&self, path: &str) -> Option<Arc<Binding>> {
        self.paths.lookup(path)
    }

    pub fn pipeline_info(&self, path: &str) -> Option<Arc<PipelineInfo>> {
        self.lookup(path).map(|b| b.value.info().clone())
    }

    /// Metadata of every binding.
    pub fn bindings(&self) -> Vec<Arc<PipelineInfo>> {
        self.paths
            .bindings()
            .iter()
            .map(|b| b.value.info().clone())
            .collect()
    }

    pub fn services(&self) -> Vec<ServiceSummary> {
        let mut services: Vec<_> = self
            .services
            .iter()
            .map(|entry| ServiceSummary {
                name: entry.key().clone(),
                description: entry.record.description().to_string(),
                uri: entry.info.path.clone(),
                match_policy: entry.info.match_policy,
                secured: entry.info.secured,
                enabled: entry.record.is_enabled(),
                state: entry.state,
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    /// The record of a live service.
    pub fn service(&self, name: &str) -> Option<Arc<PluginRecord<dyn Service>>> {
        self.services.get(name).map(|e| e.record.clone())
    }

    /// Drop every plugin and binding.
    pub fn clear(&self) {
        let _guard = self.lock();
        for binding in self.paths.bindings() {
            self.paths.unbind(&binding.path, binding.policy);
        }
        self.services.clear();
        self.interceptors.clear();
        self.authenticators.clear();
        self.security.update(|set| *set = Default::default());
        self.initializers.store(Arc::new(Vec::new()));
        metrics::record_bound_paths(0);
        tracing::info!("Registry cleared");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new(PipelineSettings::default(), BTreeMap::new())
    }
}

fn enabled_record<T: ?Sized>(
    descriptor: &Arc<PluginDescriptor>,
    instance: Arc<T>,
    configuration: &HashMap<String, Value>,
) -> Arc<PluginRecord<T>> {
    let record = PluginRecord::new(descriptor.clone(), instance, configuration.clone());
    record.set_enabled(true);
    Arc::new(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;
    use crate::pipeline::Flow;
    use crate::plugins::InterceptPoint;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(&'static str);

    #[async_trait]
    impl Service for Named {
        async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
            exchange.response.set_text(self.0);
            Ok(())
        }
    }

    impl Plugin for Named {
        fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
            Some(self)
        }
    }

    struct Both;

    #[async_trait]
    impl Service for Both {
        async fn handle(&self, _exchange: &mut Exchange) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Interceptor for Both {
        async fn handle(&self, _exchange: &mut Exchange) -> Result<Flow, GatewayError> {
            Ok(Flow::Continue)
        }
    }

    impl Plugin for Both {
        fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
            Some(self)
        }

        fn as_interceptor(self: Arc<Self>) -> Option<Arc<dyn Interceptor>> {
            Some(self)
        }
    }

    struct Nothing;
    impl Plugin for Nothing {}

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Initializer for Counter {
        async fn init(&self, _registry: &Arc<PluginRegistry>) -> Result<(), GatewayError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Plugin for Counter {
        fn as_initializer(self: Arc<Self>) -> Option<Arc<dyn Initializer>> {
            Some(self)
        }
    }

    fn service(name: &'static str) -> Arc<PluginRecord<dyn Service>> {
        let instance: Arc<dyn Service> = Arc::new(Named(name));
        Arc::new(PluginRecord::named(name, instance))
    }

    #[test]
    fn test_register_and_unregister_service() {
        let registry = PluginRegistry::default();
        registry
            .register_service(service("a"), "/a", MatchPolicy::Prefix, true)
            .unwrap();

        assert_eq!(registry.pipeline_info("/a/b").unwrap().service_name, "a");
        assert_eq!(registry.service_state("a"), Some(SlotState::Bound));

        let info = registry.unregister_service("/a", MatchPolicy::Prefix).unwrap();
        assert_eq!(info.service_name, "a");
        assert!(registry.lookup("/a").is_none());
        assert_eq!(registry.service_state("a"), None);
        assert!(registry.unregister_service("/a", MatchPolicy::Prefix).is_none());
    }

    #[test]
    fn test_rebind_replaces_pipeline() {
        let registry = PluginRegistry::default();
        registry
            .register_service(service("a"), "/x", MatchPolicy::Exact, true)
            .unwrap();
        let first = registry.lookup("/x").unwrap();

        registry
            .register_service(service("a"), "/x", MatchPolicy::Exact, false)
            .unwrap();
        let second = registry.lookup("/x").unwrap();

        assert!(!Arc::ptr_eq(&first.value, &second.value));
        assert!(!second.value.info().secured);
        // The old pipeline is still usable by whoever captured it.
        assert!(first.value.info().secured);
    }

    #[test]
    fn test_other_service_displaced_from_slot() {
        let registry = PluginRegistry::default();
        registry
            .register_service(service("a"), "/x", MatchPolicy::Prefix, true)
            .unwrap();
        registry
            .register_service(service("b"), "/x", MatchPolicy::Prefix, true)
            .unwrap();

        assert_eq!(registry.pipeline_info("/x").unwrap().service_name, "b");
        assert!(registry.service("a").is_none());
    }

    #[test]
    fn test_service_name_bound_once() {
        let registry = PluginRegistry::default();
        registry
            .register_service(service("a"), "/x", MatchPolicy::Prefix, true)
            .unwrap();
        let err = registry
            .register_service(service("a"), "/y", MatchPolicy::Prefix, true)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_register_plugin_uses_descriptor_and_config() {
        let mut config = BTreeMap::new();
        config.insert(
            "moved".to_string(),
            PluginConfig {
                uri: Some("/elsewhere".into()),
                secured: Some(false),
                ..Default::default()
            },
        );
        config.insert(
            "off".to_string(),
            PluginConfig {
                enabled: Some(false),
                ..Default::default()
            },
        );
        let registry = PluginRegistry::new(PipelineSettings::default(), config);

        registry
            .register_plugin(PluginDescriptor::new("plain"), Arc::new(Named("plain")))
            .unwrap();
        registry
            .register_plugin(PluginDescriptor::new("moved"), Arc::new(Named("moved")))
            .unwrap();
        registry
            .register_plugin(PluginDescriptor::new("off"), Arc::new(Named("off")))
            .unwrap();

        assert_eq!(registry.pipeline_info("/plain").unwrap().service_name, "plain");
        let moved = registry.pipeline_info("/elsewhere").unwrap();
        assert_eq!(moved.service_name, "moved");
        assert!(!moved.secured);
        assert!(registry.lookup("/moved").is_none());
        assert!(registry.lookup("/off").is_none());
    }

    #[test]
    fn test_plugin_filed_per_capability() {
        let registry = PluginRegistry::default();
        registry
            .register_plugin(
                PluginDescriptor::new("both").intercept_at(InterceptPoint::Response),
                Arc::new(Both),
            )
            .unwrap();

        assert!(registry.lookup("/both").is_some());
        let interceptors = registry.interceptors();
        assert_eq!(interceptors.len(), 1);
        assert_eq!(interceptors[0].point, "response");

        let err = registry
            .register_plugin(PluginDescriptor::new("nothing"), Arc::new(Nothing))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));

        let err = registry
            .register_plugin(PluginDescriptor::new(""), Arc::new(Named("x")))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[tokio::test]
    async fn test_initializers_by_point() {
        let registry = Arc::new(PluginRegistry::default());
        let count = Arc::new(AtomicUsize::new(0));
        registry
            .register_plugin(
                PluginDescriptor::new("early").init_at(InitPoint::BeforeStartup),
                Arc::new(Counter(count.clone())),
            )
            .unwrap();
        registry
            .register_plugin(PluginDescriptor::new("late"), Arc::new(Counter(count.clone())))
            .unwrap();

        assert_eq!(registry.run_initializers(InitPoint::BeforeStartup).await, 1);
        assert_eq!(registry.run_initializers(InitPoint::AfterStartup).await, 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_authenticator_lookup() {
        let registry = PluginRegistry::default();
        assert!(matches!(
            registry.authenticator("missing"),
            Err(GatewayError::Config(_))
        ));

        let authenticator: Arc<dyn Authenticator> =
            Arc::new(crate::security::ConfigAuthenticator::new(&[]));
        registry.register_authenticator(Arc::new(PluginRecord::named("users", authenticator)));
        assert!(registry.authenticator("users").is_ok());
    }

    #[test]
    fn test_rejected_plugin_leaves_nothing_bound() {
        let registry = PluginRegistry::default();
        let hook: Arc<dyn Interceptor> = Arc::new(Both);
        registry
            .register_interceptor(Arc::new(PluginRecord::named("dup", hook)))
            .unwrap();

        let err = registry
            .register_plugin(PluginDescriptor::new("dup"), Arc::new(Both))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(registry.lookup("/dup").is_none());
        assert!(registry.service("dup").is_none());
        assert_eq!(registry.interceptors().len(), 1);
    }

    #[test]
    fn test_service_conflict_rolls_back_interceptor() {
        let registry = PluginRegistry::default();
        registry
            .register_service(service("both"), "/elsewhere", MatchPolicy::Exact, true)
            .unwrap();

        let err = registry
            .register_plugin(PluginDescriptor::new("both"), Arc::new(Both))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(registry.interceptors().is_empty());
        assert!(registry.lookup("/both").is_none());
        assert!(registry.lookup("/elsewhere").is_some());
    }

    #[test]
    fn test_owned_unregister_checks_slot_owner() {
        let registry = PluginRegistry::default();
        registry
            .register_service(service("b"), "/x", MatchPolicy::Exact, true)
            .unwrap();

        assert!(registry
            .unregister_service_owned("/x", MatchPolicy::Exact, "a")
            .is_none());
        assert!(registry.lookup("/x").is_some());

        let info = registry
            .unregister_service_owned("/x", MatchPolicy::Exact, "b")
            .unwrap();
        assert_eq!(info.service_name, "b");
        assert!(registry.service_binding("b").is_none());
    }

    #[test]
    fn test_clear() {
        let registry = PluginRegistry::default();
        registry
            .register_service(service("a"), "/a", MatchPolicy::Exact, true)
            .unwrap();
        registry.clear();
        assert!(registry.bindings().is_empty());
        assert!(registry.services().is_empty());
    }
}
