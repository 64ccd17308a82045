//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry from configuration
//! - Register the built-in security plugins and services
//! - Run initializers, start listeners and hot-deploy tasks
//!
//! # Design Decisions
//! - A bad configuration is fatal at startup; after that nothing is
//! - Before-startup initializers run before the listener accepts traffic,
//!   after-startup ones once it does
//! - Background tasks all stop on the same `Shutdown`

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::shutdown::Shutdown;
use crate::admin::{setup_admin_router, AdminState};
use crate::config::{GatewayConfig, SecurityConfig};
use crate::deploy::{DeclarativeScriptLoader, DeploySettings, HotDeployer, NotifySource};
use crate::error::GatewayError;
use crate::http::GatewayServer;
use crate::pipeline::PipelineSettings;
use crate::plugins::{InitPoint, PluginDescriptor, PluginRegistry};
use crate::security::{
    AclAuthorizer, BasicAuthMechanism, ConfigAuthenticator, FullAuthorizer, RndTokenManager,
    TokenAuthMechanism,
};
use crate::services::{PingService, RolesService, TokenService};

const AUTHENTICATOR: &str = "config-authenticator";

/// A configured gateway, ready to run.
pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<PluginRegistry>,
    tokens: Option<Arc<RndTokenManager>>,
    shutdown: Shutdown,
}

impl Gateway {
    /// Build the registry and register every built-in plugin.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let registry = Arc::new(PluginRegistry::new(
            PipelineSettings::from_config(&config),
            config.plugins.clone(),
        ));
        let tokens = register_security(&registry, &config.security)?;
        register_services(&registry)?;

        Ok(Self {
            config,
            registry,
            tokens,
            shutdown: Shutdown::new(),
        })
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Serve on `listener` until shutdown.
    pub async fn run(self, listener: TcpListener) -> Result<(), GatewayError> {
        let registry = self.registry.clone();

        let ran = registry.run_initializers(InitPoint::BeforeStartup).await;
        tracing::debug!(initializers = ran, "Before-startup initializers done");

        let mut tasks = Vec::new();
        if let Some(task) = self.spawn_admin().await? {
            tasks.push(task);
        }
        if let Some(task) = self.spawn_deployer() {
            tasks.push(task);
        }
        if let Some(tokens) = &self.tokens {
            tasks.push(tokio::spawn(tokens.clone().run_purge(self.shutdown.subscribe())));
        }

        let server = GatewayServer::new(registry.clone(), &self.config.listener);
        let server = tokio::spawn(server.run(listener, self.shutdown.subscribe()));

        let ran = registry.run_initializers(InitPoint::AfterStartup).await;
        tracing::debug!(initializers = ran, "After-startup initializers done");
        tracing::info!(bound_paths = registry.bindings().len(), "Gateway started");

        let result = match server.await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(e) => Err(GatewayError::Io(std::io::Error::other(e))),
        };

        // The server may have failed on its own; stop the rest too.
        self.shutdown.trigger();
        for task in tasks {
            let _ = task.await;
        }
        result
    }

    async fn spawn_admin(&self) -> Result<Option<JoinHandle<()>>, GatewayError> {
        let admin = &self.config.admin;
        if !admin.enabled {
            return Ok(None);
        }

        let listener = TcpListener::bind(&admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(AdminState {
            registry: self.registry.clone(),
            api_key: Arc::from(admin.api_key.as_str()),
        });
        let mut shutdown = self.shutdown.subscribe();
        Ok(Some(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        })))
    }

    fn spawn_deployer(&self) -> Option<JoinHandle<()>> {
        let deploy = &self.config.deploy;
        let settings = DeploySettings::from_config(deploy)?;

        let mut deployer = HotDeployer::new(
            self.registry.clone(),
            Arc::new(DeclarativeScriptLoader::new(deploy.extension.as_str())),
            NotifySource::new(Duration::from_secs(deploy.poll_interval_secs)),
            settings,
        );
        let shutdown = self.shutdown.subscribe();
        Some(tokio::spawn(async move {
            // Errors are logged by the deployer; the gateway keeps serving.
            let _ = deployer.run(shutdown).await;
        }))
    }
}

/// Register the authenticator, auth mechanisms, authorizer and token
/// manager described by the security configuration.
///
/// Returns the token manager, if enabled, so its purge task can be run.
pub fn register_security(
    registry: &PluginRegistry,
    config: &SecurityConfig,
) -> Result<Option<Arc<RndTokenManager>>, GatewayError> {
    registry.register_plugin(
        PluginDescriptor::new(AUTHENTICATOR).with_description("Users from the configuration file"),
        Arc::new(ConfigAuthenticator::new(&config.users)),
    )?;

    let mut token_manager = None;
    if config.token_manager.enabled {
        let tokens = Arc::new(RndTokenManager::new(
            Duration::from_secs(config.token_manager.ttl_secs),
            "/tokens",
        ));
        registry.register_plugin(
            PluginDescriptor::new("rnd-token-manager").with_description("In-memory auth tokens"),
            tokens.clone(),
        )?;
        registry.register_plugin(
            PluginDescriptor::new("token-auth").with_description("Bearer token authentication"),
            Arc::new(TokenAuthMechanism::new(tokens.clone())),
        )?;
        registry.register_plugin(
            TokenService::descriptor(),
            Arc::new(TokenService::new(tokens.clone())),
        )?;
        token_manager = Some(tokens);
    }

    match registry.authenticator(AUTHENTICATOR) {
        Ok(authenticator) => registry.register_plugin(
            PluginDescriptor::new("basic-auth").with_description("HTTP Basic authentication"),
            Arc::new(BasicAuthMechanism::new(config.realm.as_str(), authenticator)),
        )?,
        Err(_) => tracing::warn!("Config authenticator disabled, basic auth not available"),
    }

    if config.acl.is_empty() && config.anonymous_role.is_none() {
        registry.register_plugin(
            PluginDescriptor::new("full-authorizer")
                .with_description("Allows every authenticated request"),
            Arc::new(FullAuthorizer::new(true)),
        )?;
    } else {
        registry.register_plugin(
            PluginDescriptor::new("acl-authorizer").with_description("Role based access rules"),
            Arc::new(AclAuthorizer::new(
                config.acl.clone(),
                config.anonymous_role.clone(),
            )),
        )?;
    }
    Ok(token_manager)
}

/// Register the services every gateway carries.
pub fn register_services(registry: &PluginRegistry) -> Result<(), GatewayError> {
    registry.register_plugin(PingService::descriptor(), Arc::new(PingService::default()))?;
    registry.register_plugin(RolesService::descriptor(), Arc::new(RolesService))?;
    Ok(())
}
