//! Plugin capabilities.
//!
//! A plugin is one object that may implement several capabilities: a
//! service, an interceptor, an initializer, or any of the security roles.
//! The registry asks a [`Plugin`] for each capability and files it once per
//! table it satisfies.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::exchange::{ContentKind, Exchange};
use crate::pipeline::Flow;
use crate::plugins::registry::PluginRegistry;
use crate::security::{AuthMechanism, Authenticator, Authorizer, TokenManager};

/// Request handler bound to a URI.
#[async_trait]
pub trait Service: Send + Sync {
    /// Handle the request, writing the result into `exchange.response`.
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError>;

    /// How the request body should be decoded when it is materialized.
    fn request_content(&self) -> ContentKind {
        ContentKind::Raw
    }

    /// Content kind of the responses it produces; response interceptors
    /// are matched against it.
    fn response_content(&self) -> ContentKind {
        ContentKind::Raw
    }
}

/// Cross-cutting unit run at an interception point.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Inspect or mutate the exchange. `Flow::Halt` means the interceptor
    /// produced the final response.
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError>;

    /// Per-request applicability check.
    fn resolve(&self, _exchange: &Exchange) -> bool {
        true
    }
}

/// Startup hook.
#[async_trait]
pub trait Initializer: Send + Sync {
    async fn init(&self, registry: &Arc<PluginRegistry>) -> Result<(), GatewayError>;
}

/// Capability set of a plugin object.
///
/// Implementors return `Some(self)` for each capability they provide:
///
/// ```ignore
/// impl Plugin for Ping {
///     fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
///         Some(self)
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        None
    }

    fn as_interceptor(self: Arc<Self>) -> Option<Arc<dyn Interceptor>> {
        None
    }

    fn as_initializer(self: Arc<Self>) -> Option<Arc<dyn Initializer>> {
        None
    }

    fn as_auth_mechanism(self: Arc<Self>) -> Option<Arc<dyn AuthMechanism>> {
        None
    }

    fn as_authenticator(self: Arc<Self>) -> Option<Arc<dyn Authenticator>> {
        None
    }

    fn as_authorizer(self: Arc<Self>) -> Option<Arc<dyn Authorizer>> {
        None
    }

    fn as_token_manager(self: Arc<Self>) -> Option<Arc<dyn TokenManager>> {
        None
    }
}
