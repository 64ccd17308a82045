//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router: every path falls through to the dispatcher
//! - Wire up transport middleware (request ID, tracing, timeout)
//! - Resolve the request path to a pipeline and run it
//! - Serve until the shutdown signal
//!
//! # Design Decisions
//! - Axum only parses and transports; path matching belongs to the
//!   registry so bindings can change without rebuilding the router
//! - The timeout layer drops the pipeline future, which aborts the rest of
//!   that request and nothing else

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::error::GatewayError;
use crate::exchange::Exchange;
use crate::plugins::PluginRegistry;

/// HTTP front of the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(registry: Arc<PluginRegistry>, config: &ListenerConfig) -> Self {
        Self {
            router: build_router(registry, Duration::from_secs(config.request_timeout_secs)),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all transport layers.
#[allow(deprecated)]
pub fn build_router(registry: Arc<PluginRegistry>, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(registry)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Hand the request to the pipeline bound at its path.
async fn dispatch(State(registry): State<Arc<PluginRegistry>>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();

    let Some(binding) = registry.lookup(&path) else {
        tracing::debug!(path = %path, "No service bound");
        let err = GatewayError::NotFound(path);
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": 404, "message": err.client_message() })),
        )
            .into_response();
    };

    let exchange = Exchange::new(request, registry.settings().max_body_size);
    binding.value.execute(exchange).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{PluginDescriptor, PluginRecord, Service};
    use crate::routing::MatchPolicy;
    use async_trait::async_trait;
    use tower::ServiceExt;

    struct Slow;

    #[async_trait]
    impl Service for Slow {
        async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            exchange.response.set_text("late");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unbound_path_is_404() {
        let router = build_router(Arc::new(PluginRegistry::default()), Duration::from_secs(5));
        let response = router
            .oneshot(Request::get("/nothing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_timeout_aborts_pipeline() {
        let registry = Arc::new(PluginRegistry::default());
        let instance: Arc<dyn Service> = Arc::new(Slow);
        let record = PluginRecord::new(
            Arc::new(PluginDescriptor::new("slow")),
            instance,
            Default::default(),
        );
        registry
            .register_service(Arc::new(record), "/slow", MatchPolicy::Exact, false)
            .unwrap();

        let router = build_router(registry, Duration::from_millis(50));
        let response = router
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
