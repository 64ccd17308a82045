//! Liveness probe service.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use serde_json::json;

use crate::error::GatewayError;
use crate::exchange::Exchange;
use crate::plugins::{Plugin, PluginDescriptor, Service};
use crate::routing::MatchPolicy;

/// Answers `GET /ping` with a short JSON document. Not secured.
#[derive(Debug, Clone)]
pub struct PingService {
    message: String,
}

impl PingService {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new("ping")
            .with_description("Liveness probe")
            .with_match_policy(MatchPolicy::Exact)
            .secured(false)
    }
}

impl Default for PingService {
    fn default() -> Self {
        Self::new("pong")
    }
}

#[async_trait]
impl Service for PingService {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        if exchange.request.method() != Method::GET && exchange.request.method() != Method::HEAD {
            exchange
                .response
                .set_status(axum::http::StatusCode::METHOD_NOT_ALLOWED);
            return Ok(());
        }
        exchange.response.set_json(json!({
            "message": self.message,
            "version": env!("CARGO_PKG_VERSION"),
        }));
        Ok(())
    }
}

impl Plugin for PingService {
    fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_ping() {
        let mut exchange = Exchange::new(Request::get("/ping").body(Body::empty()).unwrap(), 1024);
        PingService::default().handle(&mut exchange).await.unwrap();
        assert_eq!(exchange.response.status(), StatusCode::OK);
        assert_eq!(exchange.response.content().as_json().unwrap()["message"], "pong");

        let mut exchange = Exchange::new(Request::post("/ping").body(Body::empty()).unwrap(), 1024);
        PingService::default().handle(&mut exchange).await.unwrap();
        assert_eq!(exchange.response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
