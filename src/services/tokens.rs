//! Token issuing and revocation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};

use crate::error::GatewayError;
use crate::exchange::Exchange;
use crate::plugins::{Plugin, PluginDescriptor, Service};
use crate::security::TokenManager;

/// `GET` issues a token for the caller, `DELETE` revokes the token the
/// caller authenticated with.
pub struct TokenService {
    tokens: Arc<dyn TokenManager>,
}

impl TokenService {
    pub fn new(tokens: Arc<dyn TokenManager>) -> Self {
        Self { tokens }
    }

    pub fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new("tokens").with_description("Auth token management")
    }
}

#[async_trait]
impl Service for TokenService {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        let Some(principal) = exchange.security.principal().cloned() else {
            return Err(GatewayError::AuthRequired { challenges: Vec::new() });
        };

        match *exchange.request.method() {
            Method::GET => {
                let token = match principal.token.as_deref() {
                    Some(current) => self.tokens.refresh(current),
                    None => None,
                }
                .unwrap_or_else(|| self.tokens.issue(&principal));
                token.inject(&mut exchange.response);
                let body = serde_json::to_value(&token)
                    .map_err(|e| GatewayError::service("tokens", e))?;
                exchange.response.set_json(body);
            }
            Method::DELETE => {
                let Some(current) = principal.token.as_deref() else {
                    exchange.response.set_status(StatusCode::BAD_REQUEST);
                    exchange.response.set_text("not authenticated with a token");
                    return Ok(());
                };
                self.tokens.invalidate(current);
                tracing::info!(principal = %principal.name, "Token revoked");
                exchange.response.set_status(StatusCode::NO_CONTENT);
            }
            _ => exchange.response.set_status(StatusCode::METHOD_NOT_ALLOWED),
        }
        Ok(())
    }
}

impl Plugin for TokenService {
    fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }
}
