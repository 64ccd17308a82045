//! Who-am-I service.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::GatewayError;
use crate::exchange::Exchange;
use crate::plugins::{Plugin, PluginDescriptor, Service};

/// Returns the authenticated principal and its roles.
#[derive(Debug, Default)]
pub struct RolesService;

impl RolesService {
    pub fn descriptor() -> PluginDescriptor {
        PluginDescriptor::new("roles").with_description("Roles of the authenticated user")
    }
}

#[async_trait]
impl Service for RolesService {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        let Some(principal) = exchange.security.principal() else {
            return Err(GatewayError::AuthRequired { challenges: Vec::new() });
        };
        let body = json!({
            "authenticated": true,
            "principal": principal.name,
            "roles": principal.roles,
        });
        exchange.response.set_json(body);
        Ok(())
    }
}

impl Plugin for RolesService {
    fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Principal;
    use axum::body::Body;
    use axum::http::Request;

    #[tokio::test]
    async fn test_roles_of_principal() {
        let mut exchange = Exchange::new(Request::get("/roles").body(Body::empty()).unwrap(), 1024);
        assert!(RolesService.handle(&mut exchange).await.is_err());

        exchange
            .security
            .set_authenticated(Principal::new("alice").with_roles(["admin", "user"]), "basic");
        RolesService.handle(&mut exchange).await.unwrap();
        let body = exchange.response.content().as_json().unwrap();
        assert_eq!(body["principal"], "alice");
        assert_eq!(body["roles"], json!(["admin", "user"]));
    }
}
