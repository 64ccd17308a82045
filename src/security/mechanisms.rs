//! Authentication mechanisms and authenticators.
//!
//! # Responsibilities
//! - Extract credentials from a request (Basic, Bearer token)
//! - Verify them against an authenticator or the token manager
//!
//! # Design Decisions
//! - A mechanism that finds no credentials of its kind declines
//! - Malformed credentials are rejected outright (401, no fallthrough)
//! - Wrong credentials decline, so later mechanisms still get a chance

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use super::context::Principal;
use super::token::TokenManager;
use crate::config::UserConfig;
use crate::exchange::ServiceRequest;
use crate::plugins::Plugin;

/// Result of one mechanism's attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Principal),
    /// No credentials for this mechanism, or they did not verify.
    Declined,
    /// Credentials were present but unusable; stop with 401.
    Rejected(String),
}

/// Extracts and checks credentials.
#[async_trait]
pub trait AuthMechanism: Send + Sync {
    async fn authenticate(&self, request: &ServiceRequest) -> AuthOutcome;

    /// `WWW-Authenticate` challenge sent when authentication is required.
    fn challenge(&self) -> Option<String> {
        None
    }
}

/// Verifies an id/secret pair.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, id: &str, secret: &str) -> Option<Principal>;
}

/// HTTP Basic authentication.
pub struct BasicAuthMechanism {
    realm: String,
    authenticator: Arc<dyn Authenticator>,
}

impl BasicAuthMechanism {
    pub fn new(realm: impl Into<String>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            realm: realm.into(),
            authenticator,
        }
    }

    fn credentials(encoded: &str) -> Result<(String, String), String> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| "malformed basic credentials".to_string())?;
        let decoded = String::from_utf8(decoded).map_err(|_| "credentials are not UTF-8".to_string())?;
        let (id, secret) = decoded
            .split_once(':')
            .ok_or_else(|| "basic credentials missing ':'".to_string())?;
        Ok((id.to_string(), secret.to_string()))
    }
}

#[async_trait]
impl AuthMechanism for BasicAuthMechanism {
    async fn authenticate(&self, request: &ServiceRequest) -> AuthOutcome {
        let Some(encoded) = request
            .header(AUTHORIZATION)
            .and_then(|value| strip_scheme(value, "Basic"))
        else {
            return AuthOutcome::Declined;
        };

        let (id, secret) = match Self::credentials(encoded) {
            Ok(pair) => pair,
            Err(reason) => return AuthOutcome::Rejected(reason),
        };

        match self.authenticator.verify(&id, &secret).await {
            Some(principal) => AuthOutcome::Authenticated(principal),
            None => {
                tracing::debug!(user = %id, "Basic credentials did not verify");
                AuthOutcome::Declined
            }
        }
    }

    fn challenge(&self) -> Option<String> {
        Some(format!("Basic realm=\"{}\"", self.realm))
    }
}

impl Plugin for BasicAuthMechanism {
    fn as_auth_mechanism(self: Arc<Self>) -> Option<Arc<dyn AuthMechanism>> {
        Some(self)
    }
}

/// Bearer token authentication against the token manager.
pub struct TokenAuthMechanism {
    tokens: Arc<dyn TokenManager>,
}

impl TokenAuthMechanism {
    pub fn new(tokens: Arc<dyn TokenManager>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthMechanism for TokenAuthMechanism {
    async fn authenticate(&self, request: &ServiceRequest) -> AuthOutcome {
        let Some(token) = request
            .header(AUTHORIZATION)
            .and_then(|value| strip_scheme(value, "Bearer"))
        else {
            return AuthOutcome::Declined;
        };

        let token = token.trim();
        if token.is_empty() {
            return AuthOutcome::Rejected("empty bearer token".into());
        }

        match self.tokens.verify(token) {
            Some(principal) => AuthOutcome::Authenticated(principal.with_token(token)),
            None => AuthOutcome::Declined,
        }
    }

    fn challenge(&self) -> Option<String> {
        Some("Bearer".to_string())
    }
}

impl Plugin for TokenAuthMechanism {
    fn as_auth_mechanism(self: Arc<Self>) -> Option<Arc<dyn AuthMechanism>> {
        Some(self)
    }
}

/// Users declared in the gateway configuration.
pub struct ConfigAuthenticator {
    users: HashMap<String, UserConfig>,
}

impl ConfigAuthenticator {
    pub fn new(users: &[UserConfig]) -> Self {
        Self {
            users: users
                .iter()
                .map(|u| (u.userid.clone(), u.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for ConfigAuthenticator {
    async fn verify(&self, id: &str, secret: &str) -> Option<Principal> {
        let user = self.users.get(id)?;
        let matches: bool = user.password.as_bytes().ct_eq(secret.as_bytes()).into();
        matches.then(|| Principal::new(id).with_roles(user.roles.iter().cloned()))
    }
}

impl Plugin for ConfigAuthenticator {
    fn as_authenticator(self: Arc<Self>) -> Option<Arc<dyn Authenticator>> {
        Some(self)
    }
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (found, rest) = value.split_once(' ')?;
    found.eq_ignore_ascii_case(scheme).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::token::RndTokenManager;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;

    fn request(authorization: Option<&str>) -> ServiceRequest {
        let mut builder = Request::builder().uri("/secure");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        ServiceRequest::new(builder.body(Body::empty()).unwrap(), 1024)
    }

    fn basic() -> BasicAuthMechanism {
        let users = vec![UserConfig {
            userid: "admin".into(),
            password: "secret".into(),
            roles: vec!["admin".into()],
        }];
        BasicAuthMechanism::new("gateway", Arc::new(ConfigAuthenticator::new(&users)))
    }

    fn encode(s: &str) -> String {
        format!("Basic {}", STANDARD.encode(s))
    }

    #[tokio::test]
    async fn test_basic_authenticates() {
        let outcome = basic().authenticate(&request(Some(&encode("admin:secret")))).await;
        match outcome {
            AuthOutcome::Authenticated(p) => {
                assert_eq!(p.name, "admin");
                assert!(p.has_role("admin"));
                assert!(!p.is_token_based());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_basic_declines_without_header_or_wrong_password() {
        assert_eq!(basic().authenticate(&request(None)).await, AuthOutcome::Declined);
        assert_eq!(
            basic().authenticate(&request(Some(&encode("admin:nope")))).await,
            AuthOutcome::Declined
        );
        assert_eq!(
            basic().authenticate(&request(Some("Bearer abc"))).await,
            AuthOutcome::Declined
        );
    }

    #[tokio::test]
    async fn test_basic_rejects_malformed() {
        let outcome = basic().authenticate(&request(Some("Basic %%%not-base64"))).await;
        assert!(matches!(outcome, AuthOutcome::Rejected(_)));

        let outcome = basic().authenticate(&request(Some(&encode("no-colon")))).await;
        assert!(matches!(outcome, AuthOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_token_mechanism() {
        let manager = Arc::new(RndTokenManager::new(Duration::from_secs(60), "/tokens"));
        let issued = manager.issue(&Principal::new("bob"));
        let mechanism = TokenAuthMechanism::new(manager);

        let header = format!("Bearer {}", issued.token);
        match mechanism.authenticate(&request(Some(&header))).await {
            AuthOutcome::Authenticated(p) => {
                assert_eq!(p.name, "bob");
                assert_eq!(p.token.as_deref(), Some(issued.token.as_str()));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert_eq!(
            mechanism.authenticate(&request(Some("Bearer unknown"))).await,
            AuthOutcome::Declined
        );
    }
}
