//! Gateway error taxonomy.
//!
//! # Design Decisions
//! - Per-request failures are values, converted to a response by the
//!   emission stage; they never reach shared registry state
//! - Registration and deploy failures are scoped to one plugin or one file
//! - Nothing here is fatal to the process

use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

use crate::plugins::InterceptPoint;

/// Errors produced by the dispatch core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid plugin metadata at registration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Security evaluation found no acceptable principal.
    #[error("authentication required")]
    AuthRequired {
        /// Challenges collected from the auth mechanisms (`WWW-Authenticate`).
        challenges: Vec<String>,
    },

    /// An auth mechanism actively rejected the supplied credentials.
    #[error("authentication rejected by {mechanism}: {reason}")]
    AuthRejected { mechanism: String, reason: String },

    /// No authorizer granted the request.
    #[error("forbidden")]
    Forbidden,

    /// An interceptor failed; the rest of its chain was aborted.
    #[error("interceptor '{interceptor}' failed at {point}: {reason}")]
    InterceptorFailure {
        interceptor: String,
        point: InterceptPoint,
        reason: String,
    },

    /// The request body could not be decoded per its declared type.
    #[error("invalid request content: {0}")]
    ContentMaterialization(String),

    /// The handling service failed.
    #[error("service '{service}' failed: {reason}")]
    Service { service: String, reason: String },

    /// No pipeline is bound to the request path.
    #[error("no service bound to {0}")]
    NotFound(String),

    /// A script could not be loaded or registered.
    #[error("failed to deploy {path}: {reason}")]
    Deploy { path: PathBuf, reason: String },

    /// The underlying watch mechanism failed.
    #[error("watch error on {path}: {reason}")]
    Watch { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Builds a service failure from any displayable error.
    pub fn service(service: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Service {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status used when this error terminates a request.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthRequired { .. } | Self::AuthRejected { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ContentMaterialization(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_)
            | Self::InterceptorFailure { .. }
            | Self::Service { .. }
            | Self::Deploy { .. }
            | Self::Watch { .. }
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to a client.
    ///
    /// Internal failures are reported generically; the detail goes to the log.
    pub fn client_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::AuthRequired { challenges: vec![] }.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(GatewayError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GatewayError::ContentMaterialization("bad json".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::NotFound("/x".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = GatewayError::service("db", "connection string leaked");
        assert_eq!(err.client_message(), "Internal error");
        assert!(GatewayError::Forbidden.client_message().contains("forbidden"));
    }
}
