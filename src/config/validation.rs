//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that every configured URI and ACL prefix is absolute
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// One semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than zero"));
    }

    for (name, plugin) in &config.plugins {
        if let Some(uri) = &plugin.uri {
            if !uri.starts_with('/') {
                errors.push(ValidationError::new(
                    format!("plugins.{name}.uri"),
                    format!("'{uri}' must start with '/'"),
                ));
            }
        }
    }

    let mut seen = HashSet::new();
    for user in &config.security.users {
        if user.userid.is_empty() {
            errors.push(ValidationError::new("security.users", "userid must not be empty"));
        } else if !seen.insert(user.userid.as_str()) {
            errors.push(ValidationError::new(
                "security.users",
                format!("duplicate userid '{}'", user.userid),
            ));
        }
    }

    for rule in &config.security.acl {
        if !rule.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "security.acl",
                format!("path_prefix '{}' must start with '/'", rule.path_prefix),
            ));
        }
    }

    if config.security.token_manager.enabled && config.security.token_manager.ttl_secs == 0 {
        errors.push(ValidationError::new(
            "security.token_manager.ttl_secs",
            "must be greater than zero",
        ));
    }

    if config.deploy.extension.is_empty() || config.deploy.extension.starts_with('.') {
        errors.push(ValidationError::new(
            "deploy.extension",
            "must be a bare extension such as 'toml'",
        ));
    }
    if config.deploy.deploy_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "deploy.deploy_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
