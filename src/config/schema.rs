//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Request body limits.
    pub limits: LimitsConfig,

    /// CORS headers added by every pipeline.
    pub cors: CorsConfig,

    /// Trace headers echoed back to the caller.
    pub tracing: TracingConfig,

    /// Response compression.
    pub encoding: EncodingConfig,

    /// Users, ACL and token manager.
    pub security: SecurityConfig,

    /// Hot deploy of script services.
    pub deploy: DeployConfig,

    /// Per-plugin overrides, keyed by plugin name.
    pub plugins: BTreeMap<String, PluginConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum body size in bytes read when materializing a request.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origin: "*".to_string(),
            allow_methods: ["GET", "PUT", "POST", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: ["Authorization", "Content-Type", "X-Requested-With", "No-Auth-Challenge"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            expose_headers: ["Location", "ETag", "Auth-Token", "Auth-Token-Valid-Until", "Auth-Token-Location"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            max_age_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Request headers copied onto the response and into the request span.
    pub headers: Vec<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            headers: vec!["traceparent".to_string(), "x-request-id".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub enabled: bool,

    /// Responses smaller than this are sent uncompressed.
    pub min_size: usize,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size: 256,
        }
    }
}

/// A user known to the configuration authenticator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub userid: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Grants `role` the listed methods under `path_prefix`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AclRule {
    pub role: String,
    pub path_prefix: String,
    /// Allowed methods; empty means all.
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenManagerConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub realm: String,
    pub users: Vec<UserConfig>,
    pub acl: Vec<AclRule>,
    pub token_manager: TokenManagerConfig,
    /// Role given to unauthenticated callers by the ACL authorizer.
    pub anonymous_role: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            realm: "gateway".to_string(),
            users: Vec::new(),
            acl: Vec::new(),
            token_manager: TokenManagerConfig::default(),
            anonymous_role: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Watched directory; hot deploy is off when unset.
    pub directory: Option<PathBuf>,

    /// Script file extension, without the dot.
    pub extension: String,

    /// Delay before the first watch event is drained.
    pub startup_delay_ms: u64,

    /// Upper bound on loading one script.
    pub deploy_timeout_secs: u64,

    /// Polling interval for watch backends that poll.
    pub poll_interval_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            directory: None,
            extension: "toml".to_string(),
            startup_delay_ms: 1000,
            deploy_timeout_secs: 10,
            poll_interval_secs: 2,
        }
    }
}

/// Per-plugin settings. Unknown keys are kept as plugin configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginConfig {
    pub enabled: Option<bool>,
    pub uri: Option<String>,
    pub secured: Option<bool>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
