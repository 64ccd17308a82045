//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → startup wires registry, security and deployer from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; runtime changes go through the
//!   registry (plugins) or the hot deployer (scripts), not a reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AclRule, AdminConfig, CorsConfig, DeployConfig, EncodingConfig, GatewayConfig,
    LimitsConfig, ListenerConfig, ObservabilityConfig, PluginConfig, SecurityConfig,
    TokenManagerConfig, TracingConfig, UserConfig,
};
pub use validation::{validate_config, ValidationError};
