//! Pluggable request-dispatch gateway library.

pub mod admin;
pub mod config;
pub mod deploy;
pub mod error;
pub mod exchange;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod routing;
pub mod security;
pub mod services;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use exchange::Exchange;
pub use http::GatewayServer;
pub use lifecycle::{Gateway, Shutdown};
pub use pipeline::Flow;
pub use plugins::{Plugin, PluginDescriptor, PluginRegistry};
