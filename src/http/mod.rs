//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum, request ID, trace, timeout)
//!     → PluginRegistry::lookup(path)
//!     → Pipeline::execute(Exchange)
//!     → Response to client
//! ```

pub mod server;

pub use server::{build_router, GatewayServer};
