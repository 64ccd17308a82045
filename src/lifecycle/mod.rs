//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Registry + built-in plugins → before-startup initializers
//!         → admin listener, hot deployer, HTTP server
//!         → after-startup initializers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, deployers stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then plugins, then listeners
//! - One shutdown signal for every background task

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_handler, wait_for_signal};
pub use startup::{register_security, register_services, Gateway};
