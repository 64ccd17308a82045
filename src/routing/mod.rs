//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (any thread):
//!     PluginRegistry::register_service
//!     → path_table.rs (copy snapshot, insert binding, publish)
//!
//! Incoming Request (worker):
//!     path
//!     → path_table.rs (load snapshot, exact lookup, then longest prefix)
//!     → matcher.rs (segment-aware prefix test)
//!     → Return: binding or no match
//! ```
//!
//! # Design Decisions
//! - Lookups never take a lock
//! - Deterministic: same snapshot and path always yield the same binding
//! - Explicit no-match rather than a silent default

pub mod matcher;
pub mod path_table;

pub use matcher::MatchPolicy;
pub use path_table::{Bound, PathTable};
