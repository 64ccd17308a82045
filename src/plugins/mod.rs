//! Plugin subsystem.
//!
//! # Data Flow
//! ```text
//! PluginDescriptor + Arc<dyn Plugin>
//!     → registry.rs (validate, apply config overrides)
//!     → one PluginRecord per capability
//!         service      → PipelineBuilder → PathTable
//!         interceptor  → InterceptorTable
//!         security     → SecurityTables
//!         initializer  → run by lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Metadata is an explicit descriptor built once; nothing is derived
//!   from the plugin at request time
//! - One object may provide several capabilities

pub mod capabilities;
pub mod descriptor;
pub mod record;
pub mod registry;

pub use capabilities::{Initializer, Interceptor, Plugin, Service};
pub use descriptor::{InitPoint, InterceptPoint, InterceptorDescriptor, PluginDescriptor};
pub use record::PluginRecord;
pub use registry::{Binding, InterceptorSummary, PluginRegistry, ServiceSummary, SlotState};
