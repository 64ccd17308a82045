//! Hot deploy subsystem.
//!
//! # Data Flow
//! ```text
//! EventSource (notify, or a channel in tests)
//!     → DeployEvent
//!     → reducer::reduce (pure)
//!     → DeployAction
//!     → HotDeployer: ScriptLoader → PluginRegistry::register_service
//! ```

pub mod reducer;
pub mod script;
pub mod source;
pub mod watcher;

pub use reducer::{reduce, DeployAction};
pub use script::{DeclarativeScriptLoader, ScriptLoader, ScriptService, StaticService};
pub use source::{ChannelSource, DeployEvent, EventSender, EventSource, EventStream, NotifySource};
pub use watcher::{DeploySettings, DeploymentEntry, HotDeployer, WatcherState};
