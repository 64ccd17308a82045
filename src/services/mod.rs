//! Built-in services registered at startup.

pub mod ping;
pub mod roles;
pub mod tokens;

pub use ping::PingService;
pub use roles::RolesService;
pub use tokens::TokenService;
