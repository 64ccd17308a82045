//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Secured pipeline, per request:
//!     → mechanisms.rs (Basic, Bearer; first to authenticate wins)
//!     → composer.rs (global predicates, authentication requirement)
//!     → authorizers.rs (OR of grants; abstentions ignored)
//!     → token.rs (refresh token-based principals)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a secured route with no authorizer requires a principal
//!   and nothing grants it
//! - Open routes use a distinct evaluator, never a disabled secured one

pub mod authorizers;
pub mod composer;
pub mod context;
pub mod mechanisms;
pub mod token;

pub use authorizers::{AclAuthorizer, Authorizer, FullAuthorizer, Verdict};
pub use composer::{
    SecurityEvaluator, SecurityOutcome, SecurityPredicate, SecuritySet, SecurityTables,
};
pub use context::{Principal, SecurityContext};
pub use mechanisms::{
    AuthMechanism, AuthOutcome, Authenticator, BasicAuthMechanism, ConfigAuthenticator,
    TokenAuthMechanism,
};
pub use token::{RndTokenManager, TokenManager, TokenRef};
