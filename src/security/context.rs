//! Per-request security state.

use std::collections::BTreeSet;

use serde::Serialize;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub name: String,
    pub roles: BTreeSet<String>,
    /// The bearer token the caller authenticated with, if any.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: BTreeSet::new(),
            token: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_token_based(&self) -> bool {
        self.token.is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Security state of one exchange. Created empty at request start.
#[derive(Debug, Default)]
pub struct SecurityContext {
    principal: Option<Principal>,
    mechanism: Option<String>,
    granted: BTreeSet<String>,
}

impl SecurityContext {
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Name of the mechanism that authenticated the principal.
    pub fn mechanism(&self) -> Option<&str> {
        self.mechanism.as_deref()
    }

    pub fn set_authenticated(&mut self, principal: Principal, mechanism: impl Into<String>) {
        self.principal = Some(principal);
        self.mechanism = Some(mechanism.into());
    }

    /// Record a permission grant (the granting authorizer's name).
    pub fn grant(&mut self, permission: impl Into<String>) {
        self.granted.insert(permission.into());
    }

    pub fn granted(&self) -> &BTreeSet<String> {
        &self.granted
    }
}
