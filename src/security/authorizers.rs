//! Authorizers.
//!
//! # Design Decisions
//! - Three-valued verdict: an authorizer that does not cover a resource
//!   abstains instead of denying, so grants compose with OR
//! - Whether a request needs an authenticated principal is asked of the
//!   authorizers, not hard-coded per route

use std::sync::Arc;

use async_trait::async_trait;

use super::context::SecurityContext;
use crate::config::AclRule;
use crate::exchange::ServiceRequest;
use crate::plugins::Plugin;
use crate::routing::matcher::{normalize, prefix_matches};

/// One authorizer's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(String),
    /// The authorizer has no opinion on this resource.
    Abstain,
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Permission check for a request/principal pair.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &ServiceRequest, security: &SecurityContext) -> Verdict;

    /// Whether this authorizer needs an authenticated principal for `request`.
    fn authentication_required(&self, _request: &ServiceRequest) -> bool {
        true
    }
}

/// Grants everything.
#[derive(Debug, Clone, Copy)]
pub struct FullAuthorizer {
    authentication_required: bool,
}

impl FullAuthorizer {
    pub fn new(authentication_required: bool) -> Self {
        Self {
            authentication_required,
        }
    }
}

#[async_trait]
impl Authorizer for FullAuthorizer {
    async fn authorize(&self, _request: &ServiceRequest, _security: &SecurityContext) -> Verdict {
        Verdict::Allow
    }

    fn authentication_required(&self, _request: &ServiceRequest) -> bool {
        self.authentication_required
    }
}

impl Plugin for FullAuthorizer {
    fn as_authorizer(self: Arc<Self>) -> Option<Arc<dyn Authorizer>> {
        Some(self)
    }
}

/// Role-based access control over path prefixes.
///
/// A rule grants its role the listed methods (all methods when empty) on
/// every path under `path_prefix`. Paths covered by no rule are left to
/// other authorizers.
#[derive(Debug, Clone)]
pub struct AclAuthorizer {
    rules: Vec<AclRule>,
    anonymous_role: Option<String>,
}

impl AclAuthorizer {
    pub fn new(rules: Vec<AclRule>, anonymous_role: Option<String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                rule.path_prefix = normalize(&rule.path_prefix);
                rule
            })
            .collect();
        Self {
            rules,
            anonymous_role,
        }
    }

    fn covering<'a>(&'a self, request: &'a ServiceRequest) -> impl Iterator<Item = &'a AclRule> {
        let path = request.path();
        self.rules
            .iter()
            .filter(move |rule| prefix_matches(&rule.path_prefix, path))
    }

    fn method_allowed(rule: &AclRule, request: &ServiceRequest) -> bool {
        rule.methods.is_empty()
            || rule
                .methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(request.method().as_str()))
    }

    fn role_matches(&self, rule: &AclRule, security: &SecurityContext) -> bool {
        match security.principal() {
            Some(principal) => principal.has_role(&rule.role),
            None => self.anonymous_role.as_deref() == Some(rule.role.as_str()),
        }
    }
}

#[async_trait]
impl Authorizer for AclAuthorizer {
    async fn authorize(&self, request: &ServiceRequest, security: &SecurityContext) -> Verdict {
        let mut covered = false;
        for rule in self.covering(request) {
            covered = true;
            if self.role_matches(rule, security) && Self::method_allowed(rule, request) {
                return Verdict::Allow;
            }
        }

        if !covered {
            return Verdict::Abstain;
        }

        let who = security
            .principal()
            .map(|p| p.name.as_str())
            .unwrap_or("anonymous");
        Verdict::Deny(format!(
            "{} {} not permitted for {}",
            request.method(),
            request.path(),
            who
        ))
    }

    fn authentication_required(&self, request: &ServiceRequest) -> bool {
        let Some(anonymous) = self.anonymous_role.as_deref() else {
            return true;
        };
        !self
            .covering(request)
            .any(|rule| rule.role == anonymous && Self::method_allowed(rule, request))
    }
}

impl Plugin for AclAuthorizer {
    fn as_authorizer(self: Arc<Self>) -> Option<Arc<dyn Authorizer>> {
        Some(self)
    }
}
