//! Security evaluation for one pipeline.
//!
//! # Responsibilities
//! - Run auth mechanisms in registration order until one authenticates
//! - Decide whether an unauthenticated request may proceed
//! - OR-combine authorizer grants
//! - Refresh the caller's token when it authenticated with one
//!
//! # Design Decisions
//! - Secured and open routes get different evaluator variants. The open
//!   variant's only authorizer is a `FullAuthorizer`; there is no "skip" flag
//! - Mechanisms and authorizers are read from a shared snapshot per
//!   request, so plugins registered later apply to existing pipelines
//! - Disabled plugin records are skipped

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::authorizers::{Authorizer, FullAuthorizer, Verdict};
use super::mechanisms::{AuthMechanism, AuthOutcome};
use super::token::TokenManager;
use crate::error::GatewayError;
use crate::exchange::{Exchange, ServiceRequest};
use crate::observability::metrics;
use crate::plugins::PluginRecord;

/// Request check applied to every secured request after authentication.
pub trait SecurityPredicate: Send + Sync {
    fn check(&self, request: &ServiceRequest) -> bool;
}

impl<F> SecurityPredicate for F
where
    F: Fn(&ServiceRequest) -> bool + Send + Sync,
{
    fn check(&self, request: &ServiceRequest) -> bool {
        self(request)
    }
}

/// Security plugins in effect at a point in time.
#[derive(Clone, Default)]
pub struct SecuritySet {
    pub mechanisms: Vec<Arc<PluginRecord<dyn AuthMechanism>>>,
    pub authorizers: Vec<Arc<PluginRecord<dyn Authorizer>>>,
    pub token_manager: Option<Arc<dyn TokenManager>>,
    pub predicates: Vec<Arc<dyn SecurityPredicate>>,
}

/// Shared, atomically replaced [`SecuritySet`].
pub struct SecurityTables {
    current: ArcSwap<SecuritySet>,
}

impl SecurityTables {
    pub fn new(set: SecuritySet) -> Self {
        Self {
            current: ArcSwap::from_pointee(set),
        }
    }

    pub fn load(&self) -> Arc<SecuritySet> {
        self.current.load_full()
    }

    /// Copy, modify, publish. Callers serialize writes.
    pub fn update<R>(&self, f: impl FnOnce(&mut SecuritySet) -> R) -> R {
        let mut next = SecuritySet::clone(&self.current.load_full());
        let result = f(&mut next);
        self.current.store(Arc::new(next));
        result
    }
}

impl Default for SecurityTables {
    fn default() -> Self {
        Self::new(SecuritySet::default())
    }
}

/// Result of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityOutcome {
    Allowed,
    /// No principal, but one is needed. Carries the mechanisms' challenges.
    AuthRequired(Vec<String>),
    Rejected { mechanism: String, reason: String },
    Forbidden,
}

impl SecurityOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::AuthRequired(_) => "auth_required",
            Self::Rejected { .. } => "rejected",
            Self::Forbidden => "forbidden",
        }
    }

    pub fn into_result(self) -> Result<(), GatewayError> {
        match self {
            Self::Allowed => Ok(()),
            Self::AuthRequired(challenges) => Err(GatewayError::AuthRequired { challenges }),
            Self::Rejected { mechanism, reason } => {
                Err(GatewayError::AuthRejected { mechanism, reason })
            }
            Self::Forbidden => Err(GatewayError::Forbidden),
        }
    }
}

/// Evaluator for secured routes.
pub struct SecuredEvaluator {
    tables: Arc<SecurityTables>,
}

impl SecuredEvaluator {
    async fn evaluate(&self, exchange: &mut Exchange) -> SecurityOutcome {
        let set = self.tables.load();

        for mechanism in set.mechanisms.iter().filter(|m| m.is_enabled()) {
            match mechanism.instance().authenticate(&exchange.request).await {
                AuthOutcome::Authenticated(principal) => {
                    tracing::debug!(
                        principal = %principal.name,
                        mechanism = mechanism.name(),
                        "Authenticated"
                    );
                    exchange
                        .security
                        .set_authenticated(principal, mechanism.name());
                    break;
                }
                AuthOutcome::Declined => continue,
                AuthOutcome::Rejected(reason) => {
                    return SecurityOutcome::Rejected {
                        mechanism: mechanism.name().to_string(),
                        reason,
                    };
                }
            }
        }

        if !set.predicates.iter().all(|p| p.check(&exchange.request)) {
            return SecurityOutcome::Forbidden;
        }

        let authorizers: Vec<_> = set.authorizers.iter().filter(|a| a.is_enabled()).collect();

        if !exchange.security.is_authenticated() {
            let required = authorizers.is_empty()
                || authorizers
                    .iter()
                    .any(|a| a.instance().authentication_required(&exchange.request));
            if required {
                return SecurityOutcome::AuthRequired(challenges(&set));
            }
        }

        let mut allowed = false;
        for authorizer in authorizers {
            match authorizer
                .instance()
                .authorize(&exchange.request, &exchange.security)
                .await
            {
                Verdict::Allow => {
                    exchange.security.grant(authorizer.name());
                    allowed = true;
                    break;
                }
                Verdict::Deny(reason) => {
                    tracing::debug!(authorizer = authorizer.name(), %reason, "Authorizer denied");
                }
                Verdict::Abstain => {}
            }
        }

        if !allowed {
            return if exchange.security.is_authenticated() {
                SecurityOutcome::Forbidden
            } else {
                SecurityOutcome::AuthRequired(challenges(&set))
            };
        }

        if let Some(tokens) = &set.token_manager {
            let token = exchange
                .security
                .principal()
                .and_then(|p| p.token.clone());
            if let Some(refreshed) = token.and_then(|t| tokens.refresh(&t)) {
                refreshed.inject(&mut exchange.response);
            }
        }

        SecurityOutcome::Allowed
    }
}

/// Evaluator for unsecured routes.
///
/// Mechanisms still run so a handler can see who is calling, but their
/// outcome never blocks the request.
pub struct OpenEvaluator {
    tables: Arc<SecurityTables>,
    authorizer: FullAuthorizer,
}

impl OpenEvaluator {
    async fn evaluate(&self, exchange: &mut Exchange) -> SecurityOutcome {
        let set = self.tables.load();
        for mechanism in set.mechanisms.iter().filter(|m| m.is_enabled()) {
            if let AuthOutcome::Authenticated(principal) =
                mechanism.instance().authenticate(&exchange.request).await
            {
                exchange
                    .security
                    .set_authenticated(principal, mechanism.name());
                break;
            }
        }

        match self
            .authorizer
            .authorize(&exchange.request, &exchange.security)
            .await
        {
            Verdict::Allow => SecurityOutcome::Allowed,
            _ => SecurityOutcome::Forbidden,
        }
    }
}

/// The security unit of one pipeline.
pub enum SecurityEvaluator {
    Secured(SecuredEvaluator),
    Open(OpenEvaluator),
}

impl SecurityEvaluator {
    /// Full authentication and authorization.
    pub fn secured(tables: Arc<SecurityTables>) -> Self {
        Self::Secured(SecuredEvaluator { tables })
    }

    /// Always allows.
    pub fn open(tables: Arc<SecurityTables>) -> Self {
        Self::Open(OpenEvaluator {
            tables,
            authorizer: FullAuthorizer::new(false),
        })
    }

    pub fn is_secured(&self) -> bool {
        matches!(self, Self::Secured(_))
    }

    pub async fn evaluate(&self, exchange: &mut Exchange) -> SecurityOutcome {
        let outcome = match self {
            Self::Secured(evaluator) => evaluator.evaluate(exchange).await,
            Self::Open(evaluator) => evaluator.evaluate(exchange).await,
        };
        metrics::record_security_decision(outcome.label());
        outcome
    }
}

fn challenges(set: &SecuritySet) -> Vec<String> {
    set.mechanisms
        .iter()
        .filter(|m| m.is_enabled())
        .filter_map(|m| m.instance().challenge())
        .collect()
}
