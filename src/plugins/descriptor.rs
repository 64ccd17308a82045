//! Plugin descriptors.
//!
//! A descriptor is the declared metadata of a plugin: name, default URI,
//! interception point, priority and so on. It is built once, validated at
//! registration, and never re-derived on the request path.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::exchange::ContentKind;
use crate::routing::MatchPolicy;

/// Where in the pipeline an interceptor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptPoint {
    RequestBeforeAuth,
    RequestAfterAuth,
    Response,
}

impl InterceptPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestBeforeAuth => "request_before_auth",
            Self::RequestAfterAuth => "request_after_auth",
            Self::Response => "response",
        }
    }

    /// Whether this point runs before the service handler.
    pub fn is_request(&self) -> bool {
        !matches!(self, Self::Response)
    }
}

impl std::fmt::Display for InterceptPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an initializer runs relative to server startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPoint {
    BeforeStartup,
    AfterStartup,
}

/// Cached interceptor metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorDescriptor {
    pub point: InterceptPoint,
    pub requires_content: bool,
    /// Lower runs first.
    pub priority: i32,
    /// Content kind the interceptor understands; `None` means any.
    pub content: Option<ContentKind>,
}

impl InterceptorDescriptor {
    /// Whether this interceptor can handle a pipeline producing `kind`.
    pub fn accepts(&self, kind: ContentKind) -> bool {
        self.content.map_or(true, |declared| declared == kind)
    }
}

/// Declared metadata of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: String,
    pub enabled_by_default: bool,
    pub default_uri: Option<String>,
    pub match_policy: MatchPolicy,
    pub secured: bool,
    pub dont_intercept: BTreeSet<InterceptPoint>,
    pub intercept_point: InterceptPoint,
    pub priority: i32,
    pub requires_content: bool,
    pub content: Option<ContentKind>,
    pub init_point: InitPoint,
}

impl PluginDescriptor {
    /// A descriptor with defaults: enabled, prefix match, secured,
    /// after-auth interception at priority 10, after-startup init.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled_by_default: true,
            default_uri: None,
            match_policy: MatchPolicy::Prefix,
            secured: true,
            dont_intercept: BTreeSet::new(),
            intercept_point: InterceptPoint::RequestAfterAuth,
            priority: 10,
            requires_content: false,
            content: None,
            init_point: InitPoint::AfterStartup,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = enabled;
        self
    }

    pub fn with_default_uri(mut self, uri: impl Into<String>) -> Self {
        self.default_uri = Some(uri.into());
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    pub fn secured(mut self, secured: bool) -> Self {
        self.secured = secured;
        self
    }

    pub fn dont_intercept(mut self, point: InterceptPoint) -> Self {
        self.dont_intercept.insert(point);
        self
    }

    pub fn intercept_at(mut self, point: InterceptPoint) -> Self {
        self.intercept_point = point;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn requires_content(mut self, requires: bool) -> Self {
        self.requires_content = requires;
        self
    }

    pub fn with_content(mut self, kind: ContentKind) -> Self {
        self.content = Some(kind);
        self
    }

    pub fn init_at(mut self, point: InitPoint) -> Self {
        self.init_point = point;
        self
    }

    /// The URI a service binds to when configuration does not override it:
    /// the declared default, or `/<name>`.
    pub fn default_uri(&self) -> String {
        match &self.default_uri {
            Some(uri) if !uri.is_empty() => uri.clone(),
            _ => format!("/{}", self.name),
        }
    }

    pub fn interceptor(&self) -> InterceptorDescriptor {
        InterceptorDescriptor {
            point: self.intercept_point,
            requires_content: self.requires_content,
            priority: self.priority,
            content: self.content,
        }
    }

    /// Reject metadata that cannot be registered.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.name.trim().is_empty() {
            return Err(GatewayError::Config("plugin name must not be empty".into()));
        }
        if self.name.contains('/') {
            return Err(GatewayError::Config(format!(
                "plugin name '{}' must not contain '/'",
                self.name
            )));
        }
        if let Some(uri) = &self.default_uri {
            if !uri.is_empty() && !uri.starts_with('/') {
                return Err(GatewayError::Config(format!(
                    "default URI '{}' of plugin '{}' must start with '/'",
                    uri, self.name
                )));
            }
        }
        Ok(())
    }
}
