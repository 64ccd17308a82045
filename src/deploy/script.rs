//! Script loading.
//!
//! A script file becomes a [`ScriptService`]: a handler plus the binding it
//! asks for. The loader is the only part that knows the script format;
//! custom formats plug in through [`ScriptLoader`].
//!
//! The built-in [`DeclarativeScriptLoader`] reads TOML scripts:
//!
//! ```toml
//! name = "hello"
//! uri = "/hello"            # default "/<name>"
//! match_policy = "exact"    # default "prefix"
//! secured = false           # default true
//! description = "Says hello"
//!
//! [response]
//! status = 200
//! content_type = "text/plain"
//! body = "hello"            # strings are sent as text, anything else as JSON
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::exchange::{Exchange, Payload};
use crate::plugins::Service;
use crate::routing::MatchPolicy;

/// A handler built from a script, with its requested binding.
#[derive(Clone)]
pub struct ScriptService {
    pub name: String,
    pub uri: String,
    pub match_policy: MatchPolicy,
    pub secured: bool,
    pub description: String,
    pub service: Arc<dyn Service>,
}

impl std::fmt::Debug for ScriptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptService")
            .field("name", &self.name)
            .field("uri", &self.uri)
            .field("match_policy", &self.match_policy)
            .field("secured", &self.secured)
            .finish()
    }
}

/// Turns script files into services.
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    /// Whether `path` is a script this loader handles.
    fn recognizes(&self, path: &Path) -> bool;

    async fn load(&self, path: &Path) -> Result<ScriptService, GatewayError>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    name: String,
    uri: Option<String>,
    #[serde(default = "default_match_policy")]
    match_policy: MatchPolicy,
    #[serde(default = "default_secured")]
    secured: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    response: ResponseSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResponseSpec {
    status: Option<u16>,
    content_type: Option<String>,
    body: Option<Value>,
}

fn default_match_policy() -> MatchPolicy {
    MatchPolicy::Prefix
}

fn default_secured() -> bool {
    true
}

/// Loader for TOML scripts declaring a static response.
#[derive(Debug, Clone)]
pub struct DeclarativeScriptLoader {
    extension: String,
}

impl DeclarativeScriptLoader {
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Parse script text. `path` is only used in errors.
    pub fn parse(&self, path: &Path, text: &str) -> Result<ScriptService, GatewayError> {
        let fail = |reason: String| GatewayError::Deploy {
            path: path.to_path_buf(),
            reason,
        };

        let script: ScriptFile = toml::from_str(text).map_err(|e| fail(e.to_string()))?;
        if script.name.trim().is_empty() {
            return Err(fail("script name is empty".into()));
        }
        let uri = script.uri.unwrap_or_else(|| format!("/{}", script.name));
        if !uri.starts_with('/') {
            return Err(fail(format!("uri '{uri}' must start with '/'")));
        }
        let status = match script.response.status {
            Some(code) => StatusCode::from_u16(code)
                .map_err(|_| fail(format!("invalid response status {code}")))?,
            None => StatusCode::OK,
        };
        let content = match script.response.body {
            None => Payload::Empty,
            Some(Value::String(text)) => Payload::Text(text),
            Some(value) => Payload::Json(value),
        };

        Ok(ScriptService {
            service: Arc::new(StaticService {
                status,
                content_type: script.response.content_type,
                content,
            }),
            name: script.name,
            uri,
            match_policy: script.match_policy,
            secured: script.secured,
            description: script.description,
        })
    }
}

impl Default for DeclarativeScriptLoader {
    fn default() -> Self {
        Self::new("toml")
    }
}

#[async_trait]
impl ScriptLoader for DeclarativeScriptLoader {
    fn recognizes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension)
    }

    async fn load(&self, path: &Path) -> Result<ScriptService, GatewayError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Deploy {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.parse(path, &text)
    }
}

/// Service answering every request with the same response.
#[derive(Debug)]
pub struct StaticService {
    status: StatusCode,
    content_type: Option<String>,
    content: Payload,
}

#[async_trait]
impl Service for StaticService {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        exchange.response.set_status(self.status);
        exchange.response.set_content(self.content.clone());
        if let Some(content_type) = &self.content_type {
            exchange.response.set_content_type(content_type.clone());
        }
        Ok(())
    }
}
