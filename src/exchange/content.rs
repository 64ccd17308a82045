//! Typed request and response content.
//!
//! # Responsibilities
//! - Declare the content kinds a service consumes
//! - Decode a buffered body into its structural form
//!
//! # Design Decisions
//! - Decoding is all-or-nothing: failure marks the request in error, it
//!   never degrades to an empty body
//! - GraphQL requests accept `application/graphql` (wrapped as a query
//!   document) or `application/json`; anything else is unsupported

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::GatewayError;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const GRAPHQL_CONTENT_TYPE: &str = "application/graphql";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// The structural form a request body is converted into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Opaque bytes; the handler may stream them.
    #[default]
    Raw,
    /// UTF-8 text.
    Text,
    /// A JSON document.
    Json,
    /// A GraphQL request document (`query`, `operationName`, `variables`).
    #[serde(rename = "graphql")]
    GraphQl,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Raw => "raw",
            Self::Text => "text",
            Self::Json => "json",
            Self::GraphQl => "graphql",
        };
        f.write_str(name)
    }
}

/// Materialized content.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Bytes(Bytes),
    Text(String),
    Json(Value),
}

impl Payload {
    /// Default `Content-Type` for this payload.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Bytes(_) => Some("application/octet-stream"),
            Self::Text(_) => Some(TEXT_CONTENT_TYPE),
            Self::Json(_) => Some(JSON_CONTENT_TYPE),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Serialized wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Bytes(bytes) => bytes.clone(),
            Self::Text(text) => Bytes::from(text.clone()),
            Self::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

/// Decode a fully buffered body according to `kind`.
pub fn decode(kind: ContentKind, content_type: Option<&str>, raw: Bytes) -> Result<Payload, GatewayError> {
    match kind {
        ContentKind::Raw if raw.is_empty() => Ok(Payload::Empty),
        ContentKind::Raw => Ok(Payload::Bytes(raw)),
        ContentKind::Text => utf8(raw).map(|text| {
            if text.is_empty() {
                Payload::Empty
            } else {
                Payload::Text(text)
            }
        }),
        ContentKind::Json => parse_json(raw),
        ContentKind::GraphQl => decode_graphql(content_type, raw),
    }
}

fn utf8(raw: Bytes) -> Result<String, GatewayError> {
    String::from_utf8(raw.to_vec())
        .map_err(|e| GatewayError::ContentMaterialization(format!("body is not valid UTF-8: {e}")))
}

fn parse_json(raw: Bytes) -> Result<Payload, GatewayError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::Empty);
    }
    serde_json::from_slice(&raw)
        .map(Payload::Json)
        .map_err(|e| GatewayError::ContentMaterialization(format!("invalid JSON: {e}")))
}

fn decode_graphql(content_type: Option<&str>, raw: Bytes) -> Result<Payload, GatewayError> {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match media_type.as_deref() {
        Some(GRAPHQL_CONTENT_TYPE) => Ok(Payload::Json(json!({ "query": utf8(raw)? }))),
        Some(JSON_CONTENT_TYPE) => match parse_json(raw)? {
            Payload::Json(doc) if doc.is_object() => Ok(Payload::Json(doc)),
            _ => Err(GatewayError::ContentMaterialization(
                "GraphQL request must be a JSON object".into(),
            )),
        },
        other => Err(GatewayError::ContentMaterialization(format!(
            "unsupported content type for GraphQL: {}",
            other.unwrap_or("none")
        ))),
    }
}
