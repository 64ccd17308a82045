//! In-flight request with a lazily materialized body.
//!
//! # Responsibilities
//! - Expose path, method, headers of the parsed request
//! - Hold the body as a pending stream until someone needs it
//! - Materialize the body once, per the declared content kind
//!
//! # Design Decisions
//! - A body is consumed at most once: either streamed or buffered
//! - Buffering is bounded by the configured body limit
//! - A decode failure flags the request in error and is returned to the caller
//! - The pending body sits behind a mutex so `&ServiceRequest` is `Send`
//!   across await points (the body stream itself is not `Sync`)

use std::sync::Mutex;

use axum::body::Body;
use axum::http::{header, request::Parts, Extensions, HeaderMap, Method, Request, Uri};

use super::content::{decode, ContentKind, Payload};
use crate::error::GatewayError;

#[derive(Debug)]
enum RequestContent {
    Pending(Mutex<Body>),
    Materialized(Payload),
    Consumed,
}

/// The request side of an exchange.
#[derive(Debug)]
pub struct ServiceRequest {
    parts: Parts,
    content: RequestContent,
    kind: ContentKind,
    max_body_size: usize,
    in_error: bool,
}

impl ServiceRequest {
    /// Wrap a transport request. The body stays unread.
    pub fn new(request: Request<Body>, max_body_size: usize) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            content: RequestContent::Pending(Mutex::new(body)),
            kind: ContentKind::Raw,
            max_body_size,
            in_error: false,
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Content kind declared by the handling service.
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: ContentKind) {
        self.kind = kind;
    }

    pub fn is_in_error(&self) -> bool {
        self.in_error
    }

    pub fn set_in_error(&mut self, in_error: bool) {
        self.in_error = in_error;
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.content, RequestContent::Materialized(_))
    }

    /// Read and decode the body. Idempotent once it succeeded.
    pub async fn materialize(&mut self) -> Result<(), GatewayError> {
        let body = match std::mem::replace(&mut self.content, RequestContent::Consumed) {
            RequestContent::Pending(body) => into_body(body),
            RequestContent::Materialized(payload) => {
                self.content = RequestContent::Materialized(payload);
                return Ok(());
            }
            RequestContent::Consumed => {
                self.in_error = true;
                return Err(GatewayError::ContentMaterialization(
                    "request body already consumed".into(),
                ));
            }
        };

        let raw = match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(raw) => raw,
            Err(e) => {
                self.in_error = true;
                return Err(GatewayError::ContentMaterialization(format!(
                    "failed to read body: {e}"
                )));
            }
        };

        match decode(self.kind, self.content_type(), raw) {
            Ok(payload) => {
                self.content = RequestContent::Materialized(payload);
                Ok(())
            }
            Err(e) => {
                self.in_error = true;
                Err(e)
            }
        }
    }

    /// The decoded body, materializing it first if needed.
    pub async fn content(&mut self) -> Result<&Payload, GatewayError> {
        self.materialize().await?;
        match &self.content {
            RequestContent::Materialized(payload) => Ok(payload),
            _ => Err(GatewayError::ContentMaterialization(
                "request body unavailable".into(),
            )),
        }
    }

    /// The decoded body if it was already materialized.
    pub fn payload(&self) -> Option<&Payload> {
        match &self.content {
            RequestContent::Materialized(payload) => Some(payload),
            _ => None,
        }
    }

    /// Replace the body content (used by interceptors that rewrite requests).
    pub fn set_payload(&mut self, payload: Payload) {
        self.content = RequestContent::Materialized(payload);
    }

    /// Take the body as a stream. A materialized body is re-encoded.
    pub fn take_stream(&mut self) -> Option<Body> {
        match std::mem::replace(&mut self.content, RequestContent::Consumed) {
            RequestContent::Pending(body) => Some(into_body(body)),
            RequestContent::Materialized(payload) => {
                let body = Body::from(payload.to_bytes());
                self.content = RequestContent::Materialized(payload);
                Some(body)
            }
            RequestContent::Consumed => None,
        }
    }
}

fn into_body(body: Mutex<Body>) -> Body {
    body.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
}
