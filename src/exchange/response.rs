//! In-flight response.
//!
//! # Responsibilities
//! - Hold status, headers and structured content until emission
//! - Record the negotiated content encoding
//! - Render gateway errors as JSON bodies
//!
//! # Design Decisions
//! - Content stays structured until the emission stage, so response
//!   interceptors work on the real payload, not on encoded bytes

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::{json, Value};

use super::content::Payload;
use crate::error::GatewayError;

/// Content coding applied at emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

/// The response side of an exchange.
#[derive(Debug)]
pub struct ServiceResponse {
    status: StatusCode,
    headers: HeaderMap,
    content: Payload,
    content_type: Option<String>,
    encoding: Option<Encoding>,
    in_error: bool,
}

impl ServiceResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            content: Payload::Empty,
            content_type: None,
            encoding: None,
            in_error: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, ignoring values that are not valid header text.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }

    pub fn content(&self) -> &Payload {
        &self.content
    }

    pub fn set_content(&mut self, content: Payload) {
        self.content = content;
    }

    pub fn set_json(&mut self, value: Value) {
        self.content = Payload::Json(value);
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.content = Payload::Text(text.into());
    }

    /// Explicit `Content-Type`, overriding the payload default.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .or_else(|| self.content.content_type())
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    pub(crate) fn set_encoding(&mut self, encoding: Option<Encoding>) {
        self.encoding = encoding;
    }

    pub fn is_in_error(&self) -> bool {
        self.in_error
    }

    /// Turn this response into an error response for `err`.
    pub fn set_error(&mut self, err: &GatewayError) {
        self.in_error = true;
        self.status = err.status();
        self.content_type = None;
        self.content = Payload::Json(json!({
            "status": self.status.as_u16(),
            "message": err.client_message(),
        }));
        if let GatewayError::AuthRequired { challenges } = err {
            for challenge in challenges {
                if let Ok(value) = HeaderValue::from_str(challenge) {
                    self.headers.append(axum::http::header::WWW_AUTHENTICATE, value);
                }
            }
        }
    }
}

impl Default for ServiceResponse {
    fn default() -> Self {
        Self::new()
    }
}
