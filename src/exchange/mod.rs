//! Request/response exchange subsystem.
//!
//! # Data Flow
//! ```text
//! axum Request<Body> (parsed by the transport)
//!     → Exchange::new (body left unread)
//!     → pipeline stages mutate request/response/security
//!     → content.rs decodes the body on demand (or eagerly for interceptors)
//!     → response emission renders ServiceResponse into axum Response
//! ```
//!
//! # Design Decisions
//! - One `Exchange` per request, owned by the pipeline run; never shared
//! - The security context lives and dies with the exchange

pub mod content;
pub mod request;
pub mod response;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use uuid::Uuid;

use crate::pipeline::PipelineInfo;
use crate::security::SecurityContext;

pub use content::{ContentKind, Payload};
pub use request::ServiceRequest;
pub use response::{Encoding, ServiceResponse};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Everything one request carries through its pipeline.
#[derive(Debug)]
pub struct Exchange {
    pub request: ServiceRequest,
    pub response: ServiceResponse,
    pub security: SecurityContext,
    pipeline: Option<Arc<PipelineInfo>>,
    request_id: String,
    started: Instant,
}

impl Exchange {
    /// Create an exchange for a parsed transport request.
    pub fn new(request: Request<Body>, max_body_size: usize) -> Self {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request: ServiceRequest::new(request, max_body_size),
            response: ServiceResponse::new(),
            security: SecurityContext::default(),
            pipeline: None,
            request_id,
            started: Instant::now(),
        }
    }

    /// Metadata of the pipeline handling this exchange.
    pub fn pipeline_info(&self) -> Option<&Arc<PipelineInfo>> {
        self.pipeline.as_ref()
    }

    pub(crate) fn set_pipeline_info(&mut self, info: Arc<PipelineInfo>) {
        self.pipeline = Some(info);
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
