//! Pipeline stages.
//!
//! Each stage is one step of the fixed pipeline shape. A stage may let the
//! exchange continue, halt it with the response it has written, or fail it.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{
    ACCEPT_ENCODING, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_METHOD, CONTENT_ENCODING, CONTENT_TYPE, VARY,
};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use super::info::PipelineInfo;
use super::interceptors::InterceptorChain;
use crate::config::{CorsConfig, EncodingConfig};
use crate::error::GatewayError;
use crate::exchange::{ContentKind, Encoding, Exchange, X_REQUEST_ID};
use crate::observability::{metrics, tracing as trace_headers};
use crate::plugins::{PluginRecord, Service};
use crate::security::SecurityEvaluator;

/// What happens after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The response is final; skip to emission.
    Halt,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError>;
}

/// Attaches the pipeline metadata to the exchange.
pub struct PipelineInfoInjector {
    pub info: Arc<PipelineInfo>,
}

#[async_trait]
impl Stage for PipelineInfoInjector {
    fn name(&self) -> &'static str {
        "pipeline_info"
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        exchange.set_pipeline_info(self.info.clone());
        Ok(Flow::Continue)
    }
}

/// Echoes trace headers and the request id on the response.
pub struct TracingStage {
    pub headers: Arc<Vec<HeaderName>>,
}

#[async_trait]
impl Stage for TracingStage {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        for (name, value) in trace_headers::extract(exchange.request.headers(), &self.headers) {
            tracing::trace!(header = %name, value = ?value, "Trace header");
            exchange.response.headers_mut().insert(name, value);
        }
        if !exchange.response.headers().contains_key(X_REQUEST_ID) {
            let id = exchange.request_id().to_string();
            exchange
                .response
                .set_header(HeaderName::from_static(X_REQUEST_ID), &id);
        }
        Ok(Flow::Continue)
    }
}

pub struct RequestLogger;

#[async_trait]
impl Stage for RequestLogger {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        tracing::debug!(
            method = %exchange.request.method(),
            path = %exchange.request.path(),
            query = exchange.request.query().unwrap_or(""),
            "Request received"
        );
        Ok(Flow::Continue)
    }
}

/// Prepares the exchange for its service: declares the body content kind.
pub struct ExchangeInitializer {
    pub content: ContentKind,
}

#[async_trait]
impl Stage for ExchangeInitializer {
    fn name(&self) -> &'static str {
        "exchange_init"
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        exchange.request.set_kind(self.content);
        Ok(Flow::Continue)
    }
}

/// CORS headers and preflight answers.
pub struct CorsStage {
    pub config: Arc<CorsConfig>,
}

#[async_trait]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        if !self.config.enabled {
            return Ok(Flow::Continue);
        }

        let response = &mut exchange.response;
        response.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, &self.config.allow_origin);
        if !self.config.expose_headers.is_empty() {
            response.set_header(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                &self.config.expose_headers.join(", "),
            );
        }

        let preflight = exchange.request.method() == Method::OPTIONS
            && exchange
                .request
                .headers()
                .contains_key(ACCESS_CONTROL_REQUEST_METHOD);
        if !preflight {
            return Ok(Flow::Continue);
        }

        let response = &mut exchange.response;
        response.set_header(
            ACCESS_CONTROL_ALLOW_METHODS,
            &self.config.allow_methods.join(", "),
        );
        response.set_header(
            ACCESS_CONTROL_ALLOW_HEADERS,
            &self.config.allow_headers.join(", "),
        );
        response.set_header(ACCESS_CONTROL_MAX_AGE, &self.config.max_age_secs.to_string());
        response.set_status(StatusCode::NO_CONTENT);
        Ok(Flow::Halt)
    }
}

/// Runs the interceptor chain of one point.
pub struct InterceptorStage {
    pub chain: InterceptorChain,
}

#[async_trait]
impl Stage for InterceptorStage {
    fn name(&self) -> &'static str {
        self.chain.point().as_str()
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        self.chain.run(exchange).await
    }
}

pub struct SecurityStage {
    pub evaluator: SecurityEvaluator,
}

#[async_trait]
impl Stage for SecurityStage {
    fn name(&self) -> &'static str {
        "security"
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        self.evaluator.evaluate(exchange).await.into_result()?;
        Ok(Flow::Continue)
    }
}

/// Negotiates the response encoding, decodes a typed request body, then
/// calls the service.
pub struct EncodingHandler {
    pub service: Arc<PluginRecord<dyn Service>>,
    pub encoding_enabled: bool,
}

#[async_trait]
impl Stage for EncodingHandler {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        if self.encoding_enabled {
            let encoding = negotiate(exchange.request.header(ACCEPT_ENCODING));
            exchange.response.set_encoding(encoding);
        }

        if !self.service.is_enabled() {
            return Err(GatewayError::NotFound(exchange.request.path().to_string()));
        }

        // A service declaring a typed body only ever sees it decoded.
        if exchange.request.kind() != ContentKind::Raw {
            exchange.request.materialize().await?;
        }

        self.service.instance().handle(exchange).await?;
        Ok(Flow::Continue)
    }
}

/// Pick the preferred supported coding from an `Accept-Encoding` value.
pub fn negotiate(accept: Option<&str>) -> Option<Encoding> {
    let mut best: Option<(Encoding, f32)> = None;

    for item in accept?.split(',') {
        let mut params = item.split(';');
        let coding = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        let quality = params
            .find_map(|p| p.trim().strip_prefix("q="))
            .and_then(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if quality <= 0.0 {
            continue;
        }

        let encoding = match coding.as_str() {
            "gzip" | "x-gzip" | "*" => Encoding::Gzip,
            "deflate" => Encoding::Deflate,
            _ => continue,
        };
        if best.map_or(true, |(_, q)| quality > q) {
            best = Some((encoding, quality));
        }
    }

    best.map(|(encoding, _)| encoding)
}

/// Renders the exchange into the transport response.
pub struct ResponseSender {
    pub encoding: EncodingConfig,
}

impl ResponseSender {
    pub fn send(&self, mut exchange: Exchange, info: &PipelineInfo) -> Response {
        let status = exchange.response.status();
        let mut headers = std::mem::take(exchange.response.headers_mut());
        let mut body = if status == StatusCode::NO_CONTENT {
            bytes::Bytes::new()
        } else {
            exchange.response.content().to_bytes()
        };

        if let Some(content_type) = exchange.response.content_type() {
            if !body.is_empty() && !headers.contains_key(CONTENT_TYPE) {
                if let Ok(value) = HeaderValue::from_str(content_type) {
                    headers.insert(CONTENT_TYPE, value);
                }
            }
        }

        if let Some(encoding) = exchange.response.encoding() {
            if self.encoding.enabled
                && body.len() >= self.encoding.min_size
                && !headers.contains_key(CONTENT_ENCODING)
            {
                match compress(encoding, &body) {
                    Ok(compressed) => {
                        body = compressed.into();
                        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.as_str()));
                        headers.append(VARY, HeaderValue::from_static("accept-encoding"));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Compression failed, sending identity");
                    }
                }
            }
        }

        let elapsed = exchange.elapsed();
        tracing::debug!(
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            bytes = body.len(),
            "Response sent"
        );
        metrics::record_request(&info.service_name, status.as_u16(), elapsed);

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

fn compress(encoding: Encoding, data: &[u8]) -> std::io::Result<Vec<u8>> {
    match encoding {
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
    }
}
