//! Trace context propagation.
//!
//! # Responsibilities
//! - Pick the configured trace headers off incoming requests
//! - Echo them on the response so callers can correlate
//!
//! # Design Decisions
//! - Header names are parsed once, when the pipeline is built
//! - Only headers present on the request are echoed; nothing is invented

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Parse configured header names, dropping invalid ones with a warning.
pub fn parse_trace_headers(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .filter_map(|name| match HeaderName::try_from(name.as_str()) {
            Ok(header) => Some(header),
            Err(_) => {
                tracing::warn!(header = %name, "Ignoring invalid trace header name");
                None
            }
        })
        .collect()
}

/// The trace headers present in `headers`.
pub fn extract(headers: &HeaderMap, names: &[HeaderName]) -> Vec<(HeaderName, HeaderValue)> {
    names
        .iter()
        .filter_map(|name| headers.get(name).map(|v| (name.clone(), v.clone())))
        .collect()
}
