//! Pipeline assembly.
//!
//! # Design Decisions
//! - The stage order is fixed; only the security evaluator variant and the
//!   service differ between pipelines
//! - A pipeline is built whole and never patched; re-registration builds a
//!   new one and swaps the binding

use std::sync::Arc;

use axum::http::HeaderName;

use super::info::{PipelineInfo, PipelineKind};
use super::interceptors::{InterceptorChain, InterceptorTable};
use super::stages::{
    CorsStage, EncodingHandler, ExchangeInitializer, InterceptorStage, PipelineInfoInjector,
    RequestLogger, ResponseSender, SecurityStage, Stage, TracingStage,
};
use super::Pipeline;
use crate::config::{CorsConfig, EncodingConfig, GatewayConfig, LimitsConfig, TracingConfig};
use crate::observability::tracing::parse_trace_headers;
use crate::plugins::{InterceptPoint, PluginRecord, Service};
use crate::routing::matcher::normalize;
use crate::routing::MatchPolicy;
use crate::security::{SecurityEvaluator, SecurityTables};

/// Cross-cutting settings shared by every pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_body_size: usize,
    pub cors: Arc<CorsConfig>,
    pub trace_headers: Arc<Vec<HeaderName>>,
    pub encoding: EncodingConfig,
}

impl PipelineSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_body_size: config.limits.max_body_size,
            cors: Arc::new(config.cors.clone()),
            trace_headers: Arc::new(parse_trace_headers(&config.tracing.headers)),
            encoding: config.encoding.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_body_size: LimitsConfig::default().max_body_size,
            cors: Arc::new(CorsConfig::default()),
            trace_headers: Arc::new(parse_trace_headers(&TracingConfig::default().headers)),
            encoding: EncodingConfig::default(),
        }
    }
}

/// Builds service pipelines.
pub struct PipelineBuilder {
    settings: PipelineSettings,
    interceptors: Arc<InterceptorTable>,
    security: Arc<SecurityTables>,
}

impl PipelineBuilder {
    pub fn new(
        settings: PipelineSettings,
        interceptors: Arc<InterceptorTable>,
        security: Arc<SecurityTables>,
    ) -> Self {
        Self {
            settings,
            interceptors,
            security,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn build(
        &self,
        service: Arc<PluginRecord<dyn Service>>,
        uri: &str,
        policy: MatchPolicy,
        secured: bool,
    ) -> Pipeline {
        let info = Arc::new(PipelineInfo {
            kind: PipelineKind::Service,
            path: normalize(uri),
            match_policy: policy,
            service_name: service.name().to_string(),
            secured,
            dont_intercept: service.descriptor().dont_intercept.clone(),
            request_content: service.instance().request_content(),
            response_content: service.instance().response_content(),
        });

        let evaluator = if secured {
            SecurityEvaluator::secured(self.security.clone())
        } else {
            SecurityEvaluator::open(self.security.clone())
        };

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(PipelineInfoInjector { info: info.clone() }),
            Box::new(TracingStage {
                headers: self.settings.trace_headers.clone(),
            }),
            Box::new(RequestLogger),
            Box::new(ExchangeInitializer {
                content: info.request_content,
            }),
            Box::new(CorsStage {
                config: self.settings.cors.clone(),
            }),
            Box::new(self.interceptor_stage(InterceptPoint::RequestBeforeAuth)),
            Box::new(SecurityStage { evaluator }),
            Box::new(self.interceptor_stage(InterceptPoint::RequestAfterAuth)),
            Box::new(EncodingHandler {
                service,
                encoding_enabled: self.settings.encoding.enabled,
            }),
            Box::new(self.interceptor_stage(InterceptPoint::Response)),
        ];

        tracing::debug!(
            service = %info.service_name,
            path = %info.path,
            policy = %info.match_policy,
            secured,
            "Pipeline built"
        );

        Pipeline::new(
            info,
            stages,
            ResponseSender {
                encoding: self.settings.encoding.clone(),
            },
        )
    }

    fn interceptor_stage(&self, point: InterceptPoint) -> InterceptorStage {
        InterceptorStage {
            chain: InterceptorChain::new(point, self.interceptors.clone()),
        }
    }
}
