//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange (from the transport adapter):
//!     → pipeline_info → tracing → request_logger → exchange_init → cors
//!     → request_before_auth interceptors
//!     → security (secured or open evaluator)
//!     → request_after_auth interceptors
//!     → service (content-encoding negotiation + handler)
//!     → response interceptors
//!     → ResponseSender (always)
//! ```
//!
//! # Design Decisions
//! - A halt or an error skips every remaining stage; emission always runs
//! - Errors are rendered into the response here and never escape
//! - Dropping the future of `execute` aborts the remaining stages of that
//!   request only

pub mod builder;
pub mod info;
pub mod interceptors;
pub mod stages;

use std::sync::Arc;

use axum::response::Response;
use axum::http::StatusCode;
use tracing::Instrument;

use crate::exchange::Exchange;

pub use builder::{PipelineBuilder, PipelineSettings};
pub use info::{PipelineInfo, PipelineKind};
pub use interceptors::{InterceptorChain, InterceptorEntry, InterceptorTable};
pub use stages::{Flow, ResponseSender, Stage};

/// The stage chain bound to one URI.
pub struct Pipeline {
    info: Arc<PipelineInfo>,
    stages: Vec<Box<dyn Stage>>,
    sender: ResponseSender,
}

impl Pipeline {
    pub fn new(info: Arc<PipelineInfo>, stages: Vec<Box<dyn Stage>>, sender: ResponseSender) -> Self {
        Self {
            info,
            stages,
            sender,
        }
    }

    pub fn info(&self) -> &Arc<PipelineInfo> {
        &self.info
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the exchange through every stage and render the response.
    pub async fn execute(&self, mut exchange: Exchange) -> Response {
        let span = tracing::info_span!(
            "pipeline",
            service = %self.info.service_name,
            path = %exchange.request.path(),
            request_id = %exchange.request_id(),
        );

        async move {
            self.run(&mut exchange).await;
            self.sender.send(exchange, &self.info)
        }
        .instrument(span)
        .await
    }

    /// Run the stages without emitting.
    pub async fn run(&self, exchange: &mut Exchange) {
        for stage in &self.stages {
            match stage.run(exchange).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    tracing::debug!(stage = stage.name(), "Pipeline halted");
                    return;
                }
                Err(e) => {
                    if e.status() == StatusCode::INTERNAL_SERVER_ERROR {
                        tracing::error!(stage = stage.name(), error = %e, "Request failed");
                    } else {
                        tracing::debug!(stage = stage.name(), error = %e, "Request rejected");
                    }
                    exchange.response.set_error(&e);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::plugins::{Interceptor, InterceptPoint, PluginDescriptor, PluginRecord, Service};
    use crate::security::SecurityTables;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl Service for Echo {
        async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
            exchange.response.set_text("hello");
            Ok(())
        }
    }

    struct Log(Arc<Mutex<Vec<String>>>, &'static str);

    #[async_trait]
    impl Interceptor for Log {
        async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
            let status = exchange.response.status().as_u16();
            self.0.lock().unwrap().push(format!("{}:{}", self.1, status));
            Ok(Flow::Continue)
        }
    }

    fn builder(interceptors: Arc<InterceptorTable>) -> PipelineBuilder {
        PipelineBuilder::new(
            PipelineSettings::default(),
            interceptors,
            Arc::new(SecurityTables::default()),
        )
    }

    fn echo() -> Arc<PluginRecord<dyn Service>> {
        let instance: Arc<dyn Service> = Arc::new(Echo);
        Arc::new(PluginRecord::named("echo", instance))
    }

    fn request() -> Exchange {
        Exchange::new(Request::builder().uri("/echo").body(Body::empty()).unwrap(), 1024)
    }

    #[test]
    fn test_fixed_stage_order() {
        let pipeline = builder(Arc::new(InterceptorTable::new())).build(
            echo(),
            "/echo",
            crate::routing::MatchPolicy::Prefix,
            true,
        );
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "pipeline_info",
                "tracing",
                "request_logger",
                "exchange_init",
                "cors",
                "request_before_auth",
                "security",
                "request_after_auth",
                "service",
                "response",
            ]
        );
        assert!(pipeline.info().secured);
        assert_eq!(pipeline.info().service_name, "echo");
    }

    #[tokio::test]
    async fn test_secured_route_without_security_plugins_is_closed() {
        let pipeline = builder(Arc::new(InterceptorTable::new())).build(
            echo(),
            "/echo",
            crate::routing::MatchPolicy::Prefix,
            true,
        );
        let response = pipeline.execute(request()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_open_route_runs_all_points() {
        let table = Arc::new(InterceptorTable::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        for (name, point) in [
            ("before", InterceptPoint::RequestBeforeAuth),
            ("after", InterceptPoint::RequestAfterAuth),
            ("response", InterceptPoint::Response),
        ] {
            let instance: Arc<dyn Interceptor> = Arc::new(Log(log.clone(), name));
            let descriptor = PluginDescriptor::new(name).intercept_at(point);
            table
                .insert(Arc::new(PluginRecord::new(
                    Arc::new(descriptor),
                    instance,
                    Default::default(),
                )))
                .unwrap();
        }

        let pipeline = builder(table).build(
            echo(),
            "/echo",
            crate::routing::MatchPolicy::Prefix,
            false,
        );
        let response = pipeline.execute(request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:200", "after:200", "response:200"]
        );
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }
}
