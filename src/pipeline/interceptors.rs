//! Interceptor table and chain execution.
//!
//! # Responsibilities
//! - Hold registered interceptors per interception point, pre-sorted
//! - Select the interceptors applicable to one exchange
//! - Materialize the request body before any interceptor that needs it
//! - Run the selection in order, stopping at a halt or a failure
//!
//! # Design Decisions
//! - The table is a copy-on-write snapshot, sorted at write time by
//!   (priority, registration order); dispatch never sorts
//! - Interceptor metadata is cached in the entry; the service opt-out set
//!   is cached in `PipelineInfo`
//! - A failing interceptor aborts its chain and fails the request

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use super::stages::Flow;
use crate::error::GatewayError;
use crate::exchange::{ContentKind, Exchange};
use crate::observability::metrics;
use crate::plugins::{Interceptor, InterceptorDescriptor, InterceptPoint, PluginRecord};

/// A registered interceptor with its cached metadata.
pub struct InterceptorEntry {
    pub record: Arc<PluginRecord<dyn Interceptor>>,
    pub meta: InterceptorDescriptor,
    seq: u64,
}

impl InterceptorEntry {
    pub fn name(&self) -> &str {
        self.record.name()
    }
}

#[derive(Default, Clone)]
pub struct InterceptorSnapshot {
    by_point: HashMap<InterceptPoint, Vec<Arc<InterceptorEntry>>>,
}

impl InterceptorSnapshot {
    /// Interceptors at `point`, in execution order.
    pub fn at(&self, point: InterceptPoint) -> &[Arc<InterceptorEntry>] {
        self.by_point.get(&point).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// All registered interceptors.
#[derive(Default)]
pub struct InterceptorTable {
    current: ArcSwap<InterceptorSnapshot>,
    writer: Mutex<()>,
    seq: AtomicU64,
}

impl InterceptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor. Names are unique.
    pub fn insert(&self, record: Arc<PluginRecord<dyn Interceptor>>) -> Result<(), GatewayError> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = InterceptorSnapshot::clone(&self.current.load_full());

        if next
            .by_point
            .values()
            .flatten()
            .any(|e| e.name() == record.name())
        {
            return Err(GatewayError::Config(format!(
                "interceptor '{}' is already registered",
                record.name()
            )));
        }

        let meta = record.descriptor().interceptor();
        let entry = Arc::new(InterceptorEntry {
            record,
            meta,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        });
        let chain = next.by_point.entry(entry.meta.point).or_default();
        chain.push(entry);
        chain.sort_by_key(|e| (e.meta.priority, e.seq));

        self.current.store(Arc::new(next));
        Ok(())
    }

    /// Remove an interceptor by name.
    pub fn remove(&self, name: &str) -> Option<Arc<InterceptorEntry>> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = InterceptorSnapshot::clone(&self.current.load_full());

        let mut removed = None;
        for chain in next.by_point.values_mut() {
            if let Some(idx) = chain.iter().position(|e| e.name() == name) {
                removed = Some(chain.remove(idx));
            }
        }
        if removed.is_some() {
            self.current.store(Arc::new(next));
        }
        removed
    }

    pub fn snapshot(&self) -> Arc<InterceptorSnapshot> {
        self.current.load_full()
    }

    /// Every interceptor, grouped by point in pipeline order.
    pub fn entries(&self) -> Vec<Arc<InterceptorEntry>> {
        let snapshot = self.snapshot();
        [
            InterceptPoint::RequestBeforeAuth,
            InterceptPoint::RequestAfterAuth,
            InterceptPoint::Response,
        ]
        .into_iter()
        .flat_map(|point| snapshot.at(point).to_vec())
        .collect()
    }

    pub fn clear(&self) {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        self.current.store(Arc::new(InterceptorSnapshot::default()));
    }
}

/// Runs the interceptors of one point.
pub struct InterceptorChain {
    point: InterceptPoint,
    table: Arc<InterceptorTable>,
}

impl InterceptorChain {
    pub fn new(point: InterceptPoint, table: Arc<InterceptorTable>) -> Self {
        Self { point, table }
    }

    pub fn point(&self) -> InterceptPoint {
        self.point
    }

    /// Interceptors that would run for `exchange`, in order.
    pub fn select(&self, exchange: &Exchange) -> Vec<Arc<InterceptorEntry>> {
        let kind = match exchange.pipeline_info() {
            Some(info) if !info.intercepts(self.point) => return Vec::new(),
            Some(info) => info.content_at(self.point),
            None if self.point.is_request() => exchange.request.kind(),
            None => ContentKind::Raw,
        };

        self.table
            .snapshot()
            .at(self.point)
            .iter()
            .filter(|e| e.record.is_enabled())
            .filter(|e| e.meta.accepts(kind))
            .filter(|e| e.record.instance().resolve(exchange))
            .cloned()
            .collect()
    }

    pub async fn run(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        let selected = self.select(exchange);
        if selected.is_empty() {
            return Ok(Flow::Continue);
        }

        if self.point.is_request() && selected.iter().any(|e| e.meta.requires_content) {
            exchange.request.materialize().await?;
        }

        for entry in selected {
            match entry.record.instance().handle(exchange).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    tracing::debug!(
                        interceptor = entry.name(),
                        point = %self.point,
                        "Interceptor produced the response"
                    );
                    return Ok(Flow::Halt);
                }
                Err(e) => {
                    metrics::record_interceptor_failure(entry.name(), self.point.as_str());
                    return Err(GatewayError::InterceptorFailure {
                        interceptor: entry.name().to_string(),
                        point: self.point,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Flow::Continue)
    }
}
