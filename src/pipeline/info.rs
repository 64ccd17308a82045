//! Pipeline metadata.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::exchange::ContentKind;
use crate::plugins::InterceptPoint;
use crate::routing::MatchPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Service,
}

/// What is bound at a path. Computed once when the pipeline is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineInfo {
    pub kind: PipelineKind,
    pub path: String,
    pub match_policy: MatchPolicy,
    pub service_name: String,
    pub secured: bool,
    /// Interception points the service opted out of.
    pub dont_intercept: BTreeSet<InterceptPoint>,
    /// Content kind the service consumes.
    pub request_content: ContentKind,
    /// Content kind the service produces.
    pub response_content: ContentKind,
}

impl PipelineInfo {
    /// Whether interceptors at `point` may run for this pipeline.
    pub fn intercepts(&self, point: InterceptPoint) -> bool {
        !self.dont_intercept.contains(&point)
    }

    /// The content kind interceptors at `point` deal with.
    pub fn content_at(&self, point: InterceptPoint) -> ContentKind {
        if point.is_request() {
            self.request_content
        } else {
            self.response_content
        }
    }
}
