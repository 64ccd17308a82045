use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::AdminState;
use crate::pipeline::PipelineInfo;
use crate::plugins::{InterceptorSummary, ServiceSummary};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub bound_paths: usize,
}

#[derive(Serialize)]
pub struct PluginListing {
    pub services: Vec<ServiceSummary>,
    pub interceptors: Vec<InterceptorSummary>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        bound_paths: state.registry.bindings().len(),
    })
}

pub async fn get_plugins(State(state): State<AdminState>) -> Json<PluginListing> {
    Json(PluginListing {
        services: state.registry.services(),
        interceptors: state.registry.interceptors(),
    })
}

pub async fn get_bindings(State(state): State<AdminState>) -> Json<Vec<Arc<PipelineInfo>>> {
    let mut bindings = state.registry.bindings();
    bindings.sort_by(|a, b| a.path.cmp(&b.path));
    Json(bindings)
}

/// Unbind a live service by name.
pub async fn delete_service(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> StatusCode {
    match state.registry.unregister_service_named(&name) {
        Some(info) => {
            tracing::info!(service = %name, path = %info.path, "Service removed via admin API");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
