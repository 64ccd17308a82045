//! Admin API: inspect and manage the live registry.
//!
//! Served on its own listener, guarded by a bearer API key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::plugins::PluginRegistry;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<PluginRegistry>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/_admin/status", get(get_status))
        .route("/_admin/plugins", get(get_plugins))
        .route("/_admin/bindings", get(get_bindings))
        .route("/_admin/services/{name}", delete(delete_service))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
