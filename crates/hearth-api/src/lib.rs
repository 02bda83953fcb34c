//! # hearth-api
//!
//! REST API layer for Hearth. Authenticates callers, gates every server and
//! channel route on the resolver's decision, and serves the role, member and
//! override management endpoints.

pub mod access;
pub mod auth;
pub mod middleware;
pub mod routes;

use axum::Router;
use hearth_common::config::LimitsConfig;
use hearth_db::RecordStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Record storage; Postgres in deployments, in-memory for tests and `--memory`.
    pub store: Arc<dyn RecordStore>,
    /// HS256 secret access tokens are verified with.
    pub jwt_secret: String,
    pub limits: LimitsConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, jwt_secret: impl Into<String>, limits: LimitsConfig) -> Self {
        Self {
            store,
            jwt_secret: jwt_secret.into(),
            limits,
            started_at: Instant::now(),
        }
    }
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let api_routes = Router::new()
        .merge(routes::permissions::router(&state))
        .merge(routes::overrides::router(&state))
        .merge(routes::roles::router(&state))
        .merge(routes::members::router(&state))
        .merge(routes::health::router());

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
