// ABOUTME: Dashboard HTTP API router.
// ABOUTME: JSON endpoints for modules, summaries, scans, uploads, and lifecycle actions.

pub mod handlers;
pub mod response;
pub mod upload;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use modhub_core::AggregationService;

use response::{cors, method_not_allowed, not_found};

/// Build the full Axum router for the hub API.
/// Used by the server and integration tests.
pub fn build_router(service: Arc<AggregationService>) -> Router {
    Router::new()
        .route(
            "/api/modules",
            get(handlers::list_modules).fallback(method_not_allowed),
        )
        .route(
            "/api/summary",
            get(handlers::summary).fallback(method_not_allowed),
        )
        .route(
            "/api/scan",
            post(handlers::scan).fallback(method_not_allowed),
        )
        .route(
            "/api/modules/add",
            post(upload::add_module)
                .layer(DefaultBodyLimit::max(upload::MAX_UPLOAD_BYTES))
                .fallback(method_not_allowed),
        )
        .route(
            "/api/modules/:id/:action",
            post(handlers::module_action).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(service)
}
