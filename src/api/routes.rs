//! API Route Configuration

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{logging_middleware, rate_limit_middleware, request_id_middleware};

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        .route("/meta", get(handlers::meta))
        // Analysis
        .route("/analyze", post(handlers::analyze))
        .route("/scans", get(handlers::list_scans))
        .route("/scans/:id", get(handlers::get_scan))
        // Self-service keys
        .route("/keys/me", get(handlers::key_status))
        .route("/keys/rotate", post(handlers::rotate_key))
        // Admin
        .route(
            "/admin/keys",
            post(handlers::admin_create_key).get(handlers::admin_list_keys),
        )
        .route("/admin/keys/:id", delete(handlers::admin_revoke_key))
        .route("/admin/reports/usage", get(handlers::admin_usage_report))
        .route("/admin/reports/invoice", get(handlers::admin_invoice_report));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_v1)
        // Middleware (order matters - last added runs first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
