//! API module for handling HTTP requests and responses

/// Request handlers.
pub mod handlers;
/// Wire types returned to the client.
pub mod responses;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::{AppState, Config};

/// Create the application router with all routes.
///
/// `/predict` is registered with and without a trailing slash because the
/// camera client posts the slash form and axum does not redirect between the
/// two.
pub fn create_router(config: &Config) -> Router<Arc<AppState>> {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Public health check
        .route("/api/health", get(health_check))
        // Prediction endpoint
        .route("/predict", post(handlers::predict))
        .route("/predict/", post(handlers::predict))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
