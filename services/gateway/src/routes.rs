//! Gateway routes

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub mod auths;
pub mod circles;
pub mod pins;
pub mod profiles;

/// Create the router of the gateway
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auths", auths::router(state.clone()))
        .nest("/profiles", profiles::router(state.clone()))
        .nest("/circles", circles::router(state.clone()))
        .nest("/pins", pins::router(state.clone()));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.uploads.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "pindrop-gateway"
    }))
}
