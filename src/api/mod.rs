//! HTTP API module
//!
//! This module provides HTTP endpoints for server status (`/status`) and
//! liveness (`/health`). Browser clients talk to the relay over the
//! WebSocket port, not through this router.
//!
//! The API is built with Axum and reads relay state through the relay handle.

pub mod error;
pub mod response;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::error::ApiError;
use crate::api::response::StatusResponse;
use crate::AppState;

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health_check))
        .fallback(not_found)
        // Add CORS middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Server status: player count and uptime in seconds
async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let relay = state.relay.status().await?;
    Ok(Json(StatusResponse::online(
        relay.players,
        state.uptime().as_secs_f64(),
    )))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Resource".to_string())
}
