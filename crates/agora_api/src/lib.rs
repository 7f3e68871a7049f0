//! JSON HTTP API for Agora.
//!
//! # Responsibility
//! - Route requests to core services and shape their results as JSON.
//! - Authenticate callers from `Authorization` token headers.
//! - Map service errors to HTTP statuses.
//!
//! # Invariants
//! - Handlers never touch SQL; all storage work goes through
//!   [`AppState::run`].

pub mod auth;
pub mod error;
pub mod extract;
pub mod request_log;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};

/// Builds the complete application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_routes())
        .layer(middleware::from_fn(request_log::log_requests))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": agora_core::ping(),
        "version": agora_core::core_version(),
    }))
}
