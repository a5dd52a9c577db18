//! Health check endpoint
//!
//! Liveness of turnselect itself, not of the relays it scores.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Number of TURN servers that passed registry validation
    pub configured_servers: usize,
}

/// Health check handler
///
/// Always 200 while the process is serving; `configured_servers == 0` means
/// the registry is missing or invalid.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            configured_servers: state.servers().len(),
        }),
    )
}
