//! TURN selection endpoints

use axum::{Json, extract::State};

use crate::error::AppError;
use crate::handlers::AppState;
use crate::relay::{EvaluationResult, SelectionResult};

/// `GET /v1/turn/best`
///
/// 200 with the winning relay, 503 when no configured relay is healthy.
pub async fn best(State(state): State<AppState>) -> Result<Json<SelectionResult>, AppError> {
    state
        .selector()
        .select_best(state.servers())
        .await
        .map(Json)
        .ok_or(AppError::NoServerAvailable)
}

/// `GET /v1/turn/servers`
///
/// Current evaluation of every configured relay, in registry order. Shares the
/// evaluation cache with `/v1/turn/best`.
pub async fn servers(State(state): State<AppState>) -> Json<Vec<EvaluationResult>> {
    Json(state.selector().evaluate_all(state.servers()).await)
}
