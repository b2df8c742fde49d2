use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::usecases::u601_load_tenders::LoadTendersResponse;
use serde_json::json;
use std::sync::Arc;

use super::api_error::ApiError;
use crate::system::state::AppState;

/// GET|POST /load-tenders
pub async fn load_tenders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoadTendersResponse>, ApiError> {
    let summary = state.load_tenders.run_detached().await?;
    Ok(Json(summary))
}

/// GET /load-tenders/last
pub async fn last_run(State(state): State<Arc<AppState>>) -> Response {
    match state.load_tenders.last_run() {
        Some(Ok(summary)) => Json(summary).into_response(),
        Some(Err(body)) => ApiError::from_response(body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "empty", "message": "No load has run yet" })),
        )
            .into_response(),
    }
}
