use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use contracts::shared::error_log::{ErrorCategory, ErrorLogResponse};
use serde::Deserialize;
use std::sync::Arc;

use super::api_error::ApiError;
use crate::system::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ErrorsQuery {
    pub limit: Option<usize>,
    pub category: Option<String>,
}

/// GET /errors?limit=&category=
pub async fn list_errors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ErrorsQuery>,
) -> Result<Json<ErrorLogResponse>, ApiError> {
    let category = match query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(name) => Some(ErrorCategory::from_name(name).ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                ErrorCategory::UnexpectedError,
                format!("Unknown error category '{}'", name),
            )
        })?),
        None => None,
    };
    let limit = query
        .limit
        .unwrap_or(state.config.error_log.default_read_limit)
        .min(state.error_log.capacity());

    Ok(Json(ErrorLogResponse {
        status: "ok".to_string(),
        total_recorded: state.error_log.total_recorded(),
        retained: state.error_log.retained(),
        events: state.error_log.recent(limit, category),
    }))
}
