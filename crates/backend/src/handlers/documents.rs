use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use contracts::shared::error_log::ErrorCategory;
use contracts::usecases::u602_parse_document::{ParseDocumentResponse, ParseUrlRequest};
use std::sync::Arc;

use super::api_error::ApiError;
use crate::details;
use crate::shared::error::LoaderError;
use crate::system::state::AppState;

/// POST /parse-doc (multipart, поле `file`)
pub async fn parse_doc(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ParseDocumentResponse>, ApiError> {
    let read_error = |e: axum::extract::multipart::MultipartError| {
        let err = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            LoaderError::FileSizeExceeded {
                limit_bytes: state.parse_document.max_bytes(),
                actual_bytes: None,
            }
        } else {
            LoaderError::DocumentParse(format!("Invalid multipart body: {}", e))
        };
        state
            .error_log
            .record_error("upload_document", &err, details!());
        ApiError::from(err)
    };

    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(read_error)?;
        let response = state
            .parse_document
            .parse_upload(&file_name, bytes.to_vec())
            .await?;
        return Ok(Json(response));
    }

    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        ErrorCategory::DocumentParseError,
        "Multipart field 'file' is required",
    ))
}

/// POST /parse-doc-url
pub async fn parse_doc_url(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ParseUrlRequest>,
) -> Result<Json<ParseDocumentResponse>, ApiError> {
    let url = request.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorCategory::DocumentParseError,
            "Field 'url' must be an http(s) URL",
        ));
    }
    let response = state.parse_document.parse_url(&request).await?;
    Ok(Json(response))
}
