use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::shared::api_error::ErrorResponse;
use contracts::shared::error_log::ErrorCategory;

use crate::shared::error::LoaderError;

/// Ошибка обработчика: `{"status": "error", "category", "message"}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse::new(category, message),
        }
    }

    pub fn from_response(body: ErrorResponse) -> Self {
        Self {
            status: status_for(body.category),
            body,
        }
    }
}

/// HTTP-статус для категории ошибки
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        // 401 от внешнего API не означает, что клиент сервиса не авторизован
        ErrorCategory::Unauthorized => StatusCode::BAD_GATEWAY,
        ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::RemoteApiError => StatusCode::BAD_GATEWAY,
        ErrorCategory::NetworkError => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::SheetAuthError | ErrorCategory::SheetApiError => StatusCode::BAD_GATEWAY,
        ErrorCategory::DocumentParseError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::FileSizeExceededError => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::ConfigurationError | ErrorCategory::UnexpectedError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<LoaderError> for ApiError {
    fn from(err: LoaderError) -> Self {
        Self::from_response(ErrorResponse::new(err.category(), err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::RemoteApiFailure;

    #[test]
    fn test_status_per_category() {
        let err: ApiError = LoaderError::RemoteApi(RemoteApiFailure::Unauthorized).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.body.status, "error");
        assert_eq!(err.body.category, ErrorCategory::Unauthorized);

        let err: ApiError = LoaderError::FileSizeExceeded {
            limit_bytes: 1,
            actual_bytes: None,
        }
        .into();
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);

        let err: ApiError = LoaderError::DocumentParse("bad".to_string()).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
