use serde::{Deserialize, Serialize};

use crate::shared::error_log::ErrorCategory;

/// Тело ответа при любой ошибке: `{"status": "error", ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub category: ErrorCategory,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            category,
            message: message.into(),
        }
    }
}
