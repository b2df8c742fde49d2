use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Категория ошибки в журнале
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Unauthorized,
    RateLimited,
    RemoteApiError,
    NetworkError,
    SheetAuthError,
    SheetApiError,
    DocumentParseError,
    FileSizeExceededError,
    ConfigurationError,
    UnexpectedError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Unauthorized => "Unauthorized",
            ErrorCategory::RateLimited => "RateLimited",
            ErrorCategory::RemoteApiError => "RemoteApiError",
            ErrorCategory::NetworkError => "NetworkError",
            ErrorCategory::SheetAuthError => "SheetAuthError",
            ErrorCategory::SheetApiError => "SheetApiError",
            ErrorCategory::DocumentParseError => "DocumentParseError",
            ErrorCategory::FileSizeExceededError => "FileSizeExceededError",
            ErrorCategory::ConfigurationError => "ConfigurationError",
            ErrorCategory::UnexpectedError => "UnexpectedError",
        }
    }

    /// Разбор имени категории из query-параметра (без учета регистра)
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [ErrorCategory; 10] = [
            ErrorCategory::Unauthorized,
            ErrorCategory::RateLimited,
            ErrorCategory::RemoteApiError,
            ErrorCategory::NetworkError,
            ErrorCategory::SheetAuthError,
            ErrorCategory::SheetApiError,
            ErrorCategory::DocumentParseError,
            ErrorCategory::FileSizeExceededError,
            ErrorCategory::ConfigurationError,
            ErrorCategory::UnexpectedError,
        ];
        ALL.into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Событие журнала ошибок
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub timestamp: DateTime<Utc>,
    pub category: ErrorCategory,
    /// Этап, на котором произошла ошибка (например, "fetch_tenders")
    pub stage: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// GET /errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogResponse {
    pub status: String,
    /// Сколько событий записано за время жизни процесса
    pub total_recorded: u64,
    /// Сколько событий сейчас хранится в буфере
    pub retained: usize,
    /// Новые сверху
    pub events: Vec<ErrorEvent>,
}
