use contracts::shared::error_log::ErrorCategory;
use thiserror::Error;

/// Ответ удаленного API, который не удалось использовать
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteApiFailure {
    /// HTTP 401
    Unauthorized,
    /// HTTP 429
    RateLimited,
    /// Любой другой статус, кроме 200
    Status(u16),
    /// Тело не разобрано как ожидаемый JSON
    MalformedBody(String),
}

impl std::fmt::Display for RemoteApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteApiFailure::Unauthorized => write!(f, "authentication failed (HTTP 401)"),
            RemoteApiFailure::RateLimited => write!(f, "rate limit exceeded (HTTP 429)"),
            RemoteApiFailure::Status(code) => write!(f, "unexpected HTTP status {}", code),
            RemoteApiFailure::MalformedBody(e) => write!(f, "malformed response body: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    Timeout,
    Connection,
}

/// Ошибки загрузчика тендеров и парсера документов
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    #[error("Remote API error: {0}")]
    RemoteApi(RemoteApiFailure),

    #[error("Network error ({kind:?}): {message}")]
    Network {
        kind: NetworkFailure,
        message: String,
    },

    #[error("Google Sheets authentication failed: {0}")]
    SheetAuth(String),

    #[error("Google Sheets API error: {0}")]
    SheetApi(String),

    #[error("Document parse error: {0}")]
    DocumentParse(String),

    #[error("File too large: limit {limit_bytes} bytes{}", .actual_bytes.map(|a| format!(", got at least {a}")).unwrap_or_default())]
    FileSizeExceeded {
        limit_bytes: u64,
        actual_bytes: Option<u64>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl LoaderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoaderError::RemoteApi(RemoteApiFailure::Unauthorized) => ErrorCategory::Unauthorized,
            LoaderError::RemoteApi(RemoteApiFailure::RateLimited) => ErrorCategory::RateLimited,
            LoaderError::RemoteApi(_) => ErrorCategory::RemoteApiError,
            LoaderError::Network { .. } => ErrorCategory::NetworkError,
            LoaderError::SheetAuth(_) => ErrorCategory::SheetAuthError,
            LoaderError::SheetApi(_) => ErrorCategory::SheetApiError,
            LoaderError::DocumentParse(_) => ErrorCategory::DocumentParseError,
            LoaderError::FileSizeExceeded { .. } => ErrorCategory::FileSizeExceededError,
            LoaderError::Configuration(_) => ErrorCategory::ConfigurationError,
            LoaderError::Unexpected(_) => ErrorCategory::UnexpectedError,
        }
    }

    /// Ошибка транспорта reqwest: таймаут или все остальное как ошибка соединения
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            NetworkFailure::Timeout
        } else {
            NetworkFailure::Connection
        };
        LoaderError::Network {
            kind,
            message: err.to_string(),
        }
    }

    /// HTTP-статус ответа не 200
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => LoaderError::RemoteApi(RemoteApiFailure::Unauthorized),
            429 => LoaderError::RemoteApi(RemoteApiFailure::RateLimited),
            code => LoaderError::RemoteApi(RemoteApiFailure::Status(code)),
        }
    }

    pub fn malformed(err: impl std::fmt::Display) -> Self {
        LoaderError::RemoteApi(RemoteApiFailure::MalformedBody(err.to_string()))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            LoaderError::RemoteApi(RemoteApiFailure::Unauthorized) => Some(401),
            LoaderError::RemoteApi(RemoteApiFailure::RateLimited) => Some(429),
            LoaderError::RemoteApi(RemoteApiFailure::Status(code)) => Some(*code),
            _ => None,
        }
    }
}
