use serde::{Deserialize, Serialize};

/// POST /parse-doc-url
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseUrlRequest {
    pub url: String,
    /// Имя файла для определения формата; по умолчанию берется из пути URL
    #[serde(default)]
    pub file_name: Option<String>,
}
