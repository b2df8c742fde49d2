use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Doc,
    Docx,
}

impl DocumentFormat {
    /// Определение формата по расширению имени файла
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.trim().to_lowercase();
        if lower.ends_with(".docx") {
            Some(DocumentFormat::Docx)
        } else if lower.ends_with(".doc") {
            Some(DocumentFormat::Doc)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
        }
    }
}

/// Результат разбора документа
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseDocumentResponse {
    pub status: String,
    pub file_name: String,
    pub format: DocumentFormat,
    /// Длина текста в символах
    pub content_length: usize,
    pub preview: String,
    pub text: String,
}
