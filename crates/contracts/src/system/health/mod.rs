use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GET /ping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub message: String,
}

/// GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" или "warning", если таблица недоступна
    pub status: String,
    pub api: String,
    pub google_sheets: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub version: String,
}

/// GET /info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub app: String,
    pub version: String,
    pub config: InfoConfig,
    /// "u601_load_tenders" -> "Загрузка тендеров"
    pub usecases: BTreeMap<String, String>,
    pub endpoints: BTreeMap<String, String>,
}

/// Эффективная конфигурация без секретов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoConfig {
    pub timezone: String,
    pub publication_timezone: String,
    pub api_time_basis: String,
    pub worksheet: String,
    pub page_size: u32,
    pub first_page: u32,
    pub fetch_attachments: bool,
    pub name_max_chars: usize,
    pub max_file_size_mb: u64,
    pub download_timeout_sec: u64,
    pub parse_timeout_sec: u64,
    pub document_workers: usize,
    pub schedule: Option<String>,
    pub excluded_placing_ways: Vec<i64>,
    pub excluded_placing_ways_details: BTreeMap<String, String>,
}
