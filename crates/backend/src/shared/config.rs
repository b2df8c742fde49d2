use base64::{engine::general_purpose, Engine as _};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::shared::error::LoaderError;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tender_api: TenderApiConfig,
    pub timezone: TimezoneConfig,
    pub transform: TransformConfig,
    pub sheets: SheetsConfig,
    pub document: DocumentConfig,
    pub schedule: ScheduleConfig,
    pub error_log: ErrorLogConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TenderApiConfig {
    pub base_url: String,
    pub tenders_path: String,
    pub attachments_path: String,
    pub token: String,
    pub statuses: Vec<i64>,
    pub page_size: u32,
    pub first_page: u32,
    /// Предохранитель от бесконечной пагинации
    pub max_pages: u32,
    pub timeout_sec: u64,
    pub attachments_timeout_sec: u64,
    pub fetch_attachments: bool,
    /// `{id}` заменяется идентификатором тендера
    pub tender_url_template: String,
}

impl Default for TenderApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tenderplan.ru/api".to_string(),
            tenders_path: "/tenders/getlist".to_string(),
            attachments_path: "/tenders/attachments".to_string(),
            token: String::new(),
            statuses: vec![1],
            page_size: 100,
            first_page: 0,
            max_pages: 1000,
            timeout_sec: 30,
            attachments_timeout_sec: 30,
            fetch_attachments: true,
            tender_url_template: "https://tenderplan.ru/app?tender={id}".to_string(),
        }
    }
}

/// В каком виде API ожидает границы окна публикации
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiTimeBasis {
    /// Настоящие UTC-миллисекунды
    #[default]
    Utc,
    /// Настенное время в зоне публикации, записанное как UTC
    PublisherWallClock,
}

impl ApiTimeBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiTimeBasis::Utc => "utc",
            ApiTimeBasis::PublisherWallClock => "publisher_wall_clock",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimezoneConfig {
    /// Зона, в которой считается "вчера"
    pub local: String,
    /// Зона площадки-публикатора
    pub publication: String,
    pub api_time_basis: ApiTimeBasis,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            local: "Asia/Novosibirsk".to_string(),
            publication: "Europe/Moscow".to_string(),
            api_time_basis: ApiTimeBasis::Utc,
        }
    }
}

impl TimezoneConfig {
    pub fn local_tz(&self) -> Result<Tz, LoaderError> {
        parse_timezone(&self.local)
    }

    pub fn publication_tz(&self) -> Result<Tz, LoaderError> {
        parse_timezone(&self.publication)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, LoaderError> {
    Tz::from_str(name.trim())
        .map_err(|_| LoaderError::Configuration(format!("Unknown timezone '{}'", name)))
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TransformConfig {
    /// 0 отключает обрезку названия
    pub name_max_chars: usize,
    pub excluded_placing_ways: Vec<i64>,
    pub unknown_placing_way_label: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            name_max_chars: 100,
            excluded_placing_ways: Vec::new(),
            unknown_placing_way_label: "Неизвестно".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub worksheet: String,
    /// base64 от JSON-ключа сервисного аккаунта
    pub credentials_b64: String,
    pub api_base_url: String,
    pub timeout_sec: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            worksheet: "Tenders".to_string(),
            credentials_b64: String::new(),
            api_base_url: "https://sheets.googleapis.com".to_string(),
            timeout_sec: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DocumentConfig {
    pub max_file_size_mb: u64,
    pub download_timeout_sec: u64,
    pub parse_timeout_sec: u64,
    pub workers: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            download_timeout_sec: 120,
            parse_timeout_sec: 60,
            workers: 2,
        }
    }
}

impl DocumentConfig {
    const BYTES_PER_MB: u64 = 1024 * 1024;

    /// Лимит в байтах; `None`, если мегабайты не помещаются в u64
    pub fn checked_max_file_size_bytes(&self) -> Option<u64> {
        self.max_file_size_mb.checked_mul(Self::BYTES_PER_MB)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(Self::BYTES_PER_MB)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Cron из шести полей (сек мин час день месяц день_недели), в локальной зоне
    pub cron: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ErrorLogConfig {
    pub capacity: usize,
    pub default_read_limit: usize,
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_read_limit: 100,
        }
    }
}

/// Ключ сервисного аккаунта Google (поля, нужные для OAuth)
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
port = 8000

[timezone]
local = "Asia/Novosibirsk"
publication = "Europe/Moscow"
"#;

/// Загрузка конфигурации
///
/// Порядок поиска config.toml:
/// 1. Путь из переменной TENDER_LOADER_CONFIG
/// 2. Рядом с исполняемым файлом
/// 3. Текущая директория
/// 4. Встроенная конфигурация по умолчанию
///
/// Затем поверх применяются переменные окружения.
pub fn load_config() -> anyhow::Result<Config> {
    let mut config = match find_config_file() {
        Some(path) => {
            tracing::info!("Loading config from: {}", path.display());
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str::<Config>(&contents)?
        }
        None => {
            tracing::info!("Using default embedded configuration");
            toml::from_str::<Config>(DEFAULT_CONFIG)?
        }
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("TENDER_LOADER_CONFIG") {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("TENDER_LOADER_CONFIG points to missing file: {}", path.display());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }
    }

    let cwd_path = PathBuf::from("config.toml");
    cwd_path.exists().then_some(cwd_path)
}

impl Config {
    /// Переопределения из окружения; `lookup` подменяется в тестах
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("API_TOKEN") {
            self.tender_api.token = v;
        }
        if let Some(v) = get("GOOGLE_SHEET_ID") {
            self.sheets.spreadsheet_id = v;
        }
        if let Some(v) = get("GOOGLE_CREDS_B64") {
            self.sheets.credentials_b64 = v;
        }
        if let Some(v) = get("TIMEZONE") {
            self.timezone.local = v;
        }
        if let Some(v) = get("PUBLICATION_TIMEZONE") {
            self.timezone.publication = v;
        }
        if let Some(v) = get("LOAD_SCHEDULE") {
            self.schedule.cron = Some(v);
        }
        if let Some(v) = get("MAX_FILE_SIZE_MB").and_then(|v| v.trim().parse().ok()) {
            self.document.max_file_size_mb = v;
        }
        if let Some(v) = get("DOWNLOAD_TIMEOUT_SEC").and_then(|v| v.trim().parse().ok()) {
            self.document.download_timeout_sec = v;
        }
        if let Some(v) = get("PARSE_TIMEOUT_SEC").and_then(|v| v.trim().parse().ok()) {
            self.document.parse_timeout_sec = v;
        }
        if let Some(v) = get("PORT").and_then(|v| v.trim().parse().ok()) {
            self.server.port = v;
        }
    }

    /// Проверка при старте; любая ошибка останавливает запуск
    pub fn validate(&self) -> Result<(), LoaderError> {
        let required = [
            ("API_TOKEN", &self.tender_api.token),
            ("GOOGLE_SHEET_ID", &self.sheets.spreadsheet_id),
            ("GOOGLE_CREDS_B64", &self.sheets.credentials_b64),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(LoaderError::Configuration(format!(
                "Required settings are not configured: {}",
                missing.join(", ")
            )));
        }

        self.timezone.local_tz()?;
        self.timezone.publication_tz()?;

        if let Some(expr) = &self.schedule.cron {
            cron::Schedule::from_str(expr).map_err(|e| {
                LoaderError::Configuration(format!("Invalid cron expression '{}': {}", expr, e))
            })?;
        }

        let limits = [
            ("tender_api.page_size", self.tender_api.page_size as u64),
            ("tender_api.max_pages", self.tender_api.max_pages as u64),
            ("tender_api.timeout_sec", self.tender_api.timeout_sec),
            ("document.max_file_size_mb", self.document.max_file_size_mb),
            ("document.download_timeout_sec", self.document.download_timeout_sec),
            ("document.parse_timeout_sec", self.document.parse_timeout_sec),
            ("document.workers", self.document.workers as u64),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(LoaderError::Configuration(format!("{} must be greater than zero", name)));
        }
        if self.document.checked_max_file_size_bytes().is_none() {
            return Err(LoaderError::Configuration(format!(
                "document.max_file_size_mb is too large: {}",
                self.document.max_file_size_mb
            )));
        }

        self.service_account_key()?;
        Ok(())
    }

    /// Декодирование ключа сервисного аккаунта из base64
    pub fn service_account_key(&self) -> Result<ServiceAccountKey, LoaderError> {
        let raw = general_purpose::STANDARD
            .decode(self.sheets.credentials_b64.trim())
            .map_err(|e| LoaderError::Configuration(format!("GOOGLE_CREDS_B64 is not valid base64: {}", e)))?;
        serde_json::from_slice::<ServiceAccountKey>(&raw).map_err(|e| {
            LoaderError::Configuration(format!("GOOGLE_CREDS_B64 is not a service account key: {}", e))
        })
    }
}
