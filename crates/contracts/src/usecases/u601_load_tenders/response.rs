use serde::{Deserialize, Serialize};

/// Итог одного прогона загрузки тендеров
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTendersResponse {
    /// "success" или "partial" (были пропущенные страницы/ошибки обработки)
    pub status: String,
    pub run_id: String,
    /// Строк добавлено в таблицу
    pub added: usize,
    pub total_fetched: usize,
    /// Отфильтрованы по способу размещения
    pub skipped: usize,
    /// Тендеры, которые не удалось преобразовать в строку
    pub failed_transforms: usize,
    pub failed_pages: Vec<u32>,
    /// Пагинация остановлена по HTTP 429
    pub rate_limited: bool,
    /// Ширина заголовка после сверки
    pub header_columns: usize,
    pub processing_errors: Vec<ProcessingError>,
    /// dd.mm.yyyy
    pub target_date: String,
    pub timezone: String,
    pub window: RunWindow,
    /// Время запуска, dd.mm.yyyy HH:MM в локальной зоне
    pub timestamp: String,
    pub validation: RunValidation,
}

/// Ошибка обработки отдельного тендера (не прерывает прогон)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingError {
    pub tender_id: Option<String>,
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunWindow {
    pub from_ms: i64,
    /// Исключающая граница
    pub to_ms: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunValidation {
    /// added + skipped + failed_transforms == total_fetched
    #[serde(rename = "match")]
    pub is_match: bool,
}
