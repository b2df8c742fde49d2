use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::system::state::AppState;

/// Запас на заголовки multipart сверх лимита файла
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Описание эндпоинтов для /info
pub const ENDPOINTS: [(&str, &str); 10] = [
    ("GET /ping", "Проверка, что сервис запущен"),
    ("GET /health", "Состояние сервиса и доступ к Google Sheets"),
    ("GET /info", "Версия и действующая конфигурация"),
    ("GET /check-time", "Диагностика часовых поясов и окна загрузки"),
    ("GET /load-tenders", "Загрузить тендеры за вчерашний день"),
    ("POST /load-tenders", "То же, что GET /load-tenders"),
    ("GET /load-tenders/last", "Итог последней загрузки"),
    ("POST /parse-doc", "Текст из загруженного DOC/DOCX (multipart, поле file)"),
    ("POST /parse-doc-url", "Текст из DOC/DOCX по ссылке"),
    ("GET /errors", "Журнал ошибок (limit, category)"),
];

/// Конфигурация всех роутов приложения
pub fn configure_routes(state: Arc<AppState>) -> Router {
    let upload_limit = usize::try_from(state.parse_document.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // ========================================
        // SYSTEM
        // ========================================
        .route("/ping", get(handlers::system::ping))
        .route("/health", get(handlers::system::health))
        .route("/info", get(handlers::system::info))
        .route("/check-time", get(handlers::system::check_time))
        .route("/errors", get(handlers::errors::list_errors))
        // ========================================
        // UseCase u601: Load tenders
        // ========================================
        .route(
            "/load-tenders",
            get(handlers::tenders::load_tenders).post(handlers::tenders::load_tenders),
        )
        .route("/load-tenders/last", get(handlers::tenders::last_run))
        // ========================================
        // UseCase u602: Parse document
        // ========================================
        .route(
            "/parse-doc",
            post(handlers::documents::parse_doc).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/parse-doc-url", post(handlers::documents::parse_doc_url))
        .with_state(state)
}
