use axum::extract::State;
use axum::Json;
use chrono::Utc;
use contracts::system::health::{HealthResponse, InfoConfig, InfoResponse, PingResponse};
use contracts::usecases::common::UseCaseMetadata;
use contracts::usecases::u601_load_tenders::{CheckTimeResponse, LoadTenders};
use contracts::usecases::u602_parse_document::ParseDocument;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::api_error::ApiError;
use crate::routes::ENDPOINTS;
use crate::system::state::AppState;
use crate::usecases::u601_load_tenders::placing_way::placing_way_label;
use crate::usecases::u601_load_tenders::time_check::check_time as time_diagnostics;

/// GET /ping
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok".to_string(),
        message: "Tender loader is running".to_string(),
    })
}

/// GET /health
///
/// Всегда 200; недоступность таблицы видна в поле `google_sheets`.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, google_sheets, error) = match state.sheet.check_connection().await {
        Ok(()) => ("ok", "connected", None),
        Err(e) => {
            tracing::warn!("Health check: Google Sheets unavailable: {}", e);
            ("warning", "failed", Some(e.to_string()))
        }
    };
    Json(HealthResponse {
        status: status.to_string(),
        api: "ok".to_string(),
        google_sheets: google_sheets.to_string(),
        error,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /info
pub async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let config = &state.config;
    let excluded = &config.transform.excluded_placing_ways;
    let excluded_details: BTreeMap<String, String> = excluded
        .iter()
        .map(|code| {
            let label = placing_way_label(Some(*code), &config.transform.unknown_placing_way_label);
            (code.to_string(), label.to_string())
        })
        .collect();

    let mut usecases = BTreeMap::new();
    usecases.insert(LoadTenders::full_name(), LoadTenders::display_name().to_string());
    usecases.insert(ParseDocument::full_name(), ParseDocument::display_name().to_string());

    Json(InfoResponse {
        app: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        config: InfoConfig {
            timezone: config.timezone.local.clone(),
            publication_timezone: config.timezone.publication.clone(),
            api_time_basis: config.timezone.api_time_basis.as_str().to_string(),
            worksheet: config.sheets.worksheet.clone(),
            page_size: config.tender_api.page_size,
            first_page: config.tender_api.first_page,
            fetch_attachments: config.tender_api.fetch_attachments,
            name_max_chars: config.transform.name_max_chars,
            max_file_size_mb: config.document.max_file_size_mb,
            download_timeout_sec: config.document.download_timeout_sec,
            parse_timeout_sec: config.document.parse_timeout_sec,
            document_workers: config.document.workers,
            schedule: config.schedule.cron.clone(),
            excluded_placing_ways: excluded.clone(),
            excluded_placing_ways_details: excluded_details,
        },
        usecases,
        endpoints: ENDPOINTS
            .iter()
            .map(|(path, description)| (path.to_string(), description.to_string()))
            .collect(),
    })
}

/// GET /check-time
pub async fn check_time(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CheckTimeResponse>, ApiError> {
    Ok(Json(time_diagnostics(Utc::now(), &state.config.timezone)?))
}
