use chrono::{DateTime, Utc};
use contracts::shared::api_error::ErrorResponse;
use contracts::usecases::u601_load_tenders::{
    LoadTendersResponse, ProcessingError, RunValidation, RunWindow,
};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::{
    row_transformer::{RowTransformer, SpreadsheetRow},
    sheet_sink::SheetSink,
    tenderplan_api_client::TenderApiClient,
};
use crate::details;
use crate::shared::config::Config;
use crate::shared::error::LoaderError;
use crate::shared::error_log::ErrorLog;
use crate::shared::format::format_display;
use crate::shared::google_sheets::SheetClient;
use crate::shared::time_window::compute_window_for;

/// Executor для UseCase загрузки тендеров
///
/// Прогоны не пересекаются: ручной запуск во время планового ждет его
/// окончания.
pub struct LoadTendersExecutor {
    config: Arc<Config>,
    api_client: TenderApiClient,
    sink: SheetSink,
    error_log: Arc<ErrorLog>,
    run_lock: tokio::sync::Mutex<()>,
    last_run: RwLock<Option<Result<LoadTendersResponse, ErrorResponse>>>,
}

impl LoadTendersExecutor {
    pub fn new(
        config: Arc<Config>,
        sheet: Arc<dyn SheetClient>,
        error_log: Arc<ErrorLog>,
    ) -> Result<Self, LoaderError> {
        Ok(Self {
            api_client: TenderApiClient::new(config.tender_api.clone(), error_log.clone())?,
            sink: SheetSink::new(sheet),
            config,
            error_log,
            run_lock: tokio::sync::Mutex::new(()),
            last_run: RwLock::new(None),
        })
    }

    /// Загрузить тендеры за вчерашний день
    pub async fn run(&self) -> Result<LoadTendersResponse, LoaderError> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<LoadTendersResponse, LoaderError> {
        let _guard = self.run_lock.lock().await;

        let result = self.execute(now).await;
        let summary = match &result {
            Ok(response) => Ok(response.clone()),
            Err(err) => Err(ErrorResponse::new(err.category(), err.to_string())),
        };
        if let Ok(mut last) = self.last_run.write() {
            *last = Some(summary);
        }
        result
    }

    /// Прогон в отдельной задаче tokio: отмена вызывающего future
    /// (например, отключение HTTP-клиента) не прерывает запись в таблицу
    pub async fn run_detached(self: &Arc<Self>) -> Result<LoadTendersResponse, LoaderError> {
        self.run_detached_at(Utc::now()).await
    }

    pub async fn run_detached_at(
        self: &Arc<Self>,
        now: DateTime<Utc>,
    ) -> Result<LoadTendersResponse, LoaderError> {
        let executor = Arc::clone(self);
        tokio::spawn(async move { executor.run_at(now).await })
            .await
            .map_err(|e| LoaderError::Unexpected(format!("Load task failed: {}", e)))?
    }

    /// Итог последнего прогона
    pub fn last_run(&self) -> Option<Result<LoadTendersResponse, ErrorResponse>> {
        self.last_run.read().ok().and_then(|last| last.clone())
    }

    async fn execute(&self, now: DateTime<Utc>) -> Result<LoadTendersResponse, LoaderError> {
        let run_id = Uuid::new_v4().to_string();
        tracing::info!("Starting tender load run {}", run_id);

        let zones = &self.config.timezone;
        let (local_tz, window) = match zones
            .local_tz()
            .and_then(|tz| compute_window_for(now, zones).map(|w| (tz, w)))
        {
            Ok(v) => v,
            Err(err) => {
                self.error_log.record_error("date_window", &err, details!("run_id" => run_id));
                return Err(err);
            }
        };
        let run_timestamp = format_display(&now.with_timezone(&local_tz));

        tracing::info!(
            "Target date {} ({}), window [{}, {})",
            window.target_date.format("%d.%m.%Y"),
            zones.local,
            window.from_ms,
            window.to_ms
        );

        // Этап 1: загрузка страниц
        let outcome = self
            .api_client
            .fetch_all(window.from_ms, window.query_to_ms())
            .await?;
        let total_fetched = outcome.records.len();

        // Этап 2: фильтрация, вложения, преобразование
        let transformer = RowTransformer::new(
            &self.config.transform,
            local_tz,
            &self.config.tender_api.tender_url_template,
        );
        let excluded = &self.config.transform.excluded_placing_ways;

        let mut rows: Vec<SpreadsheetRow> = Vec::new();
        let mut processing_errors: Vec<ProcessingError> = Vec::new();
        let mut skipped = 0usize;
        let mut failed_transforms = 0usize;

        for record in &outcome.records {
            if record.placing_way().is_some_and(|code| excluded.contains(&code)) {
                skipped += 1;
                continue;
            }

            let tender_id = record.id();
            let attachments = match (&tender_id, self.config.tender_api.fetch_attachments) {
                (Some(id), true) => {
                    let (attachments, err) = self.api_client.fetch_attachments(id).await;
                    if let Some(err) = err {
                        processing_errors.push(ProcessingError {
                            tender_id: Some(id.clone()),
                            stage: "fetch_attachments".to_string(),
                            message: err.to_string(),
                        });
                    }
                    attachments
                }
                _ => Vec::new(),
            };

            match transformer.transform(&run_timestamp, record, &attachments) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    failed_transforms += 1;
                    tracing::warn!("Tender skipped, transform failed: {}", e);
                    self.error_log.record_error(
                        "transform",
                        &LoaderError::malformed(&e),
                        details!("run_id" => run_id, "tender" => record.0.to_string()),
                    );
                    processing_errors.push(ProcessingError {
                        tender_id: tender_id.clone(),
                        stage: "transform".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Этап 3: запись в таблицу
        let mut added = 0usize;
        let mut header_columns = 0usize;
        if !rows.is_empty() {
            let max_pairs = rows.iter().map(|r| r.attachment_count).max().unwrap_or(0);
            let written = async {
                let width = self.sink.ensure_header(max_pairs).await?;
                let added = self.sink.append(rows, width).await?;
                Ok::<_, LoaderError>((width, added))
            }
            .await;
            match written {
                Ok((width, count)) => {
                    header_columns = width;
                    added = count;
                }
                Err(err) => {
                    tracing::error!("Writing to the sheet failed: {}", err);
                    self.error_log.record_error("write_sheet", &err, details!("run_id" => run_id));
                    return Err(err);
                }
            }
        }

        let partial = !outcome.failed_pages.is_empty()
            || outcome.rate_limited
            || !processing_errors.is_empty();

        tracing::info!(
            "Run {} finished: fetched {}, added {}, skipped {}, failed {}",
            run_id,
            total_fetched,
            added,
            skipped,
            failed_transforms
        );

        Ok(LoadTendersResponse {
            status: if partial { "partial" } else { "success" }.to_string(),
            run_id,
            added,
            total_fetched,
            skipped,
            failed_transforms,
            failed_pages: outcome.failed_pages,
            rate_limited: outcome.rate_limited,
            header_columns,
            processing_errors,
            target_date: window.target_date.format("%d.%m.%Y").to_string(),
            timezone: zones.local.clone(),
            window: RunWindow {
                from_ms: window.from_ms,
                to_ms: window.to_ms,
            },
            timestamp: run_timestamp,
            validation: RunValidation {
                is_match: added + skipped + failed_transforms == total_fetched,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::google_sheets::memory::MemorySheet;
    use crate::shared::test_support::spawn_router;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::TimeZone;
    use contracts::shared::error_log::ErrorCategory;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 10, 3, 0, 0).unwrap()
    }

    /// Первая страница `tenders`, дальше пусто; вложения по id
    fn tender_api(tenders: Value, attachments: HashMap<&'static str, Value>) -> Router {
        Router::new()
            .route(
                "/tenders/getlist",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    let tenders = tenders.clone();
                    async move {
                        if q.get("page").map(String::as_str) == Some("0") {
                            Json(json!({ "tenders": tenders }))
                        } else {
                            Json(json!({ "tenders": [] }))
                        }
                    }
                }),
            )
            .route(
                "/tenders/attachments",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    let attachments = attachments.clone();
                    async move {
                        match attachments.get(q["id"].as_str()) {
                            Some(body) => (StatusCode::OK, Json(body.clone())),
                            None => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
                        }
                    }
                }),
            )
    }

    async fn executor(router: Router, sheet: Arc<MemorySheet>) -> (LoadTendersExecutor, Arc<ErrorLog>) {
        let base = spawn_router(router).await;
        let mut config = Config::default();
        config.tender_api.base_url = base;
        config.tender_api.token = "secret".to_string();
        config.transform.excluded_placing_ways = vec![15];
        let log = Arc::new(ErrorLog::new(100));
        let executor = LoadTendersExecutor::new(Arc::new(config), sheet, log.clone()).unwrap();
        (executor, log)
    }

    fn files(n: usize) -> Value {
        let items: Vec<Value> = (0..n)
            .map(|i| json!({"displayName": format!("Файл {}", i), "href": format!("https://f/{}", i)}))
            .collect();
        Value::Array(items)
    }

    #[tokio::test]
    async fn test_full_run_with_uneven_attachments() {
        let tenders = json!([
            {"_id": "a", "orderName": "A", "placingWay": 22},
            {"_id": "b", "orderName": "B", "placingWay": 15},
            {"_id": "x", "orderName": "X", "placingWay": 3},
            {"_id": "c", "orderName": "C", "placingWay": 99},
            {"orderName": "без id"}
        ]);
        let attachments = maplit::hashmap! {
            "a" => files(2),
            "c" => files(1),
        };
        let sheet = Arc::new(MemorySheet::default());
        let (executor, log) = executor(tender_api(tenders, attachments), sheet.clone()).await;

        let response = executor.run_at(now()).await.unwrap();
        assert_eq!(response.status, "partial");
        assert_eq!(response.total_fetched, 5);
        assert_eq!(response.added, 3);
        assert_eq!(response.skipped, 1);
        assert_eq!(response.failed_transforms, 1);
        assert!(response.validation.is_match);
        assert_eq!(response.header_columns, 9 + 2 * 2);
        assert_eq!(response.target_date, "09.12.2025");
        assert_eq!(response.timestamp, "10.12.2025 10:00");

        // x: вложения не загрузились, строка есть, ошибка в отчете
        let attachment_errors: Vec<_> = response
            .processing_errors
            .iter()
            .filter(|e| e.stage == "fetch_attachments")
            .collect();
        assert_eq!(attachment_errors.len(), 1);
        assert_eq!(attachment_errors[0].tender_id.as_deref(), Some("x"));

        let rows = sheet.snapshot();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.len() == 13));
        let x_row = rows.iter().find(|r| r[1] == json!("x")).unwrap();
        assert!(x_row[9..].iter().all(|c| c == &json!("")));
        let c_row = rows.iter().find(|r| r[1] == json!("c")).unwrap();
        assert_eq!(c_row[8], json!("Неизвестно"));

        assert_eq!(log.recent(10, Some(ErrorCategory::RemoteApiError)).len(), 2);
        assert!(executor.last_run().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized_run_adds_nothing() {
        let router = Router::new().route(
            "/tenders/getlist",
            get(|| async { (StatusCode::UNAUTHORIZED, "token expired") }),
        );
        let sheet = Arc::new(MemorySheet::default());
        let (executor, log) = executor(router, sheet.clone()).await;

        let err = executor.run_at(now()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unauthorized);
        assert!(sheet.snapshot().is_empty());
        assert_eq!(log.recent(10, Some(ErrorCategory::Unauthorized)).len(), 1);

        let last = executor.last_run().unwrap().unwrap_err();
        assert_eq!(last.category, ErrorCategory::Unauthorized);
        assert_eq!(last.status, "error");
    }

    #[tokio::test]
    async fn test_sheet_failure_fails_run() {
        let tenders = json!([{"_id": "a", "placingWay": 22}]);
        let sheet = Arc::new(MemorySheet::default());
        sheet.fail_append.store(true, Ordering::SeqCst);
        let (executor, log) = executor(tender_api(tenders, maplit::hashmap! {"a" => files(0)}), sheet).await;

        let err = executor.run_at(now()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::SheetApiError);
        assert_eq!(log.recent(1, None)[0].stage, "write_sheet");
    }

    #[tokio::test]
    async fn test_empty_day_is_success() {
        let sheet = Arc::new(MemorySheet::default());
        let (executor, _log) = executor(tender_api(json!([]), HashMap::new()), sheet.clone()).await;

        let response = executor.run_at(now()).await.unwrap();
        assert_eq!(response.status, "success");
        assert_eq!(response.added, 0);
        assert!(response.validation.is_match);
        assert!(sheet.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_detached_run_outlives_dropped_caller() {
        let api = Router::new().route(
            "/tenders/getlist",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Json(json!({ "tenders": [] }))
            }),
        );
        let sheet = Arc::new(MemorySheet::default());
        let (executor, _log) = executor(api, sheet).await;
        let executor = Arc::new(executor);

        let caller = tokio::time::timeout(Duration::from_millis(20), executor.run_detached_at(now())).await;
        assert!(caller.is_err());
        assert!(executor.last_run().is_none());

        let finished = async {
            loop {
                if let Some(last) = executor.last_run() {
                    return last;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        let last = tokio::time::timeout(Duration::from_secs(5), finished).await.unwrap();
        assert_eq!(last.unwrap().status, "success");
    }
}
