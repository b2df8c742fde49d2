use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::details;
use crate::shared::config::TenderApiConfig;
use crate::shared::error::{LoaderError, RemoteApiFailure};
use crate::shared::error_log::ErrorLog;

/// Тендер в том виде, в каком его вернул API (только чтение)
#[derive(Debug, Clone)]
pub struct TenderRecord(pub Value);

impl TenderRecord {
    fn field(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find(|v| !v.is_null())
    }

    /// Идентификатор: строка или число
    pub fn id(&self) -> Option<String> {
        match self.field(&["_id", "id"])? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        self.field(&["orderName", "name"])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Имена заказчиков: `customers: [{name}]` или `organization: {name}`
    pub fn customer_names(&self) -> Vec<String> {
        let names: Vec<String> = match self.field(&["customers"]) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|c| match c {
                    Value::String(s) => Some(s.clone()),
                    other => other.get("name").and_then(Value::as_str).map(str::to_string),
                })
                .collect(),
            _ => Vec::new(),
        };
        if !names.is_empty() {
            return names;
        }
        self.field(&["organization"])
            .and_then(|o| o.get("name"))
            .and_then(Value::as_str)
            .map(|name| vec![name.to_string()])
            .unwrap_or_default()
    }

    /// Цена как есть: число, строка или Null
    pub fn max_price(&self) -> Value {
        self.field(&["maxPrice", "price"]).cloned().unwrap_or(Value::Null)
    }

    /// Код способа размещения: число или объект `{id}`
    pub fn placing_way(&self) -> Option<i64> {
        let raw = self.field(&["placingWay"])?;
        let code = match raw {
            Value::Object(obj) => obj.get("id")?,
            other => other,
        };
        match code {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn publication_time(&self) -> Option<&Value> {
        self.field(&["publicationDateTime", "publishDate"])
    }

    pub fn submission_close_time(&self) -> Option<&Value> {
        self.field(&["submissionCloseDateTime"])
    }

    /// Ссылка, если API прислал ее сам
    pub fn url(&self) -> Option<String> {
        self.field(&["url"])
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Вложение тендера
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub href: String,
}

/// Результат пагинации
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<TenderRecord>,
    /// Страницы, на которых пагинация остановилась из-за ошибки
    pub failed_pages: Vec<u32>,
    /// Остановлено по HTTP 429
    pub rate_limited: bool,
}

/// HTTP-клиент для TenderPlan API
pub struct TenderApiClient {
    client: reqwest::Client,
    config: TenderApiConfig,
    error_log: Arc<ErrorLog>,
}

impl TenderApiClient {
    pub fn new(config: TenderApiConfig, error_log: Arc<ErrorLog>) -> Result<Self, LoaderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .map_err(|e| LoaderError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            error_log,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Загрузить все страницы окна `[from_ms, to_ms]` (обе границы включительно)
    ///
    /// Ошибкой завершается только HTTP 401; остальные сбои останавливают
    /// пагинацию и попадают в журнал ошибок.
    pub async fn fetch_all(&self, from_ms: i64, to_ms: i64) -> Result<FetchOutcome, LoaderError> {
        let mut outcome = FetchOutcome::default();
        let first_page = self.config.first_page;
        let last_page = first_page.saturating_add(self.config.max_pages);
        let mut page = first_page;

        loop {
            if page >= last_page {
                tracing::warn!(
                    "Stopping pagination: max_pages ({}) reached",
                    self.config.max_pages
                );
                break;
            }

            match self.fetch_page(from_ms, to_ms, page).await {
                Ok(tenders) if tenders.is_empty() => {
                    tracing::info!("Page {} is empty, pagination complete", page);
                    break;
                }
                Ok(tenders) => {
                    tracing::info!("Page {}: {} tenders", page, tenders.len());
                    outcome.records.extend(tenders.into_iter().map(TenderRecord));
                    page += 1;
                }
                Err(err) => {
                    self.error_log.record_error(
                        "fetch_tenders",
                        &err,
                        details!("page" => page, "from_ms" => from_ms, "to_ms" => to_ms),
                    );
                    match err {
                        LoaderError::RemoteApi(RemoteApiFailure::Unauthorized) => {
                            tracing::error!("TenderPlan API rejected the token on page {}", page);
                            return Err(err);
                        }
                        LoaderError::RemoteApi(RemoteApiFailure::RateLimited) => {
                            tracing::warn!("Rate limited on page {}, stopping pagination", page);
                            outcome.rate_limited = true;
                        }
                        other => {
                            tracing::error!("Page {} failed: {}", page, other);
                            outcome.failed_pages.push(page);
                        }
                    }
                    break;
                }
            }
        }

        tracing::info!(
            "Fetched {} tenders, failed pages: {:?}",
            outcome.records.len(),
            outcome.failed_pages
        );
        Ok(outcome)
    }

    async fn fetch_page(&self, from_ms: i64, to_ms: i64, page: u32) -> Result<Vec<Value>, LoaderError> {
        let statuses = self
            .config
            .statuses
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let query = [
            ("fromPublicationDateTime", from_ms.to_string()),
            ("toPublicationDateTime", to_ms.to_string()),
            ("statuses", statuses),
            ("page", page.to_string()),
            ("limit", self.config.page_size.to_string()),
        ];

        let response = self
            .client
            .get(self.url(&self.config.tenders_path))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::from_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;
        let data: Value = serde_json::from_str(&body).map_err(LoaderError::malformed)?;

        // Старые версии API отдавали список в поле "data"
        match data.get("tenders").or_else(|| data.get("data")) {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(LoaderError::malformed("body has no 'tenders' list")),
        }
    }

    /// Вложения тендера; при любом сбое пустой список и ошибка для отчета
    pub async fn fetch_attachments(&self, tender_id: &str) -> (Vec<Attachment>, Option<LoaderError>) {
        match self.request_attachments(tender_id).await {
            Ok(attachments) => (attachments, None),
            Err(err) => {
                tracing::warn!("Attachments for tender {} not loaded: {}", tender_id, err);
                self.error_log.record_error(
                    "fetch_attachments",
                    &err,
                    details!("tender_id" => tender_id),
                );
                (Vec::new(), Some(err))
            }
        }
    }

    async fn request_attachments(&self, tender_id: &str) -> Result<Vec<Attachment>, LoaderError> {
        let response = self
            .client
            .get(self.url(&self.config.attachments_path))
            .timeout(Duration::from_secs(self.config.attachments_timeout_sec))
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
            .query(&[("id", tender_id)])
            .send()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::from_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;
        let items: Vec<Value> = match serde_json::from_str::<Value>(&body).map_err(LoaderError::malformed)? {
            Value::Array(items) => items,
            _ => return Err(LoaderError::malformed("attachments body is not a list")),
        };

        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Attachment>(item).ok())
            .filter(|a| !a.display_name.trim().is_empty() && !a.href.trim().is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_support::spawn_router;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use contracts::shared::error_log::ErrorCategory;
    use serde_json::json;
    use std::collections::HashMap;

    fn tenders(n: usize, page: usize) -> Value {
        let items: Vec<Value> = (0..n)
            .map(|i| json!({"_id": format!("p{}-{}", page, i), "orderName": "Поставка"}))
            .collect();
        json!({ "tenders": items })
    }

    fn client(base: &str) -> (TenderApiClient, Arc<ErrorLog>) {
        let log = Arc::new(ErrorLog::new(100));
        let config = TenderApiConfig {
            base_url: base.to_string(),
            token: "secret".to_string(),
            ..TenderApiConfig::default()
        };
        (TenderApiClient::new(config, log.clone()).unwrap(), log)
    }

    /// Фейковый список тендеров: ответ по номеру страницы
    fn pages_router(pages: Vec<(StatusCode, String)>) -> Router {
        Router::new().route(
            "/tenders/getlist",
            get(move |Query(q): Query<HashMap<String, String>>| {
                let pages = pages.clone();
                async move {
                    assert_eq!(q.get("limit").map(String::as_str), Some("100"));
                    assert_eq!(q.get("statuses").map(String::as_str), Some("1"));
                    let page: usize = q["page"].parse().unwrap();
                    pages
                        .get(page)
                        .cloned()
                        .unwrap_or((StatusCode::OK, tenders(0, page).to_string()))
                }
            }),
        )
    }

    #[test]
    fn test_record_accessors() {
        let record = TenderRecord(json!({
            "_id": "abc",
            "orderName": "Ремонт",
            "customers": [{"name": "ГБУ 1"}, {"name": "ГБУ 2"}],
            "maxPrice": 1500.5,
            "placingWay": {"id": 22},
            "publicationDateTime": 1765276200000i64
        }));
        assert_eq!(record.id().as_deref(), Some("abc"));
        assert_eq!(record.name(), "Ремонт");
        assert_eq!(record.customer_names(), vec!["ГБУ 1", "ГБУ 2"]);
        assert_eq!(record.max_price(), json!(1500.5));
        assert_eq!(record.placing_way(), Some(22));
        assert!(record.submission_close_time().is_none());

        let legacy = TenderRecord(json!({"id": 42, "organization": {"name": "ООО"}, "placingWay": 3}));
        assert_eq!(legacy.id().as_deref(), Some("42"));
        assert_eq!(legacy.customer_names(), vec!["ООО"]);
        assert_eq!(legacy.placing_way(), Some(3));
        assert!(TenderRecord(json!({"name": "x"})).id().is_none());
    }

    #[tokio::test]
    async fn test_pages_until_empty() {
        let base = spawn_router(pages_router(vec![
            (StatusCode::OK, tenders(100, 0).to_string()),
            (StatusCode::OK, tenders(100, 1).to_string()),
            (StatusCode::OK, tenders(0, 2).to_string()),
        ]))
        .await;
        let (client, log) = client(&base);

        let outcome = client.fetch_all(0, 10).await.unwrap();
        assert_eq!(outcome.records.len(), 200);
        assert!(outcome.failed_pages.is_empty());
        assert!(!outcome.rate_limited);
        assert_eq!(log.total_recorded(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_aborts() {
        let base = spawn_router(pages_router(vec![(StatusCode::UNAUTHORIZED, "{}".to_string())])).await;
        let (client, log) = client(&base);

        let err = client.fetch_all(0, 10).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Unauthorized);
        assert_eq!(log.recent(10, Some(ErrorCategory::Unauthorized)).len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_fetched_pages() {
        let base = spawn_router(pages_router(vec![
            (StatusCode::OK, tenders(100, 0).to_string()),
            (StatusCode::TOO_MANY_REQUESTS, String::new()),
        ]))
        .await;
        let (client, _log) = client(&base);

        let outcome = client.fetch_all(0, 10).await.unwrap();
        assert_eq!(outcome.records.len(), 100);
        assert!(outcome.rate_limited);
        assert!(outcome.failed_pages.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_page_is_failed() {
        let base = spawn_router(pages_router(vec![
            (StatusCode::OK, tenders(3, 0).to_string()),
            (StatusCode::OK, "<html>".to_string()),
        ]))
        .await;
        let (client, log) = client(&base);

        let outcome = client.fetch_all(0, 10).await.unwrap();
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failed_pages, vec![1]);
        let events = log.recent(10, None);
        assert_eq!(events[0].category, ErrorCategory::RemoteApiError);
        assert_eq!(events[0].details["page"], json!(1));
    }

    #[tokio::test]
    async fn test_connection_error_is_failed_page() {
        // Порт освобожден сразу после bind, соединение будет отклонено
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let (client, log) = client(&base);

        let outcome = client.fetch_all(0, 10).await.unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failed_pages, vec![0]);
        assert_eq!(log.recent(1, None)[0].category, ErrorCategory::NetworkError);
    }

    #[tokio::test]
    async fn test_attachments_filtered_and_failures_swallowed() {
        let router = Router::new().route(
            "/tenders/attachments",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                match q["id"].as_str() {
                    "ok" => (
                        StatusCode::OK,
                        Json(json!([
                            {"displayName": "ТЗ.docx", "href": "https://files/1"},
                            {"displayName": "", "href": "https://files/2"},
                            {"displayName": "Без ссылки"}
                        ])),
                    ),
                    "object" => (StatusCode::OK, Json(json!({"items": []}))),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
                }
            }),
        );
        let base = spawn_router(router).await;
        let (client, log) = client(&base);

        let (attachments, err) = client.fetch_attachments("ok").await;
        assert!(err.is_none());
        assert_eq!(
            attachments,
            vec![Attachment {
                display_name: "ТЗ.docx".to_string(),
                href: "https://files/1".to_string()
            }]
        );

        let (attachments, err) = client.fetch_attachments("broken").await;
        assert!(attachments.is_empty());
        assert_eq!(err.unwrap().status_code(), Some(500));

        let (attachments, err) = client.fetch_attachments("object").await;
        assert!(attachments.is_empty());
        assert!(err.is_some());

        let events = log.recent(10, None);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].details["tender_id"], json!("broken"));
        assert_eq!(events[1].details["status_code"], json!(500));
    }
}
