use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;

use super::auth::ServiceAccountAuth;
use super::SheetClient;
use crate::shared::config::{ServiceAccountKey, SheetsConfig};
use crate::shared::error::LoaderError;

/// Клиент Google Sheets API v4 для одного листа
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    auth: ServiceAccountAuth,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
    /// Числовой sheetId листа, нужен для batchUpdate
    sheet_id: Mutex<Option<i64>>,
}

impl GoogleSheetsClient {
    pub fn new(config: &SheetsConfig, key: ServiceAccountKey) -> Result<Self, LoaderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .map_err(|e| LoaderError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            auth: ServiceAccountAuth::new(key, http.clone()),
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            worksheet: config.worksheet.clone(),
            sheet_id: Mutex::new(None),
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    /// URL диапазона значений вида `'Tenders'!1:1`
    fn values_url(&self, a1: &str) -> String {
        let range = format!("'{}'!{}", self.worksheet.replace('\'', "''"), a1);
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(&range))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, LoaderError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            tracing::error!("Google Sheets rejected credentials: {} {}", status, body);
            return Err(LoaderError::SheetAuth(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            tracing::error!("Google Sheets request failed: {} {}", status, body);
            return Err(LoaderError::SheetApi(format!("HTTP {}: {}", status, body)));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| LoaderError::SheetApi(format!("Malformed Sheets response: {}", e)))
    }

    async fn batch_update(&self, requests: Value) -> Result<Value, LoaderError> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        self.send(self.http.post(url).json(&json!({ "requests": requests })))
            .await
    }

    /// sheetId листа; лист создается, если его нет
    async fn sheet_id(&self) -> Result<i64, LoaderError> {
        let mut cached = self.sheet_id.lock().await;
        if let Some(id) = *cached {
            return Ok(id);
        }

        let meta = self
            .send(
                self.http
                    .get(self.spreadsheet_url())
                    .query(&[("fields", "sheets.properties(sheetId,title)")]),
            )
            .await?;

        let existing = meta["sheets"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|sheet| &sheet["properties"])
            .find(|props| props["title"].as_str() == Some(self.worksheet.as_str()))
            .and_then(|props| props["sheetId"].as_i64());

        let id = match existing {
            Some(id) => id,
            None => {
                tracing::info!("Worksheet '{}' not found, creating it", self.worksheet);
                let reply = self
                    .batch_update(json!([{
                        "addSheet": {
                            "properties": {
                                "title": self.worksheet,
                                "gridProperties": { "rowCount": 1000, "columnCount": 20 }
                            }
                        }
                    }]))
                    .await?;
                reply["replies"][0]["addSheet"]["properties"]["sheetId"]
                    .as_i64()
                    .ok_or_else(|| LoaderError::SheetApi("addSheet reply has no sheetId".to_string()))?
            }
        };

        *cached = Some(id);
        Ok(id)
    }

    fn first_row_range(sheet_id: i64) -> Value {
        json!({
            "sheetId": sheet_id,
            "dimension": "ROWS",
            "startIndex": 0,
            "endIndex": 1
        })
    }
}

#[async_trait]
impl SheetClient for GoogleSheetsClient {
    async fn read_first_row(&self) -> Result<Vec<String>, LoaderError> {
        // Создаем лист заранее, иначе чтение диапазона вернет 400
        self.sheet_id().await?;
        let data = self
            .send(
                self.http
                    .get(self.values_url("1:1"))
                    .query(&[("majorDimension", "ROWS")]),
            )
            .await?;

        let row = data["values"][0]
            .as_array()
            .map(|cells| {
                cells
                    .iter()
                    .map(|cell| match cell {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(row)
    }

    async fn delete_first_row(&self) -> Result<(), LoaderError> {
        let sheet_id = self.sheet_id().await?;
        self.batch_update(json!([{
            "deleteDimension": { "range": Self::first_row_range(sheet_id) }
        }]))
        .await?;
        Ok(())
    }

    async fn insert_first_row(&self, row: &[String]) -> Result<(), LoaderError> {
        let sheet_id = self.sheet_id().await?;
        self.batch_update(json!([{
            "insertDimension": {
                "range": Self::first_row_range(sheet_id),
                "inheritFromBefore": false
            }
        }]))
        .await?;

        self.send(
            self.http
                .put(self.values_url("A1"))
                .query(&[("valueInputOption", "RAW")])
                .json(&json!({ "majorDimension": "ROWS", "values": [row] })),
        )
        .await?;
        Ok(())
    }

    async fn append_rows(&self, rows: &[Vec<Value>]) -> Result<usize, LoaderError> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.sheet_id().await?;
        let url = format!("{}:append", self.values_url("A1"));
        let reply = self
            .send(
                self.http
                    .post(url)
                    .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
                    .json(&json!({ "majorDimension": "ROWS", "values": rows })),
            )
            .await?;

        let updated = reply["updates"]["updatedRows"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(rows.len());
        Ok(updated)
    }

    async fn check_connection(&self) -> Result<(), LoaderError> {
        self.auth.access_token().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::google_sheets::auth::tests::{test_key, token_route};
    use crate::shared::test_support::spawn_router;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex as StdMutex};

    /// Упрощенная имитация Sheets API: один лист, строки в памяти
    #[derive(Clone, Default)]
    struct FakeSheets {
        sheets: Arc<StdMutex<Vec<(i64, String)>>>,
        rows: Arc<StdMutex<Vec<Vec<Value>>>>,
        requests: Arc<StdMutex<Vec<String>>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer ya29.test")
    }

    async fn metadata(
        State(fake): State<FakeSheets>,
        Path(id): Path<String>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        assert_eq!(id, "sheet-1");
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({})));
        }
        fake.requests.lock().unwrap().push("metadata".to_string());
        let sheets: Vec<Value> = fake
            .sheets
            .lock()
            .unwrap()
            .iter()
            .map(|(id, title)| json!({"properties": {"sheetId": id, "title": title}}))
            .collect();
        (StatusCode::OK, Json(json!({ "sheets": sheets })))
    }

    async fn batch_update(
        State(fake): State<FakeSheets>,
        Path(id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(id, "sheet-1:batchUpdate");
        let request = &body["requests"][0];
        let mut replies = vec![json!({})];
        if let Some(add) = request.get("addSheet") {
            let title = add["properties"]["title"].as_str().unwrap().to_string();
            fake.sheets.lock().unwrap().push((777, title));
            replies = vec![json!({"addSheet": {"properties": {"sheetId": 777}}})];
            fake.requests.lock().unwrap().push("addSheet".to_string());
        } else if request.get("deleteDimension").is_some() {
            let mut rows = fake.rows.lock().unwrap();
            if !rows.is_empty() {
                rows.remove(0);
            }
            fake.requests.lock().unwrap().push("deleteDimension".to_string());
        } else if request.get("insertDimension").is_some() {
            fake.rows.lock().unwrap().insert(0, Vec::new());
            fake.requests.lock().unwrap().push("insertDimension".to_string());
        }
        Json(json!({ "replies": replies }))
    }

    async fn read_values(
        State(fake): State<FakeSheets>,
        Path((_id, range)): Path<(String, String)>,
    ) -> Json<Value> {
        assert_eq!(range, "'Tenders'!1:1");
        let rows = fake.rows.lock().unwrap();
        match rows.first() {
            Some(first) => Json(json!({ "values": [first] })),
            None => Json(json!({})),
        }
    }

    async fn write_values(
        State(fake): State<FakeSheets>,
        Path((_id, range)): Path<(String, String)>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(query.get("valueInputOption").map(String::as_str), Some("RAW"));
        let values = body["values"].as_array().unwrap().clone();
        let mut rows = fake.rows.lock().unwrap();
        if range.ends_with(":append") {
            let added = values.len();
            for v in values {
                rows.push(v.as_array().unwrap().clone());
            }
            Json(json!({ "updates": { "updatedRows": added } }))
        } else {
            rows[0] = values[0].as_array().unwrap().clone();
            Json(json!({}))
        }
    }

    async fn spawn_fake(fake: FakeSheets) -> String {
        // batchUpdate приходит как POST на сегмент "{id}:batchUpdate"
        let sheets = Router::new()
            .route("/v4/spreadsheets/:id", get(metadata).post(batch_update))
            .route(
                "/v4/spreadsheets/:id/values/:range",
                get(read_values).put(write_values).post(write_values),
            )
            .with_state(fake);
        spawn_router(sheets.merge(token_route(Arc::new(AtomicUsize::new(0))))).await
    }

    fn client(base: &str) -> GoogleSheetsClient {
        let config = SheetsConfig {
            spreadsheet_id: "sheet-1".to_string(),
            worksheet: "Tenders".to_string(),
            api_base_url: base.to_string(),
            ..SheetsConfig::default()
        };
        GoogleSheetsClient::new(&config, test_key(format!("{}/token", base))).unwrap()
    }

    #[tokio::test]
    async fn test_missing_worksheet_is_created_and_header_written() {
        let fake = FakeSheets::default();
        let base = spawn_fake(fake.clone()).await;
        let client = client(&base);

        assert!(client.read_first_row().await.unwrap().is_empty());
        client
            .insert_first_row(&["ID".to_string(), "Название".to_string()])
            .await
            .unwrap();
        assert_eq!(client.read_first_row().await.unwrap(), vec!["ID", "Название"]);

        let requests = fake.requests.lock().unwrap().clone();
        assert_eq!(requests.iter().filter(|r| *r == "addSheet").count(), 1);
        assert_eq!(requests.iter().filter(|r| *r == "metadata").count(), 1);
    }

    #[tokio::test]
    async fn test_append_and_delete_rows() {
        let fake = FakeSheets::default();
        fake.sheets.lock().unwrap().push((5, "Tenders".to_string()));
        let base = spawn_fake(fake.clone()).await;
        let client = client(&base);

        let added = client
            .append_rows(&[vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]])
            .await
            .unwrap();
        assert_eq!(added, 2);

        client.delete_first_row().await.unwrap();
        let rows = fake.rows.lock().unwrap().clone();
        assert_eq!(rows, vec![vec![json!("b"), json!(2)]]);
    }
}
