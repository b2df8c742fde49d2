use contracts::usecases::u602_parse_document::{
    DocumentFormat, ParseDocumentResponse, ParseUrlRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{doc, docx};
use crate::details;
use crate::shared::config::DocumentConfig;
use crate::shared::download::{ensure_within_limit, SizeLimitedDownloader};
use crate::shared::error::LoaderError;
use crate::shared::error_log::ErrorLog;

const PREVIEW_CHARS: usize = 500;

/// Executor для UseCase разбора документов
///
/// Скачивание и разбор идут не более чем в `workers` задачах одновременно;
/// сам разбор выполняется в blocking-пуле tokio. Разрешение освобождается,
/// когда разбор действительно закончился, даже если клиент уже получил таймаут.
pub struct ParseDocumentExecutor {
    downloader: SizeLimitedDownloader,
    workers: Arc<Semaphore>,
    parse_timeout: Duration,
    error_log: Arc<ErrorLog>,
}

impl ParseDocumentExecutor {
    pub fn new(config: &DocumentConfig, error_log: Arc<ErrorLog>) -> Result<Self, LoaderError> {
        Ok(Self {
            downloader: SizeLimitedDownloader::new(
                Duration::from_secs(config.download_timeout_sec),
                config.max_file_size_bytes(),
            )?,
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            parse_timeout: Duration::from_secs(config.parse_timeout_sec),
            error_log,
        })
    }

    pub fn max_bytes(&self) -> u64 {
        self.downloader.max_bytes()
    }

    /// Разобрать загруженный файл
    pub async fn parse_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ParseDocumentResponse, LoaderError> {
        let result = async {
            let format = detect_format(file_name)?;
            ensure_within_limit(bytes.len() as u64, self.max_bytes())?;
            let permit = self.acquire().await?;
            self.parse_bytes(permit, file_name, format, bytes).await
        }
        .await;
        self.log_failure(&result, details!("file_name" => file_name, "source" => "upload"));
        result
    }

    /// Скачать файл по ссылке с ограничением размера и разобрать
    pub async fn parse_url(&self, request: &ParseUrlRequest) -> Result<ParseDocumentResponse, LoaderError> {
        let file_name = request
            .file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| file_name_from_url(&request.url));

        let result = async {
            let format = detect_format(&file_name)?;
            let permit = self.acquire().await?;
            tracing::info!("Downloading document {} from {}", file_name, request.url);
            let bytes = self.downloader.download(&request.url).await?;
            self.parse_bytes(permit, &file_name, format, bytes).await
        }
        .await;
        self.log_failure(&result, details!("file_name" => file_name, "url" => request.url));
        result
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, LoaderError> {
        self.workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| LoaderError::Unexpected(format!("Worker pool closed: {}", e)))
    }

    async fn parse_bytes(
        &self,
        permit: OwnedSemaphorePermit,
        file_name: &str,
        format: DocumentFormat,
        bytes: Vec<u8>,
    ) -> Result<ParseDocumentResponse, LoaderError> {
        let size = bytes.len();
        let max_xml_bytes = self.max_bytes();
        let text = self
            .run_blocking(permit, move || match format {
                DocumentFormat::Docx => docx::extract_text(&bytes, max_xml_bytes),
                DocumentFormat::Doc => doc::extract_text(&bytes),
            })
            .await?;

        let content_length = text.chars().count();
        tracing::info!(
            "Parsed {} ({}, {} bytes): {} characters",
            file_name,
            format.as_str(),
            size,
            content_length
        );

        Ok(ParseDocumentResponse {
            status: "success".to_string(),
            file_name: file_name.to_string(),
            format,
            content_length,
            preview: preview(&text),
            text,
        })
    }

    /// Запустить разбор в blocking-пуле; `permit` живет до конца разбора
    async fn run_blocking<F>(&self, permit: OwnedSemaphorePermit, parse: F) -> Result<String, LoaderError>
    where
        F: FnOnce() -> Result<String, LoaderError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            parse()
        });

        match tokio::time::timeout(self.parse_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(LoaderError::Unexpected(format!(
                "Parser task failed: {}",
                join_error
            ))),
            Err(_) => Err(LoaderError::DocumentParse(format!(
                "Parsing timed out after {} ms",
                self.parse_timeout.as_millis()
            ))),
        }
    }

    fn log_failure(
        &self,
        result: &Result<ParseDocumentResponse, LoaderError>,
        details: std::collections::BTreeMap<String, serde_json::Value>,
    ) {
        if let Err(err) = result {
            tracing::error!("Document parsing failed: {}", err);
            self.error_log.record_error("parse_document", err, details);
        }
    }
}

fn detect_format(file_name: &str) -> Result<DocumentFormat, LoaderError> {
    DocumentFormat::from_file_name(file_name).ok_or_else(|| {
        LoaderError::DocumentParse(format!(
            "Unsupported file type '{}': expected .doc or .docx",
            file_name
        ))
    })
}

/// Последний сегмент пути URL без query и fragment
fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    urlencoding::decode(name)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| name.to_string())
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    if head.len() < text.len() {
        format!("{}...", head)
    } else {
        head
    }
}
