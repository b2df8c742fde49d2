use std::time::Duration;

use crate::shared::error::LoaderError;

/// Скачивание файла с ограничением размера
///
/// Размер проверяется дважды: по Content-Length (HEAD и заголовки GET),
/// если сервер его сообщает, и по мере чтения тела. При превышении
/// прочитанные байты отбрасываются.
pub struct SizeLimitedDownloader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl SizeLimitedDownloader {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, LoaderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoaderError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Предварительная проверка размера через HEAD; ошибки HEAD игнорируются
    pub async fn probe_size(&self, url: &str) -> Option<u64> {
        let response = self.client.head(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
        if let Some(size) = self.probe_size(url).await {
            ensure_within_limit(size, self.max_bytes)?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Download of {} failed with status {}", url, status);
            return Err(LoaderError::from_status(status));
        }

        if let Some(size) = response.content_length() {
            ensure_within_limit(size, self.max_bytes)?;
        }

        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LoaderError::from_transport(&e))?
        {
            let total = buffer.len() as u64 + chunk.len() as u64;
            if total > self.max_bytes {
                tracing::warn!(
                    "Download of {} aborted: {} bytes exceed limit {}",
                    url,
                    total,
                    self.max_bytes
                );
                return Err(LoaderError::FileSizeExceeded {
                    limit_bytes: self.max_bytes,
                    actual_bytes: Some(total),
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        tracing::debug!("Downloaded {} bytes from {}", buffer.len(), url);
        Ok(buffer)
    }
}

pub fn ensure_within_limit(size: u64, max_bytes: u64) -> Result<(), LoaderError> {
    if size > max_bytes {
        Err(LoaderError::FileSizeExceeded {
            limit_bytes: max_bytes,
            actual_bytes: Some(size),
        })
    } else {
        Ok(())
    }
}
