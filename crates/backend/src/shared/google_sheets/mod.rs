pub mod auth;
pub mod client;
#[cfg(test)]
pub mod memory;

pub use client::GoogleSheetsClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::shared::error::LoaderError;

/// Операции над листом таблицы, нужные приемнику строк
///
/// Реализация привязана к одной таблице и одному листу.
#[async_trait]
pub trait SheetClient: Send + Sync {
    /// Первая строка листа (пустой вектор, если лист пуст)
    async fn read_first_row(&self) -> Result<Vec<String>, LoaderError>;

    async fn delete_first_row(&self) -> Result<(), LoaderError>;

    /// Вставить строку на позицию 1, сдвинув остальные вниз
    async fn insert_first_row(&self, row: &[String]) -> Result<(), LoaderError>;

    /// Добавить строки одним запросом; возвращает число добавленных строк
    async fn append_rows(&self, rows: &[Vec<Value>]) -> Result<usize, LoaderError>;

    /// Проверка доступа (для /health)
    async fn check_connection(&self) -> Result<(), LoaderError>;
}
