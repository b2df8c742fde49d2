use serde_json::Value;
use std::sync::Arc;

use super::row_transformer::{header, SpreadsheetRow, FIXED_COLUMNS};
use crate::shared::error::LoaderError;
use crate::shared::google_sheets::SheetClient;

/// Приемник строк: сверка заголовка и пакетная запись
pub struct SheetSink {
    sheet: Arc<dyn SheetClient>,
}

impl SheetSink {
    pub fn new(sheet: Arc<dyn SheetClient>) -> Self {
        Self { sheet }
    }

    /// Привести первую строку к заголовку не уже `attachment_pairs` пар
    ///
    /// Заголовок не сужается: число пар берется максимальным из текущего
    /// заголовка и пакета. Если первая строка не заголовок, новый заголовок
    /// вставляется над ней. Возвращает ширину заголовка.
    pub async fn ensure_header(&self, attachment_pairs: usize) -> Result<usize, LoaderError> {
        let first_row = trim_trailing_empty(self.sheet.read_first_row().await?);
        let has_header = is_header(&first_row);

        let existing_pairs = if has_header {
            (first_row.len() - FIXED_COLUMNS.len() + 1) / 2
        } else {
            0
        };
        let expected = header(existing_pairs.max(attachment_pairs));

        if has_header {
            if first_row == expected {
                tracing::debug!("Header is up to date ({} columns)", expected.len());
                return Ok(expected.len());
            }
            tracing::info!(
                "Replacing header: {} -> {} columns",
                first_row.len(),
                expected.len()
            );
            self.sheet.delete_first_row().await?;
        } else if !first_row.is_empty() {
            tracing::warn!("First row is not a header, inserting header above it");
        }

        self.sheet.insert_first_row(&expected).await?;
        Ok(expected.len())
    }

    /// Записать строки одним запросом, дополнив каждую до `width` колонок
    pub async fn append(&self, rows: Vec<SpreadsheetRow>, width: usize) -> Result<usize, LoaderError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let values: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|row| {
                let mut cells = row.cells;
                if cells.len() < width {
                    cells.resize(width, Value::from(""));
                }
                cells
            })
            .collect();

        let added = self.sheet.append_rows(&values).await?;
        tracing::info!("Appended {} rows to the sheet", added);
        Ok(added)
    }
}

fn is_header(row: &[String]) -> bool {
    row.len() >= FIXED_COLUMNS.len()
        && row.iter().zip(FIXED_COLUMNS.iter()).all(|(cell, title)| cell == title)
}

fn trim_trailing_empty(mut row: Vec<String>) -> Vec<String> {
    while row.last().is_some_and(|cell| cell.trim().is_empty()) {
        row.pop();
    }
    row
}
