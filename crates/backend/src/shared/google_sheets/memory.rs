use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::SheetClient;
use crate::shared::error::LoaderError;

/// Лист в памяти для тестов приемника и конвейера
#[derive(Default)]
pub struct MemorySheet {
    pub rows: Mutex<Vec<Vec<Value>>>,
    pub fail_append: AtomicBool,
    pub header_writes: AtomicUsize,
}

impl MemorySheet {
    pub fn with_rows(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Vec<Value>> {
        self.rows.lock().unwrap().clone()
    }
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetClient for MemorySheet {
    async fn read_first_row(&self) -> Result<Vec<String>, LoaderError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .first()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default())
    }

    async fn delete_first_row(&self) -> Result<(), LoaderError> {
        let mut rows = self.rows.lock().unwrap();
        if !rows.is_empty() {
            rows.remove(0);
        }
        Ok(())
    }

    async fn insert_first_row(&self, row: &[String]) -> Result<(), LoaderError> {
        self.header_writes.fetch_add(1, Ordering::SeqCst);
        let row = row.iter().cloned().map(Value::String).collect();
        self.rows.lock().unwrap().insert(0, row);
        Ok(())
    }

    async fn append_rows(&self, rows: &[Vec<Value>]) -> Result<usize, LoaderError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(LoaderError::SheetApi("HTTP 500: backend error".to_string()));
        }
        self.rows.lock().unwrap().extend(rows.iter().cloned());
        Ok(rows.len())
    }

    async fn check_connection(&self) -> Result<(), LoaderError> {
        Ok(())
    }
}
