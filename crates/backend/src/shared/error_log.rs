use chrono::Utc;
use contracts::shared::error_log::{ErrorCategory, ErrorEvent};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::shared::error::LoaderError;

/// Журнал ошибок процесса (in-memory, только добавление)
///
/// Хранит не больше `capacity` последних событий; старые вытесняются.
/// Один экземпляр принадлежит `AppState` и передается компонентам явно.
pub struct ErrorLog {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    events: VecDeque<ErrorEvent>,
    total_recorded: u64,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::with_capacity(capacity.min(1024)),
                total_recorded: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Записать событие
    pub fn record(
        &self,
        category: ErrorCategory,
        stage: &str,
        message: impl Into<String>,
        details: BTreeMap<String, Value>,
    ) {
        let event = ErrorEvent {
            timestamp: Utc::now(),
            category,
            stage: stage.to_string(),
            message: message.into(),
            details,
        };
        let mut inner = self.lock();
        if inner.events.len() == self.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(event);
        inner.total_recorded += 1;
    }

    /// Записать ошибку загрузчика с категорией из самой ошибки
    pub fn record_error(&self, stage: &str, err: &LoaderError, mut details: BTreeMap<String, Value>) {
        if let Some(code) = err.status_code() {
            details.entry("status_code".to_string()).or_insert(Value::from(code));
        }
        self.record(err.category(), stage, err.to_string(), details);
    }

    /// Последние события, новые сверху
    pub fn recent(&self, limit: usize, category: Option<ErrorCategory>) -> Vec<ErrorEvent> {
        let inner = self.lock();
        inner
            .events
            .iter()
            .rev()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn retained(&self) -> usize {
        self.lock().events.len()
    }

    pub fn total_recorded(&self) -> u64 {
        self.lock().total_recorded
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// `details!{"tender_id" => id, "page" => 3}`
#[macro_export]
macro_rules! details {
    () => { ::std::collections::BTreeMap::<String, ::serde_json::Value>::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = ::std::collections::BTreeMap::<String, ::serde_json::Value>::new();
        $( map.insert($key.to_string(), ::serde_json::json!($value)); )+
        map
    }};
}
