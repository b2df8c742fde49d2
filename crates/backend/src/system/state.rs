use std::sync::Arc;

use crate::shared::config::Config;
use crate::shared::error::LoaderError;
use crate::shared::error_log::ErrorLog;
use crate::shared::google_sheets::SheetClient;
use crate::usecases::u601_load_tenders::LoadTendersExecutor;
use crate::usecases::u602_parse_document::ParseDocumentExecutor;

/// Состояние приложения, общее для всех обработчиков
pub struct AppState {
    pub config: Arc<Config>,
    pub error_log: Arc<ErrorLog>,
    pub sheet: Arc<dyn SheetClient>,
    pub load_tenders: Arc<LoadTendersExecutor>,
    pub parse_document: ParseDocumentExecutor,
}

impl AppState {
    pub fn new(config: Config, sheet: Arc<dyn SheetClient>) -> Result<Self, LoaderError> {
        let config = Arc::new(config);
        let error_log = Arc::new(ErrorLog::new(config.error_log.capacity));

        let load_tenders = Arc::new(LoadTendersExecutor::new(
            config.clone(),
            sheet.clone(),
            error_log.clone(),
        )?);
        let parse_document = ParseDocumentExecutor::new(&config.document, error_log.clone())?;

        Ok(Self {
            config,
            error_log,
            sheet,
            load_tenders,
            parse_document,
        })
    }
}
