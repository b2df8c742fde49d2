pub mod request;
pub mod response;

pub use request::ParseUrlRequest;
pub use response::{DocumentFormat, ParseDocumentResponse};

use crate::usecases::common::UseCaseMetadata;

pub struct ParseDocument;

impl UseCaseMetadata for ParseDocument {
    fn usecase_index() -> &'static str {
        "u602"
    }

    fn usecase_name() -> &'static str {
        "parse_document"
    }

    fn display_name() -> &'static str {
        "Разбор документа"
    }

    fn description() -> &'static str {
        "Извлечение текста из DOC/DOCX (загрузка файла или скачивание по ссылке)"
    }
}
