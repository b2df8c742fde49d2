pub mod response;
pub mod time_check;

pub use response::{LoadTendersResponse, ProcessingError, RunValidation, RunWindow};
pub use time_check::CheckTimeResponse;

use crate::usecases::common::UseCaseMetadata;

pub struct LoadTenders;

impl UseCaseMetadata for LoadTenders {
    fn usecase_index() -> &'static str {
        "u601"
    }

    fn usecase_name() -> &'static str {
        "load_tenders"
    }

    fn display_name() -> &'static str {
        "Загрузка тендеров"
    }

    fn description() -> &'static str {
        "Загрузка тендеров за вчерашний день из TenderPlan API в Google Sheets"
    }
}
