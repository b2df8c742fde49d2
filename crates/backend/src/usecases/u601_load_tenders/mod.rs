pub mod executor;
pub mod placing_way;
pub mod row_transformer;
pub mod sheet_sink;
pub mod tenderplan_api_client;
pub mod time_check;

pub use executor::LoadTendersExecutor;
