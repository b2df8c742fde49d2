pub mod api_error;
pub mod error_log;
