pub mod api_error;
pub mod documents;
pub mod errors;
pub mod system;
pub mod tenders;

pub use api_error::ApiError;
