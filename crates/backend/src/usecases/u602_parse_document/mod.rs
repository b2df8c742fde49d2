pub mod doc;
pub mod docx;
pub mod executor;

pub use executor::ParseDocumentExecutor;
