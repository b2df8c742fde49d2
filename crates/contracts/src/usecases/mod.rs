pub mod common;
pub mod u601_load_tenders;
pub mod u602_parse_document;
