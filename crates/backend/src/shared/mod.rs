pub mod config;
pub mod download;
pub mod error;
pub mod error_log;
pub mod format;
pub mod google_sheets;
pub mod time_window;

#[cfg(test)]
pub mod test_support;
