pub mod middleware;
pub mod scheduler;
pub mod state;
pub mod tracing;
