//! FieldScout library
//!
//! Exposes application wiring for integration testing.

pub mod app;
pub mod config;
pub mod report;

// Re-export commonly used types for external use
pub use app::{App, RunMode};
pub use config::AppConfig;
pub use report::OutputFormat;
