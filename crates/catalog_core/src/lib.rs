//! Core of the library catalog demo.
//! Owns configuration, the embedded document store and the catalog run.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod report;
pub mod service;
pub mod store;

pub use crate::config::{CatalogConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::book::{sample_books, BookRecord};
pub use report::{render_outcome, write_outcome, RunReport, StepReport, SUCCESS_MARKER};
pub use service::{
    run_all, run_session, CatalogError, CatalogService, CatalogSession, CatalogStep, RunOutcome,
};
pub use store::{DocumentCollection, SqliteCollection, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
