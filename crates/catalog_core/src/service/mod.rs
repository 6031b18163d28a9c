//! Catalog use-case services.
//!
//! # Responsibility
//! - Own the connection lifetime for one run (`session`).
//! - Run the fixed catalog steps against a collection (`catalog_service`).
//! - Sequence the steps and guarantee disconnection (`runner`).
//!
//! # Invariants
//! - A failed connect never reaches disconnect; a successful one always does.
//! - The first failing step stops the run.

use crate::db::DbError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog_service;
pub mod runner;
pub mod session;

pub use catalog_service::CatalogService;
pub use runner::{run_all, run_session, RunOutcome};
pub use session::CatalogSession;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Step of the catalog run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStep {
    Seed,
    BasicOperations,
    AdvancedQueries,
    Aggregations,
    Indexing,
}

impl CatalogStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::BasicOperations => "basic_operations",
            Self::AdvancedQueries => "advanced_queries",
            Self::Aggregations => "aggregations",
            Self::Indexing => "indexing",
        }
    }
}

impl Display for CatalogStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum CatalogError {
    /// The store could not be opened or bound; nothing to close.
    Connection { target: String, source: StoreError },
    /// A step failed after a successful connect.
    Operation {
        step: CatalogStep,
        source: StoreError,
    },
    Disconnect { target: String, source: DbError },
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection { target, source } => {
                write!(f, "cannot connect to `{target}`: {source}")
            }
            Self::Operation { step, source } => write!(f, "{step} failed: {source}"),
            Self::Disconnect { target, source } => {
                write!(f, "cannot close connection to `{target}`: {source}")
            }
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection { source, .. } => Some(source),
            Self::Operation { source, .. } => Some(source),
            Self::Disconnect { source, .. } => Some(source),
        }
    }
}
