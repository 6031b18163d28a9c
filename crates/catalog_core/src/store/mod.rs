//! Schema-flexible JSON document store on top of SQLite.
//!
//! # Responsibility
//! - Define the collection contract used by the catalog service.
//! - Translate filters, find options, pipelines and index specs into SQL.
//!
//! # Invariants
//! - Every document is a JSON object stored minified in `documents.body`.
//! - `_id` is assigned by the store (row id) and never stored inside `body`.
//! - Field names reach SQL only after passing [`field::validate_field`].

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection;
pub mod field;
pub mod filter;
pub mod index;
pub mod options;
pub mod pipeline;

pub use collection::{DocumentCollection, InsertManyResult, SqliteCollection, UpdateResult};
pub use filter::Filter;
pub use index::{ExplainStats, IndexSpec, PlanStage};
pub use options::{FindOptions, Hint, Projection, SortDirection, SortKey, Update};
pub use pipeline::{Accumulator, Expr, Pipeline, Stage};

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-layer error for document persistence, queries and result decoding.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Connection was not bootstrapped through `db::open_*`.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Field path cannot be used in a query.
    InvalidField(String),
    /// Collection or index name cannot be used as an identifier.
    InvalidName(String),
    UnsupportedValue {
        field: String,
        reason: String,
    },
    InvalidDocument(String),
    Json(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::InvalidField(field) => write!(f, "invalid field path `{field}`"),
            Self::InvalidName(name) => write!(f, "invalid name `{name}`"),
            Self::UnsupportedValue { field, reason } => {
                write!(f, "unsupported value for `{field}`: {reason}")
            }
            Self::InvalidDocument(message) => write!(f, "invalid document: {message}"),
            Self::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::InvalidField(_)
            | Self::InvalidName(_)
            | Self::UnsupportedValue { .. }
            | Self::InvalidDocument(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
