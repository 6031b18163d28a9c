//! Structured step results and their console rendering.
//!
//! # Responsibility
//! - Carry what each catalog step observed, independent of presentation.
//! - Render a run outcome as the human-readable console transcript.

use crate::model::book::BookRecord;
use crate::store::ExplainStats;
use serde::Deserialize;
use uuid::Uuid;

pub mod render;

pub use render::{render_outcome, write_outcome, SUCCESS_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Documents removed by the reset.
    pub deleted: u64,
    pub inserted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicOperationsReport {
    pub fantasy: Vec<BookRecord>,
    pub published_after_1950: Vec<BookRecord>,
    pub by_tolkien: Vec<BookRecord>,
    pub price_update: UpdateReport,
    pub deleted: u64,
}

/// Projection of title, author and price.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PricedTitle {
    pub title: String,
    pub author: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TitlePrice {
    pub title: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TitleAuthor {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedQueriesReport {
    pub in_stock_recent: Vec<BookRecord>,
    pub fiction_projection: Vec<PricedTitle>,
    pub cheapest: Vec<TitlePrice>,
    pub most_expensive: Vec<TitlePrice>,
    /// Pages in order, each at most one page size long.
    pub pages: Vec<Vec<TitleAuthor>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenrePrice {
    #[serde(rename = "_id")]
    pub genre: String,
    #[serde(rename = "averagePrice")]
    pub average_price: f64,
    #[serde(rename = "bookCount")]
    pub book_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorCount {
    #[serde(rename = "_id")]
    pub author: String,
    #[serde(rename = "bookCount")]
    pub book_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecadeBucket {
    #[serde(rename = "_id")]
    pub decade: i64,
    #[serde(rename = "bookCount")]
    pub book_count: u64,
    #[serde(rename = "books")]
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationReport {
    /// Sorted by average price, highest first.
    pub genre_prices: Vec<GenrePrice>,
    /// At most three authors, most books first.
    pub top_authors: Vec<AuthorCount>,
    /// Sorted by decade, oldest first.
    pub decades: Vec<DecadeBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingReport {
    pub created_indexes: Vec<String>,
    pub collection_scan: ExplainStats,
    pub title_lookup: ExplainStats,
    pub compound_lookup: ExplainStats,
}

/// Result of one completed step, in run order.
#[derive(Debug, Clone, PartialEq)]
pub enum StepReport {
    Seed(SeedReport),
    BasicOperations(BasicOperationsReport),
    AdvancedQueries(AdvancedQueriesReport),
    Aggregations(AggregationReport),
    Indexing(IndexingReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Connection target label.
    pub target: String,
    pub steps: Vec<StepReport>,
    /// Whether the connection was closed cleanly.
    pub disconnected: bool,
}

impl RunReport {
    pub fn new(run_id: Uuid, target: impl Into<String>) -> Self {
        Self {
            run_id,
            target: target.into(),
            steps: Vec::new(),
            disconnected: false,
        }
    }
}
