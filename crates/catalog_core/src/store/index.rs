//! Index specifications and query-plan statistics.
//!
//! # Invariants
//! - Generated index names follow `<field>_<1|-1>` joined by `_`.
//! - SQLite index names are `<collection>.<index>`, so names never collide
//!   across collections.

use super::field::validate_field;
use super::options::SortKey;
use super::{StoreError, StoreResult};
use std::fmt::{Display, Formatter};

/// Ordered index keys with an optional explicit name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<SortKey>,
    pub name: Option<String>,
}

impl IndexSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(SortKey::asc(field));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(SortKey::desc(field));
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the explicit name or derives one from the keys.
    pub fn index_name(&self) -> StoreResult<String> {
        if self.keys.is_empty() {
            return Err(StoreError::InvalidDocument(
                "index requires at least one key".to_string(),
            ));
        }
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let mut parts = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            validate_field(&key.field)?;
            parts.push(format!("{}_{}", key.field.replace('.', "_"), key.direction.as_i8()));
        }
        Ok(parts.join("_"))
    }
}

/// Access strategy chosen by the engine for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStage {
    /// Every document of the collection is visited.
    CollectionScan,
    /// Documents are located through a secondary index.
    IndexScan,
    /// Documents are located directly by `_id`.
    IdLookup,
}

impl Display for PlanStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::CollectionScan => "COLLSCAN",
            Self::IndexScan => "IXSCAN",
            Self::IdLookup => "IDHACK",
        };
        f.write_str(label)
    }
}

/// Execution statistics reported by `explain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainStats {
    pub stage: PlanStage,
    /// Index name as returned by `create_index`, when one was used.
    pub index_name: Option<String>,
    pub docs_examined: u64,
    pub docs_returned: u64,
    pub execution_time_millis: u64,
    /// Raw `EXPLAIN QUERY PLAN` detail lines.
    pub plan: Vec<String>,
}

/// Classifies `EXPLAIN QUERY PLAN` detail lines for the `documents` table.
pub(crate) fn classify_plan(plan: &[String], collection: &str) -> (PlanStage, Option<String>) {
    let prefix = format!("{collection}.");
    for line in plan {
        let index = line
            .split_once("USING COVERING INDEX ")
            .or_else(|| line.split_once("USING INDEX "))
            .map(|(_, rest)| rest.split_whitespace().next().unwrap_or_default());
        if let Some(index) = index {
            let name = index.strip_prefix(&prefix).unwrap_or(index);
            return (PlanStage::IndexScan, Some(name.to_string()));
        }
        if line.contains("USING INTEGER PRIMARY KEY") {
            return (PlanStage::IdLookup, None);
        }
    }
    (PlanStage::CollectionScan, None)
}

pub(crate) fn sqlite_index_name(collection: &str, index: &str) -> String {
    format!("{collection}.{index}")
}
