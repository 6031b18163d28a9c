//! Aggregation pipeline stages compiled to nested SQLite queries.
//!
//! Every stage reads rows with a single JSON `body` column from the previous
//! stage and produces the same shape. The source stage injects the stored
//! `_id` into each body.
//!
//! # Invariants
//! - A `Sort` directly followed by `Skip`/`Limit` is rendered as one query so
//!   the window applies to the sorted order.
//! - Group keys and pushed values are plain scalars; booleans surface as `0`/`1`.
//! - `Mod` follows SQLite `%` semantics (integer remainder).

use super::field::{json_sql, validate_output_name, value_sql, window_sql, FieldScope, ID_FIELD};
use super::filter::Filter;
use super::options::SortKey;
use super::{StoreError, StoreResult};
use rusqlite::types::Value as SqlValue;
use serde_json::Number;
use std::iter::Peekable;
use std::slice::Iter;

/// Computed value inside `Project` and `Group` stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Number),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
    Divide(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn literal(value: impl Into<Number>) -> Self {
        Self::Literal(value.into())
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::Add(Box::new(left), Box::new(right))
    }

    pub fn subtract(left: Expr, right: Expr) -> Self {
        Self::Subtract(Box::new(left), Box::new(right))
    }

    pub fn multiply(left: Expr, right: Expr) -> Self {
        Self::Multiply(Box::new(left), Box::new(right))
    }

    pub fn divide(left: Expr, right: Expr) -> Self {
        Self::Divide(Box::new(left), Box::new(right))
    }

    pub fn modulo(left: Expr, right: Expr) -> Self {
        Self::Mod(Box::new(left), Box::new(right))
    }

    fn is_constant(&self) -> bool {
        match self {
            Self::Field(_) => false,
            Self::Literal(_) => true,
            Self::Add(left, right)
            | Self::Subtract(left, right)
            | Self::Multiply(left, right)
            | Self::Divide(left, right)
            | Self::Mod(left, right) => left.is_constant() && right.is_constant(),
        }
    }

    fn value_sql(&self) -> StoreResult<String> {
        let binary = |left: &Expr, op: &str, right: &Expr| -> StoreResult<String> {
            Ok(format!("({} {op} {})", left.value_sql()?, right.value_sql()?))
        };
        match self {
            Self::Field(name) => value_sql(name, FieldScope::Pipeline),
            Self::Literal(number) => Ok(number.to_string()),
            Self::Add(left, right) => binary(left, "+", right),
            Self::Subtract(left, right) => binary(left, "-", right),
            Self::Multiply(left, right) => binary(left, "*", right),
            Self::Divide(left, right) => Ok(format!(
                "(CAST({} AS REAL) / {})",
                left.value_sql()?,
                right.value_sql()?
            )),
            Self::Mod(left, right) => binary(left, "%", right),
        }
    }

    /// Field references keep their JSON type; computed values are numbers.
    fn json_sql(&self) -> StoreResult<String> {
        match self {
            Self::Field(name) => json_sql(name, FieldScope::Pipeline),
            _ => Ok(exact_json_sql(&self.value_sql()?)),
        }
    }
}

/// Per-group reduction inside a `Group` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Expr),
    Avg(Expr),
    Min(Expr),
    Max(Expr),
    /// Collects values into an array, in source order.
    Push(Expr),
    Count,
}

impl Accumulator {
    fn sql(&self) -> StoreResult<String> {
        Ok(match self {
            Self::Sum(expr) => exact_json_sql(&format!("sum({})", expr.value_sql()?)),
            Self::Avg(expr) => exact_json_sql(&format!("avg({})", expr.value_sql()?)),
            Self::Min(expr) => exact_json_sql(&format!("min({})", expr.value_sql()?)),
            Self::Max(expr) => exact_json_sql(&format!("max({})", expr.value_sql()?)),
            Self::Push(expr) => format!("json_group_array({})", expr.value_sql()?),
            Self::Count => "count(*)".to_string(),
        })
    }
}

/// JSON for a scalar SQL value, printing reals with 17 significant digits.
///
/// `json_object` renders reals with 15 digits, which does not round-trip an f64.
fn exact_json_sql(value: &str) -> String {
    format!(
        "json(CASE WHEN typeof({value}) = 'real' THEN printf('%!.17g', {value}) ELSE json_quote({value}) END)"
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// Output fields; `_id` is carried over unless listed explicitly.
    Project(Vec<(String, Expr)>),
    /// Groups by `key` (emitted as `_id`); a constant key folds all rows.
    Group {
        key: Expr,
        accumulators: Vec<(String, Accumulator)>,
    },
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_filter(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn project<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, expr)| (name.into(), expr))
            .collect();
        self.stages.push(Stage::Project(fields));
        self
    }

    pub fn group<I, S>(mut self, key: Expr, accumulators: I) -> Self
    where
        I: IntoIterator<Item = (S, Accumulator)>,
        S: Into<String>,
    {
        let accumulators = accumulators
            .into_iter()
            .map(|(name, accumulator)| (name.into(), accumulator))
            .collect();
        self.stages.push(Stage::Group { key, accumulators });
        self
    }

    pub fn sort(mut self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.stages.push(Stage::Sort(keys.into_iter().collect()));
        self
    }

    pub fn skip(mut self, count: u64) -> Self {
        self.stages.push(Stage::Skip(count));
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.stages.push(Stage::Limit(count));
        self
    }

    /// Compiles the pipeline for `collection` into one SQL query and its binds.
    pub(crate) fn compile(&self, collection: &str) -> StoreResult<(String, Vec<SqlValue>)> {
        let mut binds = vec![SqlValue::Text(collection.to_string())];
        let mut sql = String::from(
            "SELECT json_set(body, '$._id', id) AS body FROM documents WHERE collection = ? ORDER BY id",
        );

        let mut stages = self.stages.iter().peekable();
        while let Some(stage) = stages.next() {
            sql = match stage {
                Stage::Match(filter) => {
                    let clause = filter.to_sql(FieldScope::Pipeline, &mut binds)?;
                    format!("SELECT body FROM ({sql}) WHERE {clause}")
                }
                Stage::Project(fields) => project_sql(&sql, fields)?,
                Stage::Group { key, accumulators } => group_sql(&sql, key, accumulators)?,
                Stage::Sort(keys) => {
                    let order = sort_sql(keys)?;
                    let (skip, limit) = take_window(&mut stages);
                    format!(
                        "SELECT body FROM ({sql}) ORDER BY {order}{}",
                        window_sql(skip, limit)
                    )
                }
                Stage::Skip(count) => {
                    let (skip, limit) = take_window(&mut stages);
                    let (skip, limit) = compose_skip(*count, skip, limit);
                    format!("SELECT body FROM ({sql}){}", window_sql(skip, limit))
                }
                Stage::Limit(count) => {
                    let (skip, limit) = take_window(&mut stages);
                    let (skip, limit) = compose_limit(*count, skip, limit);
                    format!("SELECT body FROM ({sql}){}", window_sql(skip, limit))
                }
            };
        }

        Ok((sql, binds))
    }
}

fn project_sql(source: &str, fields: &[(String, Expr)]) -> StoreResult<String> {
    let mut columns = Vec::with_capacity(fields.len() + 1);
    if !fields.iter().any(|(name, _)| name == ID_FIELD) {
        columns.push(format!("'{ID_FIELD}', {}", json_sql(ID_FIELD, FieldScope::Pipeline)?));
    }
    for (name, expr) in fields {
        let name = validate_output_name(name)?;
        columns.push(format!("'{name}', {}", expr.json_sql()?));
    }
    Ok(format!(
        "SELECT json_object({}) AS body FROM ({source})",
        columns.join(", ")
    ))
}

fn group_sql(
    source: &str,
    key: &Expr,
    accumulators: &[(String, Accumulator)],
) -> StoreResult<String> {
    let key_sql = key.value_sql()?;
    let mut columns = Vec::with_capacity(accumulators.len() + 1);
    columns.push(format!("'{ID_FIELD}', {}", exact_json_sql(&key_sql)));
    for (name, accumulator) in accumulators {
        let name = validate_output_name(name)?;
        if name == ID_FIELD {
            return Err(StoreError::InvalidField(format!(
                "{name} is reserved for the group key"
            )));
        }
        columns.push(format!("'{name}', {}", accumulator.sql()?));
    }

    // A literal in GROUP BY would be read as a column ordinal.
    let grouping = if key.is_constant() {
        " HAVING count(*) > 0".to_string()
    } else {
        format!(" GROUP BY {key_sql}")
    };
    Ok(format!(
        "SELECT json_object({}) AS body FROM ({source}){grouping}",
        columns.join(", ")
    ))
}

fn sort_sql(keys: &[SortKey]) -> StoreResult<String> {
    if keys.is_empty() {
        return Err(StoreError::InvalidDocument(
            "sort stage requires at least one key".to_string(),
        ));
    }
    let parts = keys
        .iter()
        .map(|key| {
            Ok(format!(
                "{} {}",
                value_sql(&key.field, FieldScope::Pipeline)?,
                key.direction.sql()
            ))
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(parts.join(", "))
}

/// Consumes directly following `Skip`/`Limit` stages into one window.
fn take_window(stages: &mut Peekable<Iter<'_, Stage>>) -> (u64, Option<u64>) {
    let mut skip = 0;
    let mut limit = None;
    while let Some(stage) = stages.peek() {
        match stage {
            Stage::Skip(count) => {
                (skip, limit) = compose_skip_after(skip, limit, *count);
            }
            Stage::Limit(count) => {
                limit = Some(limit.map_or(*count, |current: u64| current.min(*count)));
            }
            _ => break,
        }
        stages.next();
    }
    (skip, limit)
}

/// Window for `Skip(first)` followed by the window `(skip, limit)`.
fn compose_skip(first: u64, skip: u64, limit: Option<u64>) -> (u64, Option<u64>) {
    (first.saturating_add(skip), limit)
}

/// Window for `Limit(first)` followed by the window `(skip, limit)`.
fn compose_limit(first: u64, skip: u64, limit: Option<u64>) -> (u64, Option<u64>) {
    let remaining = first.saturating_sub(skip);
    (skip, Some(limit.map_or(remaining, |limit| limit.min(remaining))))
}

/// Window `(skip, limit)` followed by `Skip(count)`.
fn compose_skip_after(skip: u64, limit: Option<u64>, count: u64) -> (u64, Option<u64>) {
    (
        skip.saturating_add(count),
        limit.map(|limit| limit.saturating_sub(count)),
    )
}
