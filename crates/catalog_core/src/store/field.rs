//! Field-path and identifier validation plus SQL fragments for field access.
//!
//! # Invariants
//! - Only validated paths are interpolated into SQL text; values are always bound.
//! - `_id` maps to the `documents.id` column for stored rows and to a JSON
//!   member for intermediate pipeline rows.

use super::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Reserved document key holding the store-assigned id.
pub const ID_FIELD: &str = "_id";

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});
static OUTPUT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid output name regex"));
static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-]*$").expect("valid identifier regex"));

/// Where a field reference is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// Rows of the `documents` table.
    Stored,
    /// Intermediate aggregation rows carrying only a `body` column.
    Pipeline,
}

/// Accepts `name` or dotted `outer.inner` paths.
pub fn validate_field(field: &str) -> StoreResult<&str> {
    if FIELD_PATH_RE.is_match(field) {
        Ok(field)
    } else {
        Err(StoreError::InvalidField(field.to_string()))
    }
}

/// Accepts a single top-level key, as used by projections and stage outputs.
pub fn validate_output_name(name: &str) -> StoreResult<&str> {
    if OUTPUT_NAME_RE.is_match(name) {
        Ok(name)
    } else {
        Err(StoreError::InvalidField(name.to_string()))
    }
}

/// Accepts collection and index names.
pub fn validate_identifier(name: &str) -> StoreResult<&str> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(name)
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// SQL expression yielding the field as a plain SQL value.
pub fn value_sql(field: &str, scope: FieldScope) -> StoreResult<String> {
    let field = validate_field(field)?;
    if field == ID_FIELD && scope == FieldScope::Stored {
        return Ok("id".to_string());
    }
    Ok(format!("json_extract(body, '$.{field}')"))
}

/// SQL expression yielding the field as JSON, for use inside `json_object`.
pub fn json_sql(field: &str, scope: FieldScope) -> StoreResult<String> {
    let field = validate_field(field)?;
    if field == ID_FIELD && scope == FieldScope::Stored {
        return Ok("id".to_string());
    }
    Ok(format!("(body -> '$.{field}')"))
}

/// SQL expression yielding the JSON type name of the field (`'true'`, `'text'`, ...).
pub fn type_sql(field: &str, scope: FieldScope) -> StoreResult<String> {
    let field = validate_field(field)?;
    if field == ID_FIELD && scope == FieldScope::Stored {
        return Err(StoreError::UnsupportedValue {
            field: field.to_string(),
            reason: "`_id` is always an integer".to_string(),
        });
    }
    Ok(format!("json_type(body, '$.{field}')"))
}

/// Converts a scalar JSON value into a bindable SQL value.
///
/// Booleans, nulls, arrays and objects are rejected; comparisons on those
/// are expressed through [`type_sql`] by the caller.
pub fn scalar_to_sql(field: &str, value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(SqlValue::Integer(int))
            } else if let Some(real) = number.as_f64() {
                Ok(SqlValue::Real(real))
            } else {
                Err(StoreError::UnsupportedValue {
                    field: field.to_string(),
                    reason: format!("number `{number}` is out of range"),
                })
            }
        }
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => {
            Err(StoreError::UnsupportedValue {
                field: field.to_string(),
                reason: format!("expected a string or number, got `{value}`"),
            })
        }
    }
}

pub(crate) fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Renders `LIMIT`/`OFFSET`; empty when neither applies.
pub(crate) fn window_sql(skip: u64, limit: Option<u64>) -> String {
    if skip == 0 && limit.is_none() {
        return String::new();
    }
    let limit = limit.map_or(-1, clamp_to_i64);
    format!(" LIMIT {limit} OFFSET {}", clamp_to_i64(skip))
}
