//! Query filters and their SQL translation.
//!
//! # Invariants
//! - Equality on booleans matches JSON booleans only, never `0`/`1` numbers.
//! - Equality on null matches both missing fields and explicit nulls.
//! - Range operators accept strings and numbers only, and match stored values
//!   of the same JSON type.

use super::field::{scalar_to_sql, type_sql, value_sql, FieldScope, ID_FIELD};
use super::{StoreError, StoreResult};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Document predicate evaluated by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

#[derive(Debug, Clone, Copy)]
enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    fn sql(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    pub fn in_values<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Conjunction with `other`, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, other) => other,
            (this, Self::All) => this,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Renders this filter as a SQL boolean expression, appending bind values
    /// in the order their placeholders appear.
    pub(crate) fn to_sql(&self, scope: FieldScope, binds: &mut Vec<SqlValue>) -> StoreResult<String> {
        match self {
            Self::All => Ok("1".to_string()),
            Self::Eq(field, value) => equality_sql(field, value, scope, binds, false),
            Self::Ne(field, value) => equality_sql(field, value, scope, binds, true),
            Self::Gt(field, value) => range_sql(field, value, RangeOp::Gt, scope, binds),
            Self::Gte(field, value) => range_sql(field, value, RangeOp::Gte, scope, binds),
            Self::Lt(field, value) => range_sql(field, value, RangeOp::Lt, scope, binds),
            Self::Lte(field, value) => range_sql(field, value, RangeOp::Lte, scope, binds),
            Self::In(field, values) => in_sql(field, values, scope, binds),
            Self::And(filters) => join_sql(filters, " AND ", "1", scope, binds),
            Self::Or(filters) => join_sql(filters, " OR ", "0", scope, binds),
        }
    }
}

fn equality_sql(
    field: &str,
    value: &Value,
    scope: FieldScope,
    binds: &mut Vec<SqlValue>,
    negate: bool,
) -> StoreResult<String> {
    match value {
        Value::Null => {
            let column = value_sql(field, scope)?;
            let op = if negate { "IS NOT" } else { "IS" };
            Ok(format!("{column} {op} NULL"))
        }
        Value::Bool(flag) => {
            let json_type = type_sql(field, scope)?;
            let op = if negate { "IS NOT" } else { "=" };
            Ok(format!("{json_type} {op} '{flag}'"))
        }
        _ => {
            let column = value_sql(field, scope)?;
            binds.push(scalar_to_sql(field, value)?);
            // `IS NOT` keeps documents missing the field, like `$ne`.
            let op = if negate { "IS NOT" } else { "=" };
            Ok(format!("{column} {op} ?"))
        }
    }
}

fn range_sql(
    field: &str,
    value: &Value,
    op: RangeOp,
    scope: FieldScope,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<String> {
    if matches!(value, Value::Bool(_) | Value::Null) {
        return Err(StoreError::UnsupportedValue {
            field: field.to_string(),
            reason: format!("range comparison against `{value}`"),
        });
    }
    let column = value_sql(field, scope)?;
    binds.push(scalar_to_sql(field, value)?);
    let comparison = format!("{column} {} ?", op.sql());

    // `_id` in stored documents is the integer row id.
    if field == ID_FIELD && scope == FieldScope::Stored {
        return Ok(comparison);
    }
    let json_type = type_sql(field, scope)?;
    let guard = match value {
        Value::String(_) => format!("{json_type} = 'text'"),
        _ => format!("{json_type} IN ('integer', 'real')"),
    };
    Ok(format!("({comparison} AND {guard})"))
}

/// Membership test; booleans and null are matched by JSON type, the rest by value.
fn in_sql(
    field: &str,
    values: &[Value],
    scope: FieldScope,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<String> {
    if values.is_empty() {
        return Ok("0".to_string());
    }

    let mut alternatives = Vec::new();
    let mut placeholders = Vec::new();
    for value in values {
        match value {
            Value::Bool(_) | Value::Null => {
                alternatives.push(equality_sql(field, value, scope, binds, false)?);
            }
            _ => {
                binds.push(scalar_to_sql(field, value)?);
                placeholders.push("?");
            }
        }
    }
    if !placeholders.is_empty() {
        let column = value_sql(field, scope)?;
        alternatives.push(format!("{column} IN ({})", placeholders.join(", ")));
    }

    if alternatives.len() == 1 {
        return Ok(alternatives.remove(0));
    }
    Ok(format!("({})", alternatives.join(" OR ")))
}

fn join_sql(
    filters: &[Filter],
    separator: &str,
    empty: &str,
    scope: FieldScope,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<String> {
    if filters.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = filters
        .iter()
        .map(|filter| filter.to_sql(scope, binds))
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(format!("({})", parts.join(separator)))
}

#[cfg(test)]
mod tests {
    use super::Filter;
    use crate::store::field::FieldScope;
    use crate::store::StoreError;
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn and_flattens_and_drops_match_all() {
        let filter = Filter::All
            .and(Filter::eq("in_stock", true))
            .and(Filter::gt("published_year", 2010));
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected filter: {other:?}"),
        }
    }

    #[test]
    fn compound_filter_binds_values_in_placeholder_order() {
        let filter = Filter::eq("author", "Andy Weir").and(Filter::gt("published_year", 2010));
        let mut binds = Vec::new();
        let sql = filter.to_sql(FieldScope::Stored, &mut binds).unwrap();

        assert_eq!(
            sql,
            "(json_extract(body, '$.author') = ? AND (json_extract(body, '$.published_year') > ? \
             AND json_type(body, '$.published_year') IN ('integer', 'real')))"
        );
        assert_eq!(
            binds,
            vec![SqlValue::Text("Andy Weir".to_string()), SqlValue::Integer(2010)]
        );
    }

    #[test]
    fn boolean_equality_compares_json_type() {
        let mut binds = Vec::new();
        let sql = Filter::eq("in_stock", true)
            .to_sql(FieldScope::Stored, &mut binds)
            .unwrap();
        assert_eq!(sql, "json_type(body, '$.in_stock') = 'true'");
        assert!(binds.is_empty());
    }

    #[test]
    fn range_on_boolean_is_rejected() {
        let mut binds = Vec::new();
        let err = Filter::gt("in_stock", false)
            .to_sql(FieldScope::Stored, &mut binds)
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedValue { .. }));
    }

    #[test]
    fn string_range_requires_text() {
        let mut binds = Vec::new();
        let sql = Filter::lt("title", "M")
            .to_sql(FieldScope::Stored, &mut binds)
            .unwrap();
        assert_eq!(
            sql,
            "(json_extract(body, '$.title') < ? AND json_type(body, '$.title') = 'text')"
        );
    }

    #[test]
    fn id_range_skips_type_guard() {
        let mut binds = Vec::new();
        let sql = Filter::gte("_id", 3)
            .to_sql(FieldScope::Stored, &mut binds)
            .unwrap();
        assert_eq!(sql, "id >= ?");
    }

    #[test]
    fn in_mixes_booleans_and_scalars() {
        let mut binds = Vec::new();
        let sql = Filter::in_values("flag", [serde_json::json!(true), serde_json::json!("yes")])
            .to_sql(FieldScope::Stored, &mut binds)
            .unwrap();
        assert_eq!(
            sql,
            "(json_type(body, '$.flag') = 'true' OR json_extract(body, '$.flag') IN (?))"
        );
        assert_eq!(binds, vec![SqlValue::Text("yes".to_string())]);
    }

    #[test]
    fn empty_in_matches_nothing() {
        let mut binds = Vec::new();
        let sql = Filter::in_values("genre", Vec::<String>::new())
            .to_sql(FieldScope::Stored, &mut binds)
            .unwrap();
        assert_eq!(sql, "0");
    }
}
