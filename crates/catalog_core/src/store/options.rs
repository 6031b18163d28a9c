//! Find options, sort keys, projections and update documents.

use super::field::{validate_field, validate_output_name, ID_FIELD};
use super::{Document, StoreError, StoreResult};
use serde_json::Value;

/// Ordering direction for sorts and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    /// `1` or `-1`, as used in generated index names.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Inclusion projection over top-level fields.
///
/// `_id` is returned unless [`Projection::without_id`] is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub fields: Vec<String>,
    pub include_id: bool,
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            include_id: true,
        }
    }

    pub fn without_id(mut self) -> Self {
        self.include_id = false;
        self
    }

    pub(crate) fn validate(&self) -> StoreResult<()> {
        for field in &self.fields {
            validate_output_name(field)?;
        }
        Ok(())
    }

    pub(crate) fn apply(&self, mut document: Document) -> Document {
        let mut projected = Document::new();
        if self.include_id {
            if let Some(id) = document.remove(ID_FIELD) {
                projected.insert(ID_FIELD.to_string(), id);
            }
        }
        for field in &self.fields {
            if field == ID_FIELD {
                continue;
            }
            if let Some(value) = document.remove(field) {
                projected.insert(field.clone(), value);
            }
        }
        projected
    }
}

/// Index selection override for a find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hint {
    /// Forces a full collection scan.
    Natural,
    /// Forces the named index (as returned by `create_index`).
    Index(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
    pub hint: Option<Hint>,
}

impl FindOptions {
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn hint(mut self, hint: Hint) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// `$set`-style update: each entry replaces one field value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Vec<(String, Value)>,
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    /// Renders `json_set(body, ...)` and the JSON text of each new value.
    pub(crate) fn to_sql(&self) -> StoreResult<(String, Vec<String>)> {
        if self.set.is_empty() {
            return Err(StoreError::InvalidDocument(
                "update must set at least one field".to_string(),
            ));
        }

        let mut sql = String::from("json_set(body");
        let mut values = Vec::with_capacity(self.set.len());
        for (field, value) in &self.set {
            let field = validate_field(field)?;
            if field == ID_FIELD {
                return Err(StoreError::InvalidField(format!("{field} is immutable")));
            }
            sql.push_str(&format!(", '$.{field}', json(?)"));
            values.push(serde_json::to_string(value)?);
        }
        sql.push(')');
        Ok((sql, values))
    }
}

#[cfg(test)]
mod tests {
    use super::{Projection, Update};
    use crate::store::{Document, StoreError};
    use serde_json::json;

    fn document(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn projection_keeps_listed_fields_and_id_by_default() {
        let doc = document(json!({"_id": 7, "title": "Dune", "price": 9.5, "pages": 412}));
        let projected = Projection::include(["title", "price"]).apply(doc);
        assert_eq!(projected, document(json!({"_id": 7, "title": "Dune", "price": 9.5})));
    }

    #[test]
    fn projection_without_id_drops_it() {
        let doc = document(json!({"_id": 7, "title": "Dune"}));
        let projected = Projection::include(["title", "missing"]).without_id().apply(doc);
        assert_eq!(projected, document(json!({"title": "Dune"})));
    }

    #[test]
    fn update_renders_json_set_chain() {
        let (sql, values) = Update::set("price", 12.99).and_set("in_stock", false).to_sql().unwrap();
        assert_eq!(sql, "json_set(body, '$.price', json(?), '$.in_stock', json(?))");
        assert_eq!(values, vec!["12.99".to_string(), "false".to_string()]);
    }

    #[test]
    fn update_rejects_id_and_empty_sets() {
        assert!(matches!(
            Update::set("_id", 1).to_sql().unwrap_err(),
            StoreError::InvalidField(_)
        ));
        assert!(matches!(
            Update::default().to_sql().unwrap_err(),
            StoreError::InvalidDocument(_)
        ));
    }
}
