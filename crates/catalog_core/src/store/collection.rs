//! Collection contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide document CRUD, find, aggregation, index and explain APIs.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - Every statement is scoped to one collection via `collection = ?`.
//! - Multi-document writes run inside a single transaction.
//! - Sorted finds break ties by `_id` ascending.

use super::field::{
    clamp_to_i64, validate_identifier, value_sql, window_sql, FieldScope, ID_FIELD,
};
use super::filter::Filter;
use super::index::{classify_plan, sqlite_index_name, ExplainStats, IndexSpec};
use super::options::{FindOptions, Hint, Update};
use super::pipeline::Pipeline;
use super::{Document, StoreError, StoreResult};
use crate::db::migrations::latest_version;
use log::{debug, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Scalar function counting rows visited while an explain query runs.
const EXAMINE_FN: &str = "catalog_examine";

/// Outcome of [`DocumentCollection::insert_many_documents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<i64>,
}

impl InsertManyResult {
    pub fn inserted_count(&self) -> usize {
        self.inserted_ids.len()
    }
}

/// Outcome of [`DocumentCollection::update_one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched_count: u64,
    /// `0` when the update left the matched document unchanged.
    pub modified_count: u64,
}

/// Operations a document collection offers to callers.
pub trait DocumentCollection {
    fn name(&self) -> &str;
    fn insert_many_documents(&self, documents: Vec<Document>) -> StoreResult<InsertManyResult>;
    fn delete_many(&self, filter: &Filter) -> StoreResult<u64>;
    /// Deletes the first match in `_id` order.
    fn delete_one(&self, filter: &Filter) -> StoreResult<u64>;
    /// Updates the first match in `_id` order.
    fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult>;
    fn count_documents(&self, filter: &Filter) -> StoreResult<u64>;
    fn find(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Vec<Document>>;
    fn aggregate(&self, pipeline: &Pipeline) -> StoreResult<Vec<Document>>;
    /// Creates the index if missing and returns its name.
    fn create_index(&self, spec: &IndexSpec) -> StoreResult<String>;
    fn list_indexes(&self) -> StoreResult<Vec<String>>;
    /// Returns `false` when no index with this name exists.
    fn drop_index(&self, name: &str) -> StoreResult<bool>;
    /// Runs the find and reports how the engine executed it.
    fn explain(&self, filter: &Filter, options: &FindOptions) -> StoreResult<ExplainStats>;

    /// Serializes each record to a JSON object and inserts them all.
    fn insert_many<T: Serialize>(&self, records: &[T]) -> StoreResult<InsertManyResult>
    where
        Self: Sized,
    {
        let documents = records
            .iter()
            .map(to_document)
            .collect::<StoreResult<Vec<_>>>()?;
        self.insert_many_documents(documents)
    }

    fn find_one(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Option<Document>> {
        let options = options.clone().limit(1);
        Ok(self.find(filter, &options)?.into_iter().next())
    }
}

/// Converts a serializable record into a document.
pub fn to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record)? {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got `{other}`"
        ))),
    }
}

/// SQLite-backed collection borrowing an initialized connection.
pub struct SqliteCollection<'conn> {
    conn: &'conn Connection,
    name: String,
}

impl<'conn> SqliteCollection<'conn> {
    /// Binds to `name` on a connection opened through `db::open_*`.
    pub fn try_new(conn: &'conn Connection, name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        ensure_connection_ready(conn)?;
        Ok(Self { conn, name })
    }

    fn select_sql(
        &self,
        filter: &Filter,
        options: &FindOptions,
        binds: &mut Vec<SqlValue>,
        instrumented: bool,
    ) -> StoreResult<String> {
        if let Some(projection) = &options.projection {
            projection.validate()?;
        }

        let mut sql = String::from("SELECT id, body FROM documents");
        match &options.hint {
            Some(Hint::Natural) => sql.push_str(" NOT INDEXED"),
            Some(Hint::Index(index)) => {
                validate_identifier(index)?;
                sql.push_str(&format!(
                    " INDEXED BY \"{}\"",
                    sqlite_index_name(&self.name, index)
                ));
            }
            None => {}
        }

        sql.push_str(" WHERE collection = ?");
        binds.push(SqlValue::Text(self.name.clone()));
        if instrumented {
            sql.push_str(&format!(" AND {EXAMINE_FN}(id)"));
        }
        let clause = filter.to_sql(FieldScope::Stored, binds)?;
        sql.push_str(" AND ");
        sql.push_str(&clause);

        let mut order = Vec::with_capacity(options.sort.len() + 1);
        for key in &options.sort {
            order.push(format!(
                "{} {}",
                value_sql(&key.field, FieldScope::Stored)?,
                key.direction.sql()
            ));
        }
        if !options.sort.iter().any(|key| key.field == ID_FIELD) {
            order.push("id ASC".to_string());
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
        sql.push_str(&window_sql(options.skip, options.limit));

        Ok(sql)
    }

    fn first_match_id(&self, filter: &Filter) -> StoreResult<Option<i64>> {
        let mut binds = vec![SqlValue::Text(self.name.clone())];
        let clause = filter.to_sql(FieldScope::Stored, &mut binds)?;
        let id = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM documents WHERE collection = ? AND {clause} ORDER BY id LIMIT 1"
                ),
                params_from_iter(binds),
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id)
    }

    fn run_explain(
        &self,
        sql: &str,
        binds: &[SqlValue],
        examined: &AtomicU64,
    ) -> StoreResult<ExplainStats> {
        let plan = {
            let mut stmt = self.conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
            let rows = stmt.query_map(params_from_iter(binds), |row| row.get::<_, String>(3))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let (stage, index_name) = classify_plan(&plan, &self.name);

        let started_at = Instant::now();
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut docs_returned = 0_u64;
        while rows.next()?.is_some() {
            docs_returned += 1;
        }
        let execution_time_millis = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(ExplainStats {
            stage,
            index_name,
            docs_examined: examined.load(Ordering::Relaxed),
            docs_returned,
            execution_time_millis,
            plan,
        })
    }
}

impl DocumentCollection for SqliteCollection<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_many_documents(&self, documents: Vec<Document>) -> StoreResult<InsertManyResult> {
        if documents.iter().any(|document| document.contains_key(ID_FIELD)) {
            return Err(StoreError::InvalidDocument(
                "`_id` is assigned by the store".to_string(),
            ));
        }

        let bodies = documents
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted_ids = Vec::with_capacity(bodies.len());
        {
            let mut stmt =
                tx.prepare("INSERT INTO documents (collection, body) VALUES (?1, json(?2));")?;
            for body in &bodies {
                stmt.execute(params![self.name, body])?;
                inserted_ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;

        debug!(
            "event=insert_many module=store status=ok collection={} inserted={}",
            self.name,
            inserted_ids.len()
        );
        Ok(InsertManyResult { inserted_ids })
    }

    fn delete_many(&self, filter: &Filter) -> StoreResult<u64> {
        let mut binds = vec![SqlValue::Text(self.name.clone())];
        let clause = filter.to_sql(FieldScope::Stored, &mut binds)?;
        let deleted = self.conn.execute(
            &format!("DELETE FROM documents WHERE collection = ? AND {clause};"),
            params_from_iter(binds),
        )?;
        Ok(deleted as u64)
    }

    fn delete_one(&self, filter: &Filter) -> StoreResult<u64> {
        let Some(id) = self.first_match_id(filter)? else {
            return Ok(0);
        };
        let deleted = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1;", [id])?;
        Ok(deleted as u64)
    }

    fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult> {
        let (set_sql, set_values) = update.to_sql()?;
        let Some(id) = self.first_match_id(filter)? else {
            return Ok(UpdateResult {
                matched_count: 0,
                modified_count: 0,
            });
        };

        let mut binds: Vec<SqlValue> = set_values.iter().cloned().map(SqlValue::Text).collect();
        binds.push(SqlValue::Integer(id));
        binds.extend(set_values.into_iter().map(SqlValue::Text));

        let modified = self.conn.execute(
            &format!(
                "UPDATE documents
                 SET body = {set_sql}, updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ? AND body IS NOT {set_sql};"
            ),
            params_from_iter(binds),
        )?;

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: modified as u64,
        })
    }

    fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        let mut binds = vec![SqlValue::Text(self.name.clone())];
        let clause = filter.to_sql(FieldScope::Stored, &mut binds)?;
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM documents WHERE collection = ? AND {clause};"),
            params_from_iter(binds),
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Vec<Document>> {
        let mut binds = Vec::new();
        let sql = self.select_sql(filter, options, &mut binds, false)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut documents = Vec::new();

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let body: String = row.get(1)?;
            let mut document = parse_document(&body)?;
            document.insert(ID_FIELD.to_string(), Value::from(id));
            documents.push(match &options.projection {
                Some(projection) => projection.apply(document),
                None => document,
            });
        }

        Ok(documents)
    }

    fn aggregate(&self, pipeline: &Pipeline) -> StoreResult<Vec<Document>> {
        let (sql, binds) = pipeline.compile(&self.name)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut documents = Vec::new();

        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(parse_document(&body)?);
        }

        Ok(documents)
    }

    fn create_index(&self, spec: &IndexSpec) -> StoreResult<String> {
        let name = spec.index_name()?;
        validate_identifier(&name)?;

        let mut columns = vec!["collection".to_string()];
        for key in &spec.keys {
            columns.push(format!(
                "{} {}",
                value_sql(&key.field, FieldScope::Stored)?,
                key.direction.sql()
            ));
        }

        self.conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS \"{}\" ON documents ({});",
            sqlite_index_name(&self.name, &name),
            columns.join(", ")
        ))?;

        info!(
            "event=create_index module=store status=ok collection={} index={}",
            self.name, name
        );
        Ok(name)
    }

    fn list_indexes(&self) -> StoreResult<Vec<String>> {
        let prefix = sqlite_index_name(&self.name, "");
        let mut stmt = self.conn.prepare(
            "SELECT name
             FROM sqlite_master
             WHERE type = 'index'
               AND tbl_name = 'documents'
               AND substr(name, 1, ?1) = ?2
             ORDER BY name;",
        )?;
        let prefix_len = clamp_to_i64(prefix.chars().count() as u64);
        let names = stmt
            .query_map(params![prefix_len, prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    fn drop_index(&self, name: &str) -> StoreResult<bool> {
        validate_identifier(name)?;
        if !self.list_indexes()?.iter().any(|existing| existing == name) {
            return Ok(false);
        }
        self.conn.execute_batch(&format!(
            "DROP INDEX \"{}\";",
            sqlite_index_name(&self.name, name)
        ))?;
        Ok(true)
    }

    fn explain(&self, filter: &Filter, options: &FindOptions) -> StoreResult<ExplainStats> {
        let mut binds = Vec::new();
        let sql = self.select_sql(filter, options, &mut binds, true)?;

        let examined = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&examined);
        // Not deterministic, so SQLite evaluates it once per visited row.
        self.conn.create_scalar_function(
            EXAMINE_FN,
            1,
            FunctionFlags::SQLITE_UTF8,
            move |_ctx| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(1_i64)
            },
        )?;

        let result = self.run_explain(&sql, &binds, &examined);
        self.conn.remove_function(EXAMINE_FN, 1)?;
        let stats = result?;

        debug!(
            "event=explain module=store status=ok collection={} stage={} examined={} returned={}",
            self.name, stats.stage, stats.docs_examined, stats.docs_returned
        );
        Ok(stats)
    }
}

fn parse_document(body: &str) -> StoreResult<Document> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::InvalidDocument(format!(
            "stored body is not an object: `{other}`"
        ))),
    }
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'documents'
        );",
        [],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(StoreError::MissingRequiredTable("documents"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{to_document, DocumentCollection, SqliteCollection};
    use crate::db::open_db_in_memory;
    use crate::store::{Filter, FindOptions, StoreError};
    use rusqlite::Connection;
    use serde_json::json;

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteCollection::try_new(&conn, "books").err().unwrap();
        assert!(matches!(err, StoreError::UninitializedConnection { .. }));
    }

    #[test]
    fn try_new_rejects_invalid_collection_name() {
        let conn = open_db_in_memory().unwrap();
        let err = SqliteCollection::try_new(&conn, "books; DROP").err().unwrap();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }

    #[test]
    fn to_document_rejects_non_objects() {
        assert!(to_document(&json!({"a": 1})).is_ok());
        assert!(matches!(
            to_document(&json!([1, 2])).unwrap_err(),
            StoreError::InvalidDocument(_)
        ));
    }

    #[test]
    fn collections_are_isolated() {
        let conn = open_db_in_memory().unwrap();
        let books = SqliteCollection::try_new(&conn, "books").unwrap();
        let films = SqliteCollection::try_new(&conn, "films").unwrap();
        books.insert_many(&[json!({"title": "Dune"})]).unwrap();
        films.insert_many(&[json!({"title": "Dune"}), json!({"title": "Alien"})]).unwrap();

        assert_eq!(books.count_documents(&Filter::All).unwrap(), 1);
        assert_eq!(films.delete_many(&Filter::All).unwrap(), 2);
        assert_eq!(books.find(&Filter::All, &FindOptions::default()).unwrap().len(), 1);
    }
}
