//! Scoped connection to the catalog store.
//!
//! # Invariants
//! - A session exists only after the store opened and the collection bound.
//! - `disconnect` consumes the session, so it runs at most once.

use super::{CatalogError, CatalogResult};
use crate::config::{CatalogConfig, COLLECTION_NAME};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::store::{SqliteCollection, StoreResult};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Open connection bound to the catalog collection.
#[derive(Debug)]
pub struct CatalogSession {
    conn: Connection,
    target: String,
}

impl CatalogSession {
    /// Opens the configured database and binds the catalog collection.
    ///
    /// # Errors
    /// - `CatalogError::Connection` when the endpoint cannot be opened, is
    ///   not a database, or carries an unsupported schema.
    pub fn connect(config: &CatalogConfig) -> CatalogResult<Self> {
        let started_at = Instant::now();
        let target = config.target_label();
        info!("event=connect module=service status=start target={target}");

        let opened = match config.database_path() {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        };
        let result = opened
            .map_err(|err| CatalogError::Connection {
                target: target.clone(),
                source: err.into(),
            })
            .and_then(|conn| Self::from_connection(conn, target.clone()));

        match &result {
            Ok(_) => info!(
                "event=connect module=service status=ok target={} duration_ms={}",
                target,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=connect module=service status=error target={} duration_ms={} error_code=connect_failed error={}",
                target,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Wraps a connection already opened through `db::open_*`.
    pub fn from_connection(conn: Connection, target: impl Into<String>) -> CatalogResult<Self> {
        let target = target.into();
        if let Err(source) = SqliteCollection::try_new(&conn, COLLECTION_NAME) {
            return Err(CatalogError::Connection { target, source });
        }
        Ok(Self { conn, target })
    }

    /// Borrows the catalog collection.
    pub fn collection(&self) -> StoreResult<SqliteCollection<'_>> {
        SqliteCollection::try_new(&self.conn, COLLECTION_NAME)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Closes the connection.
    pub fn disconnect(self) -> CatalogResult<()> {
        let Self { conn, target } = self;
        match conn.close() {
            Ok(()) => {
                info!("event=disconnect module=service status=ok target={target}");
                Ok(())
            }
            Err((_conn, err)) => {
                error!(
                    "event=disconnect module=service status=error target={} error={}",
                    target, err
                );
                Err(CatalogError::Disconnect {
                    target,
                    source: DbError::Sqlite(err),
                })
            }
        }
    }
}
