//! Database Connection Management
//!
//! This module provides the storage adapter for VaultOps: connection
//! handling, parameterized statement execution, explicit transactions,
//! the schema version marker, and the small `meta` key-value store.
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any valid PathBuf for the store file
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: enabled for referential integrity
//! - **Version marker**: `PRAGMA user_version`, written inside the same
//!   transaction as the schema change it records
//!
//! # Connection Pattern
//!
//! Every operation acquires its own connection via
//! [`DatabaseService::connect_with_timeout`]. The 5-second busy timeout
//! allows concurrent operations to wait and retry instead of failing
//! immediately with `SQLITE_BUSY` errors when the Tokio runtime
//! interleaves tasks sharing the store.
//!
//! Multi-statement sequences (migrations, link index maintenance) run
//! inside one explicit transaction on one connection via
//! [`DatabaseService::begin`] / [`DatabaseService::commit`] /
//! [`DatabaseService::rollback`].

use crate::db::error::DatabaseError;
use libsql::params::IntoParams;
use libsql::{Builder, Connection, Database, Row};
use std::path::PathBuf;
use std::sync::Arc;

/// Keys of the persistent `meta` key-value store
pub mod meta_keys {
    /// RFC3339 timestamp of the last successful migration run
    pub const LAST_MIGRATED_AT: &str = "db.last_migrated_at";
    /// RFC3339 timestamp of the last full link index rebuild
    pub const LINKS_LAST_REBUILD_AT: &str = "links.last_rebuild_at";
}

/// Storage adapter for the embedded libsql store
///
/// # Examples
///
/// ```no_run
/// use vaultops_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/vaultops.db")).await?;
///     let conn = db.connect_with_timeout().await?;
///     let version = db.read_user_version(&conn).await?;
///     println!("store at schema version {version}");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing across tasks)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Open (or create) the store at the given path
    ///
    /// Ensures the parent directory exists, opens the database file, and
    /// configures WAL mode and foreign keys. Schema creation is NOT done
    /// here; it belongs to the migration engine, which must observe the
    /// store's version marker first.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        let conn = service.connect_with_timeout().await?;
        service.execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;
        service.execute_pragma(&conn, "PRAGMA foreign_keys = ON").await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute(). This helper encapsulates that pattern.
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Multiple connections can be used concurrently thanks to WAL mode.
    /// Prefer [`Self::connect_with_timeout`] in async contexts.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the busy timeout and foreign keys configured
    ///
    /// Sets a 5-second busy timeout so concurrent operations wait and
    /// retry instead of failing immediately when the store is locked.
    /// Foreign key enforcement is per-connection in SQLite, so it is
    /// re-enabled here rather than only at open. This is the safe
    /// default everywhere in the crate.
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000").await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON").await?;
        Ok(conn)
    }

    /// Execute a parameterized statement with no result rows
    ///
    /// Returns the number of affected rows. `context` names the calling
    /// operation and is carried into the error message.
    pub async fn execute(
        &self,
        conn: &Connection,
        sql: &str,
        params: impl IntoParams,
        context: &str,
    ) -> Result<u64, DatabaseError> {
        conn.execute(sql, params)
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))
    }

    /// Fetch zero or one row
    pub async fn fetch_one(
        &self,
        conn: &Connection,
        sql: &str,
        params: impl IntoParams,
        context: &str,
    ) -> Result<Option<Row>, DatabaseError> {
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))?;
        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))
    }

    /// Fetch all matching rows
    pub async fn fetch_all(
        &self,
        conn: &Connection,
        sql: &str,
        params: impl IntoParams,
        context: &str,
    ) -> Result<Vec<Row>, DatabaseError> {
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))?;

        let mut result = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))?
        {
            result.push(row);
        }
        Ok(result)
    }

    /// Begin an explicit transaction on this connection
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent
    /// writers queue on the busy timeout instead of failing mid-sequence
    /// on a lock upgrade.
    pub async fn begin(&self, conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
            })?;
        Ok(())
    }

    /// Commit the transaction open on this connection
    pub async fn commit(&self, conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("COMMIT", ())
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
            })?;
        Ok(())
    }

    /// Roll back the transaction open on this connection
    ///
    /// Best-effort: a rollback failure is reported but callers typically
    /// surface the original error instead.
    pub async fn rollback(&self, conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("ROLLBACK", ())
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to roll back transaction: {}", e))
            })?;
        Ok(())
    }

    /// Read the schema version marker (`PRAGMA user_version`)
    pub async fn read_user_version(&self, conn: &Connection) -> Result<i64, DatabaseError> {
        let row = self
            .fetch_one(conn, "PRAGMA user_version", (), "read_user_version")
            .await?
            .ok_or_else(|| {
                DatabaseError::sql_execution("PRAGMA user_version returned no rows".to_string())
            })?;
        row.get::<i64>(0)
            .map_err(|e| DatabaseError::row_conversion(format!("user_version: {}", e)))
    }

    /// Write the schema version marker
    ///
    /// `PRAGMA user_version` participates in the surrounding transaction,
    /// so a migration and its marker advance commit together.
    pub async fn write_user_version(
        &self,
        conn: &Connection,
        version: i64,
    ) -> Result<(), DatabaseError> {
        // The pragma does not take bound parameters; the value is an
        // integer under our control, never user input.
        self.execute_pragma(conn, &format!("PRAGMA user_version = {}", version))
            .await
    }

    /// Read a value from the `meta` key-value store
    pub async fn get_meta(
        &self,
        conn: &Connection,
        key: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let row = self
            .fetch_one(
                conn,
                "SELECT value FROM meta WHERE key = ?",
                [key],
                "get_meta",
            )
            .await?;
        match row {
            Some(row) => {
                let value = row
                    .get::<String>(0)
                    .map_err(|e| DatabaseError::row_conversion(format!("meta.value: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Write a value into the `meta` key-value store
    pub async fn set_meta(
        &self,
        conn: &Connection,
        key: &str,
        value: &str,
    ) -> Result<(), DatabaseError> {
        self.execute(
            conn,
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
            [key, value],
            "set_meta",
        )
        .await?;
        Ok(())
    }

    /// Check whether a table exists in the store
    pub async fn table_exists(
        &self,
        conn: &Connection,
        table: &str,
    ) -> Result<bool, DatabaseError> {
        let row = self
            .fetch_one(
                conn,
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table],
                "table_exists",
            )
            .await?;
        Ok(row.is_some())
    }
}
