//! Store Health Snapshot
//!
//! Diagnostic view of the store used by settings/debug surfaces: the
//! schema version marker, which core tables exist, and the maintenance
//! timestamps kept in `meta`.

use crate::db::database::{meta_keys, DatabaseService};
use crate::db::error::DatabaseError;
use serde::Serialize;

/// Tables created by the initial migration
const CORE_TABLES: [&str; 8] = [
    "areas",
    "tags",
    "items",
    "item_tags",
    "reminders",
    "note_links",
    "action_events",
    "meta",
];

/// Existence check result for one core table
#[derive(Debug, Clone, Serialize)]
pub struct TableCheck {
    pub table: String,
    pub exists: bool,
}

/// Point-in-time health view of the store
#[derive(Debug, Clone, Serialize)]
pub struct DbHealthSnapshot {
    pub user_version: i64,
    pub tables: Vec<TableCheck>,
    pub last_migrated_at: Option<String>,
    pub links_last_rebuild_at: Option<String>,
}

impl DbHealthSnapshot {
    /// Whether every core table exists
    pub fn all_tables_present(&self) -> bool {
        self.tables.iter().all(|t| t.exists)
    }

    /// JSON rendering for settings/debug surfaces
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Read a health snapshot from the store
///
/// Read-only; safe to call before migrations have run (missing tables
/// simply report `exists: false` and meta values come back `None`).
pub async fn health_snapshot(db: &DatabaseService) -> Result<DbHealthSnapshot, DatabaseError> {
    let conn = db.connect_with_timeout().await?;

    let user_version = db.read_user_version(&conn).await?;

    let mut tables = Vec::with_capacity(CORE_TABLES.len());
    for table in CORE_TABLES {
        tables.push(TableCheck {
            table: table.to_string(),
            exists: db.table_exists(&conn, table).await?,
        });
    }

    let meta_present = tables
        .iter()
        .any(|t| t.table == "meta" && t.exists);
    let (last_migrated_at, links_last_rebuild_at) = if meta_present {
        (
            db.get_meta(&conn, meta_keys::LAST_MIGRATED_AT).await?,
            db.get_meta(&conn, meta_keys::LINKS_LAST_REBUILD_AT).await?,
        )
    } else {
        (None, None)
    };

    Ok(DbHealthSnapshot {
        user_version,
        tables,
        last_migrated_at,
        links_last_rebuild_at,
    })
}
