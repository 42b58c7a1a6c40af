//! Service Layer Error Types
//!
//! Error types for the migration engine, the link index, and item CRUD.
//! Unresolved or ambiguous note references are NOT errors; they are
//! ordinary states on `ResolvedLink`.

use crate::db::DatabaseError;
use thiserror::Error;

/// Migration engine errors
///
/// Both variants are fatal for store initialization: the caller decides
/// whether to abort startup, alert, or open read-only. The engine never
/// retries on its own.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The store was written by a newer build; refusing to touch it
    #[error(
        "Store schema version {found} is newer than the highest known migration {supported}; refusing to run"
    )]
    SchemaTooNew { found: i64, supported: i64 },

    /// A specific migration's transaction failed and was rolled back
    ///
    /// The version marker still points at the last migration that
    /// committed; re-running starts from the failed migration again.
    #[error("Migration {version} ({name}) failed: {source}")]
    MigrationFailed {
        version: i64,
        name: String,
        source: anyhow::Error,
    },

    /// Storage failure outside any migration's own transaction
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl MigrationError {
    pub fn schema_too_new(found: i64, supported: i64) -> Self {
        Self::SchemaTooNew { found, supported }
    }

    pub fn migration_failed(
        version: i64,
        name: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::MigrationFailed {
            version,
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Link index maintenance errors
///
/// The index is strictly derived: a failed update leaves note content
/// untouched and at worst a stale backlink set, recoverable via
/// `rebuild_all`.
#[derive(Error, Debug)]
pub enum LinkIndexError {
    /// An incremental update's transaction failed for one note
    #[error("Link index update failed for note {note_id}: {source}")]
    UpdateFailed {
        note_id: String,
        source: DatabaseError,
    },

    /// Storage failure during rebuild or queries
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl LinkIndexError {
    pub fn update_failed(note_id: impl Into<String>, source: DatabaseError) -> Self {
        Self::UpdateFailed {
            note_id: note_id.into(),
            source,
        }
    }
}

/// Item CRUD errors
#[derive(Error, Debug)]
pub enum ItemServiceError {
    /// Item not found by id
    #[error("Item not found: {id}")]
    NotFound { id: String },

    /// An update tried to switch an item to a different type
    #[error("Item {id} is a {current}; its type cannot change to {requested}")]
    TypeChangeRejected {
        id: String,
        current: &'static str,
        requested: &'static str,
    },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl ItemServiceError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

/// Reminder CRUD errors
#[derive(Error, Debug)]
pub enum ReminderError {
    /// Reminder not found by id
    #[error("Reminder not found: {id}")]
    NotFound { id: String },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl ReminderError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
