//! VaultOps Core Data Layer
//!
//! Data management for the VaultOps personal knowledge and task manager:
//! schema migrations, item CRUD, and the wiki-style note link graph.
//!
//! # Architecture
//!
//! - **Unified items table**: note/task/event share one row shape; the
//!   closed [`models::ItemKind`] variant carries type-specific fields
//! - **Versioned migrations**: `PRAGMA user_version` tracks the schema,
//!   each migration commits atomically with its marker advance
//! - **Derived link index**: `note_links` is rebuilt from note text,
//!   never hand-edited, and maintained incrementally with per-note
//!   debouncing
//! - **libsql**: embedded SQLite-compatible database, WAL mode
//!
//! # Modules
//!
//! - [`models`] - Data structures (Item, links, snapshots)
//! - [`db`] - Storage adapter, row mapping, SQL builders, health
//! - [`services`] - Migration engine, link engine, item CRUD

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use db::{DatabaseError, DatabaseService};
pub use models::*;
pub use services::{
    AreaService, ItemService, ItemServiceError, LinkIndexError, LinkIndexScheduler,
    LinkIndexService, MigrationError, MigrationRunner, ReminderError, ReminderService,
    TagService, SCHEMA_VERSION,
};
