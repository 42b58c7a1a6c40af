//! Database Layer
//!
//! All interaction with the embedded libsql store:
//!
//! - [`DatabaseService`] - connections, statements, transactions, the
//!   schema version marker, and the `meta` key-value store
//! - [`sql`] - single-statement INSERT/UPDATE builders
//! - [`row`] - the pure Item ⟷ flat-row mapping
//! - [`health`] - diagnostic store snapshot
//!
//! Schema creation and evolution live in `services::migrations`; this
//! layer never creates tables on its own.

mod database;
mod error;
pub mod health;
pub mod row;
pub mod sql;

pub use database::{meta_keys, DatabaseService};
pub use error::DatabaseError;
pub use health::{health_snapshot, DbHealthSnapshot, TableCheck};
