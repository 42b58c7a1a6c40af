//! Schema Migration Engine
//!
//! Ordered, versioned, transactional schema evolution for the store.
//! The store's current version lives in `PRAGMA user_version`; each
//! migration runs inside its own transaction together with the marker
//! advance, so a crash or failure leaves the store exactly at the last
//! committed version. A store written by a newer build is refused, not
//! "repaired".

mod init;

pub use init::InitCoreTables;

use crate::db::{meta_keys, DatabaseService};
use crate::services::error::MigrationError;
use async_trait::async_trait;
use chrono::Utc;
use libsql::Connection;
use tracing::{info, warn};

/// Highest schema version this build knows about
pub const SCHEMA_VERSION: i64 = 1;

/// One versioned, forward-only schema change
///
/// `apply` runs inside a transaction opened by the runner; it must not
/// manage transactions itself. Statements should be idempotent
/// (`IF NOT EXISTS`, `INSERT OR IGNORE`) so a rerun after an external
/// crash-and-restore stays safe.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique, positive, strictly ordered version
    fn version(&self) -> i64;

    /// Human-readable name for logs and errors
    fn name(&self) -> &'static str;

    /// Apply the schema change on the given connection
    async fn apply(&self, conn: &Connection) -> anyhow::Result<()>;
}

/// All known migrations, in ascending version order
fn registry() -> Vec<Box<dyn Migration>> {
    vec![Box::new(InitCoreTables)]
}

/// Runs pending migrations against a store
///
/// # Examples
///
/// ```no_run
/// use vaultops_core::db::DatabaseService;
/// use vaultops_core::services::migrations::MigrationRunner;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/vaultops.db")).await?;
///     MigrationRunner::new().run(&db).await?;
///     Ok(())
/// }
/// ```
pub struct MigrationRunner {
    migrations: Vec<Box<dyn Migration>>,
    target: i64,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    /// Runner over the built-in registry, targeting [`SCHEMA_VERSION`]
    pub fn new() -> Self {
        let mut runner = Self::with_migrations(registry());
        runner.target = SCHEMA_VERSION;
        runner
    }

    /// Runner over an explicit migration list
    ///
    /// The list is sorted by version; the target version is the highest
    /// in the list. Useful for exercising the engine against synthetic
    /// migrations.
    pub fn with_migrations(mut migrations: Vec<Box<dyn Migration>>) -> Self {
        migrations.sort_by_key(|m| m.version());
        let target = migrations.last().map(|m| m.version()).unwrap_or(0);
        Self { migrations, target }
    }

    /// Bring the store up to the target version
    ///
    /// - Already at target: no-op.
    /// - Ahead of target: [`MigrationError::SchemaTooNew`], no writes.
    /// - Behind target: applies each pending migration in its own
    ///   transaction, advancing the version marker with it. The first
    ///   failure rolls back that migration and stops; earlier ones stay
    ///   committed and a rerun resumes from the failed version.
    pub async fn run(&self, db: &DatabaseService) -> Result<(), MigrationError> {
        let conn = db.connect_with_timeout().await?;
        let current = db.read_user_version(&conn).await?;

        if current > self.target {
            warn!(
                current,
                supported = self.target,
                "store schema is newer than this build; refusing to migrate"
            );
            return Err(MigrationError::schema_too_new(current, self.target));
        }
        if current == self.target {
            info!(version = current, "store schema is up to date");
            return Ok(());
        }

        let pending: Vec<&dyn Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version() > current && m.version() <= self.target)
            .map(|m| m.as_ref())
            .collect();

        if pending.is_empty() {
            // Version gap with no migrations to fill it (registry was
            // compacted). Force the marker up to target.
            db.write_user_version(&conn, self.target).await?;
            self.record_migrated_at(db, &conn).await?;
            return Ok(());
        }

        let mut last_applied = current;
        for migration in &pending {
            let version = migration.version();
            info!(version, name = migration.name(), "applying migration");

            db.begin(&conn).await?;
            if let Err(e) = migration.apply(&conn).await {
                let _ = db.rollback(&conn).await;
                warn!(
                    version,
                    name = migration.name(),
                    error = %e,
                    "migration failed, rolled back"
                );
                return Err(MigrationError::migration_failed(version, migration.name(), e));
            }
            if let Err(e) = db.write_user_version(&conn, version).await {
                let _ = db.rollback(&conn).await;
                return Err(MigrationError::Database(e));
            }
            db.commit(&conn).await?;
            last_applied = version;
        }

        // Defensive: end exactly at the target even if the registry's
        // last entry is below it.
        if last_applied != self.target {
            db.write_user_version(&conn, self.target).await?;
        }

        self.record_migrated_at(db, &conn).await?;
        info!(version = self.target, "migrations complete");
        Ok(())
    }

    async fn record_migrated_at(
        &self,
        db: &DatabaseService,
        conn: &Connection,
    ) -> Result<(), MigrationError> {
        if db.table_exists(conn, "meta").await? {
            db.set_meta(conn, meta_keys::LAST_MIGRATED_AT, &Utc::now().to_rfc3339())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn create_test_db() -> (DatabaseService, TempDir) {
        let temp_dir = TempDir::new().expect("tempdir");
        let db = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .expect("open db");
        (db, temp_dir)
    }

    /// Creates one table and counts how many times it was applied
    struct CountingMigration {
        version: i64,
        name: &'static str,
        table: &'static str,
        applied: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Migration for CountingMigration {
        fn version(&self) -> i64 {
            self.version
        }

        fn name(&self) -> &'static str {
            self.name
        }

        async fn apply(&self, conn: &Connection) -> anyhow::Result<()> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            conn.execute(
                &format!("CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY)", self.table),
                (),
            )
            .await?;
            Ok(())
        }
    }

    /// Writes one row, then fails; the row must never survive
    struct FailingMigration {
        version: i64,
    }

    #[async_trait]
    impl Migration for FailingMigration {
        fn version(&self) -> i64 {
            self.version
        }

        fn name(&self) -> &'static str {
            "broken"
        }

        async fn apply(&self, conn: &Connection) -> anyhow::Result<()> {
            conn.execute("CREATE TABLE IF NOT EXISTS partial (id TEXT)", ())
                .await?;
            conn.execute("INSERT INTO partial (id) VALUES ('orphan')", ())
                .await?;
            anyhow::bail!("deliberate failure")
        }
    }

    fn counting(
        version: i64,
        name: &'static str,
        table: &'static str,
    ) -> (Box<dyn Migration>, Arc<AtomicUsize>) {
        let applied = Arc::new(AtomicUsize::new(0));
        (
            Box::new(CountingMigration {
                version,
                name,
                table,
                applied: applied.clone(),
            }),
            applied,
        )
    }

    #[tokio::test]
    async fn test_fresh_store_applies_all_and_lands_on_target() {
        let (db, _temp_dir) = create_test_db().await;
        let (m1, a1) = counting(1, "one", "t_one");
        let (m2, a2) = counting(2, "two", "t_two");

        let runner = MigrationRunner::with_migrations(vec![m1, m2]);
        runner.run(&db).await.unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        assert_eq!(db.read_user_version(&conn).await.unwrap(), 2);
        assert!(db.table_exists(&conn, "t_one").await.unwrap());
        assert!(db.table_exists(&conn, "t_two").await.unwrap());
        assert_eq!(a1.load(Ordering::SeqCst), 1);
        assert_eq!(a2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unordered_registration_applies_in_version_order() {
        let (db, _temp_dir) = create_test_db().await;
        let (m1, a1) = counting(1, "one", "t_one");
        let (m2, a2) = counting(2, "two", "t_two");
        let (m3, a3) = counting(3, "three", "t_three");

        // Registered out of order; must still run 1, 2, 3
        let runner = MigrationRunner::with_migrations(vec![m3, m1, m2]);
        runner.run(&db).await.unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        assert_eq!(db.read_user_version(&conn).await.unwrap(), 3);
        for applied in [a1, a2, a3] {
            assert_eq!(applied.load(Ordering::SeqCst), 1);
        }
        // A rerun from a partial marker also picks the right pending set
        db.write_user_version(&conn, 1).await.unwrap();
        runner.run(&db).await.unwrap();
        assert_eq!(db.read_user_version(&conn).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let (db, _temp_dir) = create_test_db().await;
        let (m1, a1) = counting(1, "one", "t_one");
        let runner = MigrationRunner::with_migrations(vec![m1]);

        runner.run(&db).await.unwrap();
        runner.run(&db).await.unwrap();

        // Second run sees current == target and applies nothing
        assert_eq!(a1.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_store_applies_only_pending() {
        let (db, _temp_dir) = create_test_db().await;
        let conn = db.connect_with_timeout().await.unwrap();
        db.write_user_version(&conn, 1).await.unwrap();

        let (m1, a1) = counting(1, "one", "t_one");
        let (m2, a2) = counting(2, "two", "t_two");
        let runner = MigrationRunner::with_migrations(vec![m1, m2]);
        runner.run(&db).await.unwrap();

        assert_eq!(a1.load(Ordering::SeqCst), 0);
        assert_eq!(a2.load(Ordering::SeqCst), 1);
        assert_eq!(db.read_user_version(&conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_keeps_marker_at_last_committed() {
        let (db, _temp_dir) = create_test_db().await;
        let (m1, _a1) = counting(1, "one", "t_one");

        let runner =
            MigrationRunner::with_migrations(vec![m1, Box::new(FailingMigration { version: 2 })]);
        let err = runner.run(&db).await.unwrap_err();
        match err {
            MigrationError::MigrationFailed { version, .. } => assert_eq!(version, 2),
            other => panic!("unexpected error: {other}"),
        }

        let conn = db.connect_with_timeout().await.unwrap();
        // Migration 1 committed; the failed one left nothing behind
        assert_eq!(db.read_user_version(&conn).await.unwrap(), 1);
        assert!(db.table_exists(&conn, "t_one").await.unwrap());
        if db.table_exists(&conn, "partial").await.unwrap() {
            let rows = db
                .fetch_all(&conn, "SELECT id FROM partial", (), "test")
                .await
                .unwrap();
            assert!(rows.is_empty(), "failed migration's writes must roll back");
        }
    }

    #[tokio::test]
    async fn test_rerun_after_failure_resumes_at_failed_version() {
        let (db, _temp_dir) = create_test_db().await;
        let (m1, a1) = counting(1, "one", "t_one");
        let runner =
            MigrationRunner::with_migrations(vec![m1, Box::new(FailingMigration { version: 2 })]);
        runner.run(&db).await.unwrap_err();
        assert_eq!(a1.load(Ordering::SeqCst), 1);

        // Registry fixed in the "next build": version 2 now succeeds
        let (m1b, a1b) = counting(1, "one", "t_one");
        let (m2, a2) = counting(2, "two", "t_two");
        let fixed = MigrationRunner::with_migrations(vec![m1b, m2]);
        fixed.run(&db).await.unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        assert_eq!(db.read_user_version(&conn).await.unwrap(), 2);
        assert_eq!(a1b.load(Ordering::SeqCst), 0, "committed work is not redone");
        assert_eq!(a2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_newer_store_is_refused_without_writes() {
        let (db, _temp_dir) = create_test_db().await;
        let conn = db.connect_with_timeout().await.unwrap();
        db.write_user_version(&conn, 99).await.unwrap();

        let (m1, a1) = counting(1, "one", "t_one");
        let runner = MigrationRunner::with_migrations(vec![m1]);
        let err = runner.run(&db).await.unwrap_err();
        match err {
            MigrationError::SchemaTooNew { found, supported } => {
                assert_eq!(found, 99);
                assert_eq!(supported, 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(a1.load(Ordering::SeqCst), 0);
        assert_eq!(db.read_user_version(&conn).await.unwrap(), 99);
        assert!(!db.table_exists(&conn, "t_one").await.unwrap());
    }

    #[tokio::test]
    async fn test_builtin_registry_initializes_store() {
        let (db, _temp_dir) = create_test_db().await;
        MigrationRunner::new().run(&db).await.unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        assert_eq!(db.read_user_version(&conn).await.unwrap(), SCHEMA_VERSION);
        assert!(db.table_exists(&conn, "items").await.unwrap());
        assert!(db
            .get_meta(&conn, meta_keys::LAST_MIGRATED_AT)
            .await
            .unwrap()
            .is_some());
    }
}
