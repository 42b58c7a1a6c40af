//! Backlink Index Maintainer
//!
//! Sole owner of the `note_links` table. Edges are derived from note
//! text: each unambiguously resolved `[[...]]` reference becomes one
//! `(from_note_id, to_note_id)` row. Ambiguous title links produce no
//! edge until the text is disambiguated; the index never guesses.
//!
//! The table is always rebuildable from note content, so a lost or
//! failed incremental update is at worst stale, never corrupting.

use crate::db::row::{edge_to_insert, row_to_edge, row_to_item, ITEM_COLUMNS, NOTE_LINK_COLUMNS};
use crate::db::{meta_keys, DatabaseService};
use crate::models::{Item, NoteLinkEdge, NoteSnapshot};
use crate::services::error::LinkIndexError;
use crate::services::{link_parser, link_resolver};
use async_trait::async_trait;
use chrono::Utc;
use libsql::Connection;
use tracing::{debug, info};

/// The incremental-update capability the scheduler drives
///
/// Split out as a trait so scheduling can be exercised against a mock
/// without a store.
#[async_trait]
pub trait LinkIndexUpdater: Send + Sync {
    async fn update_for_note(&self, note_id: &str) -> Result<(), LinkIndexError>;
}

/// Maintains the derived `note_links` backlink index
///
/// # Examples
///
/// ```no_run
/// use vaultops_core::db::DatabaseService;
/// use vaultops_core::services::link_index::LinkIndexService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/vaultops.db")).await?;
///     let index = LinkIndexService::new(db);
///     index.rebuild_all().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LinkIndexService {
    db: DatabaseService,
}

impl LinkIndexService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Drop and rebuild the entire index in one transaction
    ///
    /// Loads every note snapshot once, re-derives all edges against that
    /// set, and stamps `links.last_rebuild_at`. Idempotent: rebuilding an
    /// unchanged store yields the identical edge set.
    pub async fn rebuild_all(&self) -> Result<(), LinkIndexError> {
        let conn = self.db.connect_with_timeout().await?;
        self.db.begin(&conn).await?;

        match self.rebuild_all_inner(&conn).await {
            Ok(edge_count) => {
                self.db.commit(&conn).await?;
                info!(edges = edge_count, "link index rebuilt");
                Ok(())
            }
            Err(e) => {
                let _ = self.db.rollback(&conn).await;
                Err(e)
            }
        }
    }

    async fn rebuild_all_inner(&self, conn: &Connection) -> Result<usize, LinkIndexError> {
        self.db
            .execute(conn, "DELETE FROM note_links", (), "link_index.rebuild.clear")
            .await?;

        let notes = self.load_snapshots(conn).await?;
        let mut edge_count = 0;
        for note in &notes {
            edge_count += self.insert_edges_for(conn, note, &notes).await?;
        }

        self.db
            .set_meta(conn, meta_keys::LINKS_LAST_REBUILD_AT, &Utc::now().to_rfc3339())
            .await?;
        Ok(edge_count)
    }

    /// Re-derive the outgoing edges of one note in one transaction
    ///
    /// Other notes' outgoing edges are never touched. A note that no
    /// longer exists simply ends with zero outgoing edges.
    pub async fn update_for_note(&self, note_id: &str) -> Result<(), LinkIndexError> {
        let conn = self
            .db
            .connect_with_timeout()
            .await
            .map_err(|e| LinkIndexError::update_failed(note_id, e))?;
        self.db
            .begin(&conn)
            .await
            .map_err(|e| LinkIndexError::update_failed(note_id, e))?;

        match self.update_for_note_inner(&conn, note_id).await {
            Ok(()) => {
                self.db
                    .commit(&conn)
                    .await
                    .map_err(|e| LinkIndexError::update_failed(note_id, e))?;
                debug!(note_id, "link index updated");
                Ok(())
            }
            Err(e) => {
                let _ = self.db.rollback(&conn).await;
                Err(LinkIndexError::update_failed(note_id, e))
            }
        }
    }

    async fn update_for_note_inner(
        &self,
        conn: &Connection,
        note_id: &str,
    ) -> Result<(), crate::db::DatabaseError> {
        self.db
            .execute(
                conn,
                "DELETE FROM note_links WHERE from_note_id = ?",
                [note_id],
                "link_index.update.clear",
            )
            .await?;

        let note = match self.load_snapshot(conn, note_id).await? {
            Some(note) => note,
            // Deleted or no longer a note; clearing was all there is to do
            None => return Ok(()),
        };

        let notes = self.load_snapshots(conn).await?;
        self.insert_edges_for(conn, &note, &notes).await?;
        Ok(())
    }

    /// Notes whose text links to `note_id`, newest-updated first
    pub async fn backlinks(&self, note_id: &str) -> Result<Vec<Item>, LinkIndexError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE type = 'note' \
               AND id IN (SELECT from_note_id FROM note_links WHERE to_note_id = ?) \
             ORDER BY updated_at DESC"
        );
        let rows = self
            .db
            .fetch_all(&conn, &sql, [note_id], "link_index.backlinks")
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(row_to_item(row)?);
        }
        Ok(items)
    }

    /// The persisted edges leaving one note, in target order
    pub async fn outgoing_links(
        &self,
        note_id: &str,
    ) -> Result<Vec<NoteLinkEdge>, LinkIndexError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {NOTE_LINK_COLUMNS} FROM note_links \
             WHERE from_note_id = ? ORDER BY to_note_id"
        );
        let rows = self
            .db
            .fetch_all(&conn, &sql, [note_id], "link_index.outgoing_links")
            .await?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in &rows {
            edges.push(row_to_edge(row)?);
        }
        Ok(edges)
    }

    async fn load_snapshots(
        &self,
        conn: &Connection,
    ) -> Result<Vec<NoteSnapshot>, crate::db::DatabaseError> {
        let rows = self
            .db
            .fetch_all(
                conn,
                "SELECT id, title, body FROM items WHERE type = 'note'",
                (),
                "link_index.list_notes",
            )
            .await?;
        rows.iter().map(snapshot_from_row).collect()
    }

    async fn load_snapshot(
        &self,
        conn: &Connection,
        note_id: &str,
    ) -> Result<Option<NoteSnapshot>, crate::db::DatabaseError> {
        let row = self
            .db
            .fetch_one(
                conn,
                "SELECT id, title, body FROM items WHERE id = ? AND type = 'note'",
                [note_id],
                "link_index.get_note",
            )
            .await?;
        row.as_ref().map(snapshot_from_row).transpose()
    }

    /// Parse and resolve one note's text, inserting an edge per
    /// unambiguously resolved link. Duplicate targets collapse on the
    /// `(from, to)` primary key, keeping the latest raw text.
    async fn insert_edges_for(
        &self,
        conn: &Connection,
        note: &NoteSnapshot,
        notes: &[NoteSnapshot],
    ) -> Result<usize, crate::db::DatabaseError> {
        let links = link_parser::parse(&note.text());
        let resolved = link_resolver::resolve(&links, notes);

        let mut inserted = 0;
        for link in &resolved {
            let Some(target) = link.unambiguous_target() else {
                continue;
            };
            let edge = NoteLinkEdge {
                from_note_id: note.id.clone(),
                to_note_id: target.to_string(),
                created_at: Utc::now(),
                raw_text: link.link.raw.clone(),
            };
            let (sql, params) = edge_to_insert(&edge);
            self.db
                .execute(conn, &sql, params, "link_index.insert_edge")
                .await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[async_trait]
impl LinkIndexUpdater for LinkIndexService {
    async fn update_for_note(&self, note_id: &str) -> Result<(), LinkIndexError> {
        LinkIndexService::update_for_note(self, note_id).await
    }
}

fn snapshot_from_row(row: &libsql::Row) -> Result<NoteSnapshot, crate::db::DatabaseError> {
    Ok(NoteSnapshot {
        id: row
            .get::<String>(0)
            .map_err(|e| crate::db::DatabaseError::row_conversion(format!("id: {}", e)))?,
        title: row
            .get::<String>(1)
            .map_err(|e| crate::db::DatabaseError::row_conversion(format!("title: {}", e)))?,
        body: row
            .get::<Option<String>>(2)
            .map_err(|e| crate::db::DatabaseError::row_conversion(format!("body: {}", e)))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::row::item_to_insert;
    use crate::models::{Item, ItemKind};
    use crate::services::migrations::MigrationRunner;
    use tempfile::TempDir;

    async fn create_store() -> (DatabaseService, TempDir) {
        let temp_dir = TempDir::new().expect("tempdir");
        let db = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .expect("open db");
        MigrationRunner::new().run(&db).await.expect("migrate");
        (db, temp_dir)
    }

    async fn insert_note(db: &DatabaseService, title: &str, body: Option<&str>) -> String {
        let item = Item::new(title, body.map(String::from), ItemKind::note());
        let id = item.id.clone();
        let conn = db.connect_with_timeout().await.unwrap();
        let (sql, params) = item_to_insert(&item);
        db.execute(&conn, &sql, params, "test.insert_note")
            .await
            .unwrap();
        id
    }

    async fn set_note_body(db: &DatabaseService, id: &str, body: Option<&str>) {
        let conn = db.connect_with_timeout().await.unwrap();
        db.execute(
            &conn,
            "UPDATE items SET body = ? WHERE id = ?",
            [body.unwrap_or_default(), id],
            "test.set_body",
        )
        .await
        .unwrap();
    }

    async fn edge_pairs(db: &DatabaseService) -> Vec<(String, String)> {
        let conn = db.connect_with_timeout().await.unwrap();
        let rows = db
            .fetch_all(
                &conn,
                "SELECT from_note_id, to_note_id FROM note_links \
                 ORDER BY from_note_id, to_note_id",
                (),
                "test.edges",
            )
            .await
            .unwrap();
        rows.iter()
            .map(|r| (r.get::<String>(0).unwrap(), r.get::<String>(1).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_rebuild_builds_edges_and_stamps_meta() {
        let (db, _temp_dir) = create_store().await;
        let beta = insert_note(&db, "Beta", None).await;
        let alpha = insert_note(&db, "Alpha", Some("see [[Beta]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        assert_eq!(edge_pairs(&db).await, [(alpha.clone(), beta.clone())]);

        let conn = db.connect_with_timeout().await.unwrap();
        assert!(db
            .get_meta(&conn, meta_keys::LINKS_LAST_REBUILD_AT)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let (db, _temp_dir) = create_store().await;
        let beta = insert_note(&db, "Beta", Some("back to [[Alpha]]")).await;
        let alpha = insert_note(&db, "Alpha", Some("see [[Beta]] twice [[Beta]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();
        let first = edge_pairs(&db).await;
        index.rebuild_all().await.unwrap();
        let second = edge_pairs(&db).await;

        assert_eq!(first, second);
        // Duplicate raws to the same target collapse on the primary key
        let mut expected = vec![(alpha.clone(), beta.clone()), (beta, alpha)];
        expected.sort();
        assert_eq!(first, expected);
    }

    #[tokio::test]
    async fn test_ambiguous_title_links_produce_no_edges() {
        let (db, _temp_dir) = create_store().await;
        insert_note(&db, "Plan", None).await;
        insert_note(&db, "plan", None).await;
        let from = insert_note(&db, "Journal", Some("todo [[Plan]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        assert!(
            edge_pairs(&db).await.iter().all(|(f, _)| f != &from),
            "ambiguous link must not guess a target"
        );
    }

    #[tokio::test]
    async fn test_update_for_note_tracks_text_changes() {
        let (db, _temp_dir) = create_store().await;
        let beta = insert_note(&db, "Beta", None).await;
        let alpha = insert_note(&db, "Alpha", Some("[[Beta]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.update_for_note(&alpha).await.unwrap();
        assert_eq!(edge_pairs(&db).await, [(alpha.clone(), beta)]);

        set_note_body(&db, &alpha, Some("no more links")).await;
        index.update_for_note(&alpha).await.unwrap();
        assert!(edge_pairs(&db).await.iter().all(|(f, _)| f != &alpha));
    }

    #[tokio::test]
    async fn test_update_leaves_other_notes_edges_alone() {
        let (db, _temp_dir) = create_store().await;
        let gamma = insert_note(&db, "Gamma", None).await;
        let alpha = insert_note(&db, "Alpha", Some("[[Gamma]]")).await;
        let beta = insert_note(&db, "Beta", Some("[[Gamma]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        set_note_body(&db, &alpha, None).await;
        index.update_for_note(&alpha).await.unwrap();

        assert_eq!(edge_pairs(&db).await, [(beta, gamma)]);
    }

    #[tokio::test]
    async fn test_deleting_target_leaves_no_dangling_edges() {
        let (db, _temp_dir) = create_store().await;
        let beta = insert_note(&db, "Beta", None).await;
        let alpha = insert_note(&db, "Alpha", Some("[[Beta]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();
        assert_eq!(edge_pairs(&db).await.len(), 1);

        // FK cascade clears the edge on delete; the next update must not
        // resurrect it
        let conn = db.connect_with_timeout().await.unwrap();
        db.execute(
            &conn,
            "DELETE FROM items WHERE id = ?",
            [beta.as_str()],
            "test.delete",
        )
        .await
        .unwrap();

        index.update_for_note(&alpha).await.unwrap();
        assert!(edge_pairs(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_for_deleted_note_just_clears() {
        let (db, _temp_dir) = create_store().await;
        let beta = insert_note(&db, "Beta", None).await;
        let alpha = insert_note(&db, "Alpha", Some("[[Beta]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        db.execute(
            &conn,
            "DELETE FROM items WHERE id = ?",
            [alpha.as_str()],
            "test.delete",
        )
        .await
        .unwrap();

        index.update_for_note(&alpha).await.unwrap();
        assert!(edge_pairs(&db).await.is_empty());
        let _ = beta;
    }

    #[tokio::test]
    async fn test_outgoing_links_carry_raw_text() {
        let (db, _temp_dir) = create_store().await;
        let beta = insert_note(&db, "Beta", None).await;
        let gamma = insert_note(&db, "Gamma", None).await;
        let alpha = insert_note(&db, "Alpha", Some("see [[Beta]] and [[Gamma]]")).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        let mut edges = index.outgoing_links(&alpha).await.unwrap();
        edges.sort_by(|a, b| a.raw_text.cmp(&b.raw_text));
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.from_note_id == alpha));
        assert_eq!(edges[0].raw_text, "[[Beta]]");
        assert_eq!(edges[0].to_note_id, beta);
        assert_eq!(edges[1].raw_text, "[[Gamma]]");
        assert_eq!(edges[1].to_note_id, gamma);

        assert!(index.outgoing_links(&beta).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backlinks_newest_first() {
        let (db, _temp_dir) = create_store().await;
        let target = insert_note(&db, "Target", None).await;
        let older = insert_note(&db, "Older", Some("[[Target]]")).await;
        let newer = insert_note(&db, "Newer", Some("[[Target]]")).await;

        let conn = db.connect_with_timeout().await.unwrap();
        db.execute(
            &conn,
            "UPDATE items SET updated_at = ? WHERE id = ?",
            ["2026-01-01T00:00:00+00:00", older.as_str()],
            "test.age",
        )
        .await
        .unwrap();
        db.execute(
            &conn,
            "UPDATE items SET updated_at = ? WHERE id = ?",
            ["2026-06-01T00:00:00+00:00", newer.as_str()],
            "test.age",
        )
        .await
        .unwrap();

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        let backlinks = index.backlinks(&target).await.unwrap();
        let ids: Vec<&str> = backlinks.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, [newer.as_str(), older.as_str()]);
    }

    #[tokio::test]
    async fn test_id_links_resolve_even_with_renamed_titles() {
        let (db, _temp_dir) = create_store().await;
        let beta = insert_note(&db, "Anything At All", None).await;
        let alpha = insert_note(&db, "Alpha", Some(&format!("[[note-id:{beta}]]"))).await;

        let index = LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        assert_eq!(edge_pairs(&db).await, [(alpha, beta)]);
    }
}
