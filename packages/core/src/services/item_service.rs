//! Item Service
//!
//! CRUD over the unified `items` table. Plain row operations; the link
//! index reacts to note changes through the scheduler, which callers
//! drive after mutating a note.

use crate::db::row::{item_to_insert, item_to_update, row_to_item, ITEM_COLUMNS};
use crate::db::DatabaseService;
use crate::models::{Item, ItemKind, ItemUpdate, NoteSnapshot};
use crate::services::error::ItemServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

/// The id/title/body projection the link engine resolves against
#[async_trait]
pub trait NoteSnapshotProvider: Send + Sync {
    async fn list_notes(&self) -> Result<Vec<NoteSnapshot>, ItemServiceError>;
    async fn get_note(&self, note_id: &str) -> Result<Option<NoteSnapshot>, ItemServiceError>;
}

/// CRUD operations over items
#[derive(Debug, Clone)]
pub struct ItemService {
    db: DatabaseService,
}

impl ItemService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Insert a new item with a generated id and current timestamps
    pub async fn create(
        &self,
        title: impl Into<String>,
        body: Option<String>,
        kind: ItemKind,
    ) -> Result<Item, ItemServiceError> {
        let item = Item::new(title, body, kind);
        let conn = self.db.connect_with_timeout().await?;
        let (sql, params) = item_to_insert(&item);
        self.db.execute(&conn, &sql, params, "item.create").await?;
        debug!(id = %item.id, item_type = item.kind.type_str(), "item created");
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> Result<Item, ItemServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?");
        let row = self
            .db
            .fetch_one(&conn, &sql, [id], "item.get")
            .await?
            .ok_or_else(|| ItemServiceError::not_found(id))?;
        Ok(row_to_item(&row)?)
    }

    /// Apply a partial update and bump `updated_at`
    ///
    /// The item's type never changes; a `kind` in the update replaces
    /// the type-specific payload within the same type.
    pub async fn update(&self, id: &str, update: ItemUpdate) -> Result<Item, ItemServiceError> {
        let mut item = self.get(id).await?;

        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(body) = update.body {
            item.body = body;
        }
        if let Some(area_id) = update.area_id {
            item.area_id = area_id;
        }
        if let Some(archived_at) = update.archived_at {
            item.archived_at = archived_at;
        }
        if let Some(kind) = update.kind {
            if kind.type_str() != item.kind.type_str() {
                return Err(ItemServiceError::TypeChangeRejected {
                    id: id.to_string(),
                    current: item.kind.type_str(),
                    requested: kind.type_str(),
                });
            }
            item.kind = kind;
        }
        item.updated_at = Utc::now();

        let conn = self.db.connect_with_timeout().await?;
        let (sql, params) = item_to_update(&item);
        self.db.execute(&conn, &sql, params, "item.update").await?;
        debug!(id = %item.id, "item updated");
        Ok(item)
    }

    /// Mark an item archived (hidden from default listings)
    pub async fn archive(&self, id: &str) -> Result<Item, ItemServiceError> {
        self.update(
            id,
            ItemUpdate {
                archived_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn unarchive(&self, id: &str) -> Result<Item, ItemServiceError> {
        self.update(
            id,
            ItemUpdate {
                archived_at: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete an item; FK cascades clear its tag rows and link edges
    pub async fn delete(&self, id: &str) -> Result<(), ItemServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let affected = self
            .db
            .execute(&conn, "DELETE FROM items WHERE id = ?", [id], "item.delete")
            .await?;
        if affected == 0 {
            return Err(ItemServiceError::not_found(id));
        }
        debug!(id = %id, "item deleted");
        Ok(())
    }

    /// Non-archived items of one type, newest-updated first
    pub async fn list_by_type(&self, item_type: &str) -> Result<Vec<Item>, ItemServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE type = ? AND archived_at IS NULL \
             ORDER BY updated_at DESC"
        );
        let rows = self
            .db
            .fetch_all(&conn, &sql, [item_type], "item.list_by_type")
            .await?;
        self.rows_to_items(rows)
    }

    /// Untriaged items: not archived, no area, no tags
    pub async fn list_inbox(&self) -> Result<Vec<Item>, ItemServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             LEFT JOIN item_tags ON item_tags.item_id = items.id \
             WHERE archived_at IS NULL AND area_id IS NULL \
               AND item_tags.item_id IS NULL \
             ORDER BY updated_at DESC"
        );
        let rows = self
            .db
            .fetch_all(&conn, &sql, (), "item.list_inbox")
            .await?;
        self.rows_to_items(rows)
    }

    /// Open tasks whose due (or scheduled) date is today
    pub async fn list_tasks_today(&self) -> Result<Vec<Item>, ItemServiceError> {
        self.list_tasks_by_date_cmp("=", "item.list_tasks_today").await
    }

    /// Open tasks whose due (or scheduled) date is after today
    pub async fn list_tasks_upcoming(&self) -> Result<Vec<Item>, ItemServiceError> {
        self.list_tasks_by_date_cmp(">", "item.list_tasks_upcoming").await
    }

    /// Open tasks whose due (or scheduled) date has passed
    pub async fn list_tasks_overdue(&self) -> Result<Vec<Item>, ItemServiceError> {
        self.list_tasks_by_date_cmp("<", "item.list_tasks_overdue").await
    }

    /// Events overlapping the range, plus tasks scheduled within it
    ///
    /// An event without an end is treated as ending at its start.
    pub async fn list_calendar_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Item>, ItemServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE archived_at IS NULL AND ( \
               (type = 'event' AND event_start_at <= ? \
                AND COALESCE(event_end_at, event_start_at) >= ?) \
               OR (type = 'task' AND task_scheduled_at BETWEEN ? AND ?) \
             ) \
             ORDER BY COALESCE(event_start_at, task_scheduled_at) ASC"
        );
        let start = start.to_rfc3339();
        let end = end.to_rfc3339();
        let params = [end.as_str(), start.as_str(), start.as_str(), end.as_str()];
        let rows = self
            .db
            .fetch_all(&conn, &sql, params, "item.list_calendar_range")
            .await?;
        self.rows_to_items(rows)
    }

    /// Shared body of the today/upcoming/overdue task views
    ///
    /// Compares the due date (falling back to the scheduled date) against
    /// today's UTC date. Tasks with neither date never match, and done
    /// tasks are excluded.
    async fn list_tasks_by_date_cmp(
        &self,
        cmp: &str,
        context: &str,
    ) -> Result<Vec<Item>, ItemServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE type = 'task' AND archived_at IS NULL \
               AND task_status != 'done' \
               AND date(COALESCE(task_due_at, task_scheduled_at)) {cmp} date('now') \
             ORDER BY COALESCE(task_due_at, task_scheduled_at) ASC"
        );
        let rows = self.db.fetch_all(&conn, &sql, (), context).await?;
        self.rows_to_items(rows)
    }

    fn rows_to_items(&self, rows: Vec<libsql::Row>) -> Result<Vec<Item>, ItemServiceError> {
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(row_to_item(row)?);
        }
        Ok(items)
    }
}

#[async_trait]
impl NoteSnapshotProvider for ItemService {
    async fn list_notes(&self) -> Result<Vec<NoteSnapshot>, ItemServiceError> {
        let conn = self.db.connect_with_timeout().await?;
        let rows = self
            .db
            .fetch_all(
                &conn,
                "SELECT id, title, body FROM items WHERE type = 'note'",
                (),
                "item.list_notes",
            )
            .await?;
        let mut notes = Vec::with_capacity(rows.len());
        for row in &rows {
            notes.push(NoteSnapshot {
                id: row.get::<String>(0).map_err(|e| {
                    crate::db::DatabaseError::row_conversion(format!("id: {}", e))
                })?,
                title: row.get::<String>(1).map_err(|e| {
                    crate::db::DatabaseError::row_conversion(format!("title: {}", e))
                })?,
                body: row.get::<Option<String>>(2).map_err(|e| {
                    crate::db::DatabaseError::row_conversion(format!("body: {}", e))
                })?,
            });
        }
        Ok(notes)
    }

    async fn get_note(&self, note_id: &str) -> Result<Option<NoteSnapshot>, ItemServiceError> {
        match self.get(note_id).await {
            Ok(item) if item.is_note() => Ok(Some(NoteSnapshot {
                id: item.id,
                title: item.title,
                body: item.body,
            })),
            Ok(_) => Ok(None),
            Err(ItemServiceError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskPriority, TaskStatus};
    use crate::services::migrations::MigrationRunner;
    use tempfile::TempDir;

    async fn create_store() -> (ItemService, DatabaseService, TempDir) {
        let temp_dir = TempDir::new().expect("tempdir");
        let db = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .expect("open db");
        MigrationRunner::new().run(&db).await.expect("migrate");
        (ItemService::new(db.clone()), db, temp_dir)
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let (service, _db, _temp_dir) = create_store().await;

        let created = service
            .create("Groceries", Some("milk, eggs".to_string()), ItemKind::note())
            .await
            .unwrap();
        let fetched = service.get(&created.id).await.unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, "Groceries");
        assert_eq!(fetched.body.as_deref(), Some("milk, eggs"));
        assert!(fetched.is_note());
    }

    #[tokio::test]
    async fn test_get_missing_item() {
        let (service, _db, _temp_dir) = create_store().await;
        let err = service.get("no-such-id").await.unwrap_err();
        assert!(matches!(err, ItemServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_task_payload() {
        let (service, _db, _temp_dir) = create_store().await;
        let task = service.create("Fix sink", None, ItemKind::task()).await.unwrap();

        let updated = service
            .update(
                &task.id,
                ItemUpdate {
                    kind: Some(ItemKind::Task {
                        status: TaskStatus::Done,
                        priority: TaskPriority::High,
                        scheduled_at: None,
                        due_at: None,
                        completed_at: Some(Utc::now()),
                        estimate_min: Some(30),
                        actual_min: Some(45),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        match service.get(&updated.id).await.unwrap().kind {
            ItemKind::Task {
                status,
                priority,
                actual_min,
                ..
            } => {
                assert_eq!(status, TaskStatus::Done);
                assert_eq!(priority, TaskPriority::High);
                assert_eq!(actual_min, Some(45));
            }
            other => panic!("expected task, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_rejects_type_change() {
        let (service, _db, _temp_dir) = create_store().await;
        let note = service.create("Journal", None, ItemKind::note()).await.unwrap();

        let result = service
            .update(
                &note.id,
                ItemUpdate {
                    kind: Some(ItemKind::task()),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());
        assert!(service.get(&note.id).await.unwrap().is_note());
    }

    #[tokio::test]
    async fn test_archive_hides_from_listing() {
        let (service, _db, _temp_dir) = create_store().await;
        let note = service.create("Journal", None, ItemKind::note()).await.unwrap();
        assert_eq!(service.list_by_type("note").await.unwrap().len(), 1);

        service.archive(&note.id).await.unwrap();
        assert!(service.list_by_type("note").await.unwrap().is_empty());

        service.unarchive(&note.id).await.unwrap();
        assert_eq!(service.list_by_type("note").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_link_edges() {
        let (service, db, _temp_dir) = create_store().await;
        let target = service.create("Target", None, ItemKind::note()).await.unwrap();
        let source = service
            .create("Source", Some("[[Target]]".to_string()), ItemKind::note())
            .await
            .unwrap();

        let index = crate::services::link_index::LinkIndexService::new(db.clone());
        index.rebuild_all().await.unwrap();

        service.delete(&source.id).await.unwrap();

        let conn = db.connect_with_timeout().await.unwrap();
        let rows = db
            .fetch_all(&conn, "SELECT from_note_id FROM note_links", (), "test")
            .await
            .unwrap();
        assert!(rows.is_empty());
        let _ = target;
    }

    #[tokio::test]
    async fn test_inbox_excludes_triaged_items() {
        let (service, db, _temp_dir) = create_store().await;
        let untriaged = service.create("Loose note", None, ItemKind::note()).await.unwrap();
        let in_area = service.create("Homework", None, ItemKind::note()).await.unwrap();
        let tagged = service.create("Errand", None, ItemKind::task()).await.unwrap();
        let archived = service.create("Old", None, ItemKind::note()).await.unwrap();

        let areas = crate::services::area_service::AreaService::new(db.clone());
        areas.set_item_area(&in_area.id, Some("home")).await.unwrap();
        let tags = crate::services::tag_service::TagService::new(db.clone());
        tags.set_item_tags(&tagged.id, &["errand"]).await.unwrap();
        service.archive(&archived.id).await.unwrap();

        let inbox = service.list_inbox().await.unwrap();
        let ids: Vec<&str> = inbox.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, [untriaged.id.as_str()]);
    }

    #[tokio::test]
    async fn test_task_date_views_partition_by_due_date() {
        let (service, _db, _temp_dir) = create_store().await;
        let now = Utc::now();

        let task_due = |due_at: chrono::DateTime<Utc>| ItemKind::Task {
            status: TaskStatus::Todo,
            priority: TaskPriority::Med,
            scheduled_at: None,
            due_at: Some(due_at),
            completed_at: None,
            estimate_min: None,
            actual_min: None,
        };
        let today = service
            .create("Today", None, task_due(now))
            .await
            .unwrap();
        let upcoming = service
            .create("Upcoming", None, task_due(now + chrono::Duration::days(3)))
            .await
            .unwrap();
        let overdue = service
            .create("Overdue", None, task_due(now - chrono::Duration::days(3)))
            .await
            .unwrap();
        // Dateless tasks appear in none of the views
        service.create("Someday", None, ItemKind::task()).await.unwrap();

        let ids = |items: Vec<Item>| -> Vec<String> {
            items.into_iter().map(|i| i.id).collect()
        };
        assert_eq!(ids(service.list_tasks_today().await.unwrap()), [today.id.clone()]);
        assert_eq!(
            ids(service.list_tasks_upcoming().await.unwrap()),
            [upcoming.id.clone()]
        );
        assert_eq!(
            ids(service.list_tasks_overdue().await.unwrap()),
            [overdue.id.clone()]
        );
    }

    #[tokio::test]
    async fn test_task_views_exclude_done_tasks() {
        let (service, _db, _temp_dir) = create_store().await;
        let task = service
            .create(
                "Finished",
                None,
                ItemKind::Task {
                    status: TaskStatus::Done,
                    priority: TaskPriority::Med,
                    scheduled_at: None,
                    due_at: Some(Utc::now()),
                    completed_at: Some(Utc::now()),
                    estimate_min: None,
                    actual_min: None,
                },
            )
            .await
            .unwrap();

        assert!(service.list_tasks_today().await.unwrap().is_empty());
        let _ = task;
    }

    #[tokio::test]
    async fn test_calendar_range_overlap() {
        let (service, _db, _temp_dir) = create_store().await;
        let now = Utc::now();
        let day = chrono::Duration::days(1);

        let event = |start: chrono::DateTime<Utc>, end: Option<chrono::DateTime<Utc>>| {
            ItemKind::Event {
                start_at: start,
                end_at: end,
                all_day: false,
                location: None,
            }
        };
        // Spans into the window from before it
        let spanning = service
            .create("Spanning", None, event(now - day, Some(now + day)))
            .await
            .unwrap();
        // Point event (no end) inside the window
        let point = service
            .create("Point", None, event(now + day, None))
            .await
            .unwrap();
        // Entirely before the window
        service
            .create("Past", None, event(now - day * 3, Some(now - day * 2)))
            .await
            .unwrap();
        // Task scheduled inside the window
        let planned = service
            .create(
                "Planned",
                None,
                ItemKind::Task {
                    status: TaskStatus::Todo,
                    priority: TaskPriority::Med,
                    scheduled_at: Some(now + day * 2),
                    due_at: None,
                    completed_at: None,
                    estimate_min: None,
                    actual_min: None,
                },
            )
            .await
            .unwrap();

        let found = service
            .list_calendar_range(now, now + day * 3)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            [spanning.id.as_str(), point.id.as_str(), planned.id.as_str()]
        );
    }

    #[tokio::test]
    async fn test_snapshot_provider_projection() {
        let (service, _db, _temp_dir) = create_store().await;
        let note = service
            .create("Plan", Some("body".to_string()), ItemKind::note())
            .await
            .unwrap();
        service.create("Chore", None, ItemKind::task()).await.unwrap();

        let notes = service.list_notes().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, note.id);

        let snapshot = service.get_note(&note.id).await.unwrap().unwrap();
        assert_eq!(snapshot.title, "Plan");
        assert!(service.get_note("missing").await.unwrap().is_none());
    }
}
