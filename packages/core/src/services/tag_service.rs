//! Tag Service
//!
//! Free-form tags and their attachment to items through `item_tags`.
//! Tags are deduplicated by exact name; `set_item_tags` replaces an
//! item's whole tag set in one transaction.

use crate::db::{DatabaseError, DatabaseService};
use crate::models::Tag;
use chrono::Utc;
use libsql::{Connection, Row};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TagService {
    db: DatabaseService,
}

impl TagService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// All tags, alphabetically
    pub async fn list(&self) -> Result<Vec<Tag>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let rows = self
            .db
            .fetch_all(
                &conn,
                "SELECT id, name, created_at FROM tags ORDER BY name ASC",
                (),
                "tag.list",
            )
            .await?;
        rows.iter().map(row_to_tag).collect()
    }

    /// Look up a tag by name, creating it if absent
    ///
    /// The name is trimmed; case is preserved, and distinct casings are
    /// distinct tags.
    pub async fn get_or_create(&self, name: &str) -> Result<Tag, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        self.get_or_create_on(&conn, name).await
    }

    /// Replace an item's tag set
    ///
    /// Clears the item's `item_tags` rows and re-attaches the given
    /// names, creating tags as needed, all in one transaction.
    pub async fn set_item_tags(&self, item_id: &str, names: &[&str]) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        self.db.begin(&conn).await?;

        let result = self.replace_tags_on(&conn, item_id, names).await;
        match result {
            Ok(()) => {
                self.db.commit(&conn).await?;
                debug!(item_id = %item_id, tags = names.len(), "item tags replaced");
                Ok(())
            }
            Err(e) => {
                let _ = self.db.rollback(&conn).await;
                Err(e)
            }
        }
    }

    /// Tags attached to one item, alphabetically
    pub async fn list_for_item(&self, item_id: &str) -> Result<Vec<Tag>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let rows = self
            .db
            .fetch_all(
                &conn,
                "SELECT tags.id, tags.name, tags.created_at FROM tags \
                 JOIN item_tags ON item_tags.tag_id = tags.id \
                 WHERE item_tags.item_id = ? \
                 ORDER BY tags.name ASC",
                [item_id],
                "tag.list_for_item",
            )
            .await?;
        rows.iter().map(row_to_tag).collect()
    }

    async fn replace_tags_on(
        &self,
        conn: &Connection,
        item_id: &str,
        names: &[&str],
    ) -> Result<(), DatabaseError> {
        self.db
            .execute(
                conn,
                "DELETE FROM item_tags WHERE item_id = ?",
                [item_id],
                "tag.set_item_tags.clear",
            )
            .await?;
        for name in names {
            let tag = self.get_or_create_on(conn, name).await?;
            self.db
                .execute(
                    conn,
                    "INSERT OR IGNORE INTO item_tags (item_id, tag_id) VALUES (?, ?)",
                    [item_id, tag.id.as_str()],
                    "tag.set_item_tags.attach",
                )
                .await?;
        }
        Ok(())
    }

    async fn get_or_create_on(&self, conn: &Connection, name: &str) -> Result<Tag, DatabaseError> {
        let name = name.trim();
        let existing = self
            .db
            .fetch_one(
                conn,
                "SELECT id, name, created_at FROM tags WHERE name = ?",
                [name],
                "tag.get_or_create",
            )
            .await?;
        if let Some(row) = existing {
            return row_to_tag(&row);
        }

        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let created_at = tag.created_at.to_rfc3339();
        self.db
            .execute(
                conn,
                "INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)",
                [tag.id.as_str(), tag.name.as_str(), created_at.as_str()],
                "tag.get_or_create",
            )
            .await?;
        debug!(id = %tag.id, name = %tag.name, "tag created");
        Ok(tag)
    }
}

fn row_to_tag(row: &Row) -> Result<Tag, DatabaseError> {
    let created_at_text = row
        .get::<String>(2)
        .map_err(|e| DatabaseError::row_conversion(format!("created_at: {}", e)))?;
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_text)
        .map_err(|e| {
            DatabaseError::row_conversion(format!("created_at '{}': {}", created_at_text, e))
        })?
        .with_timezone(&Utc);
    Ok(Tag {
        id: row
            .get::<String>(0)
            .map_err(|e| DatabaseError::row_conversion(format!("id: {}", e)))?,
        name: row
            .get::<String>(1)
            .map_err(|e| DatabaseError::row_conversion(format!("name: {}", e)))?,
        created_at,
    })
}
