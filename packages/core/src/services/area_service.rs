//! Area Service
//!
//! The life-area catalog. The initial migration seeds the default set;
//! this surface lists them and moves items between areas.

use crate::db::{DatabaseError, DatabaseService};
use crate::models::Area;
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct AreaService {
    db: DatabaseService,
}

impl AreaService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// All areas in display order
    pub async fn list(&self) -> Result<Vec<Area>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let rows = self
            .db
            .fetch_all(
                &conn,
                "SELECT id, name, sort_order FROM areas ORDER BY sort_order ASC",
                (),
                "area.list",
            )
            .await?;

        let mut areas = Vec::with_capacity(rows.len());
        for row in &rows {
            areas.push(Area {
                id: row
                    .get::<String>(0)
                    .map_err(|e| DatabaseError::row_conversion(format!("id: {}", e)))?,
                name: row
                    .get::<String>(1)
                    .map_err(|e| DatabaseError::row_conversion(format!("name: {}", e)))?,
                sort_order: row
                    .get::<i64>(2)
                    .map_err(|e| DatabaseError::row_conversion(format!("sort_order: {}", e)))?,
            });
        }
        Ok(areas)
    }

    /// Move an item into an area, or out of all areas with `None`
    ///
    /// Bumps the item's `updated_at`. A dangling area id is rejected by
    /// the foreign key, surfacing as an execution error.
    pub async fn set_item_area(
        &self,
        item_id: &str,
        area_id: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let params = vec![
            crate::db::sql::text_or_null(area_id),
            libsql::Value::Text(Utc::now().to_rfc3339()),
            libsql::Value::Text(item_id.to_string()),
        ];
        self.db
            .execute(
                &conn,
                "UPDATE items SET area_id = ?, updated_at = ? WHERE id = ?",
                params,
                "area.set_item_area",
            )
            .await?;
        Ok(())
    }
}
