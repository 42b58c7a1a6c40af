//! Reminder Service
//!
//! CRUD and lifecycle transitions over the `reminders` table. Reminders
//! live independently of items; an attached `item_id` is severed (set
//! NULL by the foreign key) when the item is deleted.

use crate::db::row::{reminder_to_insert, reminder_to_update, row_to_reminder, REMINDER_COLUMNS};
use crate::db::DatabaseService;
use crate::models::{Reminder, ReminderStatus, ReminderUpdate};
use crate::services::error::ReminderError;
use chrono::{DateTime, Utc};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ReminderService {
    db: DatabaseService,
}

impl ReminderService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Insert a new scheduled reminder
    pub async fn create(
        &self,
        title: impl Into<String>,
        fire_at: DateTime<Utc>,
        item_id: Option<String>,
    ) -> Result<Reminder, ReminderError> {
        let mut reminder = Reminder::new(title, fire_at);
        reminder.item_id = item_id;
        let conn = self.db.connect_with_timeout().await?;
        let (sql, params) = reminder_to_insert(&reminder);
        self.db.execute(&conn, &sql, params, "reminder.create").await?;
        debug!(id = %reminder.id, "reminder created");
        Ok(reminder)
    }

    pub async fn get(&self, id: &str) -> Result<Reminder, ReminderError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?");
        let row = self
            .db
            .fetch_one(&conn, &sql, [id], "reminder.get")
            .await?
            .ok_or_else(|| ReminderError::not_found(id))?;
        Ok(row_to_reminder(&row)?)
    }

    /// Apply a partial update and bump `updated_at`
    pub async fn update(
        &self,
        id: &str,
        update: ReminderUpdate,
    ) -> Result<Reminder, ReminderError> {
        let mut reminder = self.get(id).await?;

        if let Some(title) = update.title {
            reminder.title = title;
        }
        if let Some(fire_at) = update.fire_at {
            reminder.fire_at = fire_at;
        }
        if let Some(repeat_rule) = update.repeat_rule {
            reminder.repeat_rule = repeat_rule;
        }
        if let Some(item_id) = update.item_id {
            reminder.item_id = item_id;
        }
        if let Some(status) = update.status {
            reminder.status = status;
        }
        if let Some(snooze_until) = update.snooze_until {
            reminder.snooze_until = snooze_until;
        }
        reminder.updated_at = Utc::now();

        let conn = self.db.connect_with_timeout().await?;
        let (sql, params) = reminder_to_update(&reminder);
        self.db.execute(&conn, &sql, params, "reminder.update").await?;
        debug!(id = %reminder.id, status = reminder.status.as_str(), "reminder updated");
        Ok(reminder)
    }

    /// Cancel a reminder; clears any pending snooze
    pub async fn cancel(&self, id: &str) -> Result<Reminder, ReminderError> {
        self.update(
            id,
            ReminderUpdate {
                status: Some(ReminderStatus::Cancelled),
                snooze_until: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// Push the reminder's next surface time to `until`
    pub async fn snooze(
        &self,
        id: &str,
        until: DateTime<Utc>,
    ) -> Result<Reminder, ReminderError> {
        self.update(
            id,
            ReminderUpdate {
                status: Some(ReminderStatus::Snoozed),
                snooze_until: Some(Some(until)),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete a reminder row
    pub async fn delete(&self, id: &str) -> Result<(), ReminderError> {
        let conn = self.db.connect_with_timeout().await?;
        let affected = self
            .db
            .execute(
                &conn,
                "DELETE FROM reminders WHERE id = ?",
                [id],
                "reminder.delete",
            )
            .await?;
        if affected == 0 {
            return Err(ReminderError::not_found(id));
        }
        debug!(id = %id, "reminder deleted");
        Ok(())
    }

    /// Pending reminders by next surface time (snooze time when snoozed)
    pub async fn list_upcoming(&self, limit: u32) -> Result<Vec<Reminder>, ReminderError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE status IN ('scheduled', 'snoozed') \
             ORDER BY COALESCE(snooze_until, fire_at) ASC \
             LIMIT ?"
        );
        let rows = self
            .db
            .fetch_all(
                &conn,
                &sql,
                [limit as i64],
                "reminder.list_upcoming",
            )
            .await?;
        let mut reminders = Vec::with_capacity(rows.len());
        for row in &rows {
            reminders.push(row_to_reminder(row)?);
        }
        Ok(reminders)
    }

    /// All reminders attached to one item, earliest fire time first
    pub async fn list_for_item(&self, item_id: &str) -> Result<Vec<Reminder>, ReminderError> {
        let conn = self.db.connect_with_timeout().await?;
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE item_id = ? ORDER BY fire_at ASC"
        );
        let rows = self
            .db
            .fetch_all(&conn, &sql, [item_id], "reminder.list_for_item")
            .await?;
        let mut reminders = Vec::with_capacity(rows.len());
        for row in &rows {
            reminders.push(row_to_reminder(row)?);
        }
        Ok(reminders)
    }
}
