//! Reminder Model
//!
//! Standalone reminders with their own lifecycle; optionally linked to
//! an item (the link is severed, not cascaded, when the item goes away).

use crate::models::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reminder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Scheduled,
    Fired,
    Snoozed,
    Cancelled,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Scheduled => "scheduled",
            ReminderStatus::Fired => "fired",
            ReminderStatus::Snoozed => "snoozed",
            ReminderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "scheduled" => Ok(ReminderStatus::Scheduled),
            "fired" => Ok(ReminderStatus::Fired),
            "snoozed" => Ok(ReminderStatus::Snoozed),
            "cancelled" => Ok(ReminderStatus::Cancelled),
            other => Err(ValidationError::UnknownReminderStatus(other.to_string())),
        }
    }
}

/// A reminder row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub fire_at: DateTime<Utc>,
    /// Opaque recurrence rule, interpreted by the notification layer
    pub repeat_rule: Option<String>,
    pub item_id: Option<String>,
    pub status: ReminderStatus,
    pub snooze_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// New scheduled reminder with a generated id and current timestamps
    pub fn new(title: impl Into<String>, fire_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            fire_at,
            repeat_rule: None,
            item_id: None,
            status: ReminderStatus::Scheduled,
            snooze_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The instant the reminder should next surface: the snooze time if
    /// snoozed, otherwise the fire time
    pub fn effective_fire_at(&self) -> DateTime<Utc> {
        self.snooze_until.unwrap_or(self.fire_at)
    }
}

/// Partial update over a reminder
///
/// Same convention as `ItemUpdate`: outer `None` keeps the stored value,
/// inner options clear nullable columns.
#[derive(Debug, Clone, Default)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub fire_at: Option<DateTime<Utc>>,
    pub repeat_rule: Option<Option<String>>,
    pub item_id: Option<Option<String>>,
    pub status: Option<ReminderStatus>,
    pub snooze_until: Option<Option<DateTime<Utc>>>,
}
