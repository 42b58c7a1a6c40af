//! Item Model
//!
//! One physical row in the `items` table backs three logical shapes:
//! note, task, and event. The closed [`ItemKind`] variant carries the
//! type-specific fields while [`Item`] holds the shared base record.
//! Columns that do not apply to a shape are NULL in the store; the
//! mapping between the variant and the flat row lives in `db::row` and
//! is the only place that knows about that flattening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for item fields read back from the store
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Row carries an item type outside the closed note/task/event set
    #[error("Unknown item type: {0}")]
    UnknownItemType(String),

    /// Task status column holds an unrecognized value
    #[error("Unknown task status: {0}")]
    UnknownTaskStatus(String),

    /// Task priority column holds an unrecognized value
    #[error("Unknown task priority: {0}")]
    UnknownTaskPriority(String),

    /// Reminder status column holds an unrecognized value
    #[error("Unknown reminder status: {0}")]
    UnknownReminderStatus(String),

    /// Timestamp column could not be parsed
    #[error("Invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },

    /// A column required by the item's type is NULL
    #[error("Missing required column {column} for item type {item_type}")]
    MissingColumn {
        column: &'static str,
        item_type: &'static str,
    },
}

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            other => Err(ValidationError::UnknownTaskStatus(other.to_string())),
        }
    }
}

/// Task priority bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Med,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Med => "med",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "low" => Ok(TaskPriority::Low),
            "med" => Ok(TaskPriority::Med),
            "high" => Ok(TaskPriority::High),
            other => Err(ValidationError::UnknownTaskPriority(other.to_string())),
        }
    }
}

/// Type-specific payload of an item (closed set)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Note {
        pinned: bool,
        favorite: bool,
    },
    Task {
        status: TaskStatus,
        priority: TaskPriority,
        scheduled_at: Option<DateTime<Utc>>,
        due_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        estimate_min: Option<i64>,
        actual_min: Option<i64>,
    },
    Event {
        start_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
        all_day: bool,
        location: Option<String>,
    },
}

impl ItemKind {
    /// The `type` discriminator persisted in the `items.type` column
    pub fn type_str(&self) -> &'static str {
        match self {
            ItemKind::Note { .. } => "note",
            ItemKind::Task { .. } => "task",
            ItemKind::Event { .. } => "event",
        }
    }

    /// Default note payload
    pub fn note() -> Self {
        ItemKind::Note {
            pinned: false,
            favorite: false,
        }
    }

    /// Default task payload (todo / med priority)
    pub fn task() -> Self {
        ItemKind::Task {
            status: TaskStatus::Todo,
            priority: TaskPriority::Med,
            scheduled_at: None,
            due_at: None,
            completed_at: None,
            estimate_min: None,
            actual_min: None,
        }
    }
}

/// An item: shared base record plus the type-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub area_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub kind: ItemKind,
}

impl Item {
    /// Create a new item with a generated UUID and current timestamps
    pub fn new(title: impl Into<String>, body: Option<String>, kind: ItemKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            body,
            area_id: None,
            created_at: now,
            updated_at: now,
            archived_at: None,
            kind,
        }
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, ItemKind::Note { .. })
    }
}

/// Partial update over an item
///
/// Outer `None` keeps the stored value; for nullable columns the inner
/// option carries the new value (`Some(None)` clears the column).
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub body: Option<Option<String>>,
    pub area_id: Option<Option<String>>,
    pub archived_at: Option<Option<DateTime<Utc>>>,
    /// Replaces the full type-specific payload; the item's type itself
    /// never changes after creation.
    pub kind: Option<ItemKind>,
}
