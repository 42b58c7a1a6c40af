//! Row Mapping
//!
//! Pure two-way mapping between the model types and their flat rows:
//! the [`Item`] tagged variant over `items`, [`Reminder`] over
//! `reminders`, and [`NoteLinkEdge`] over the derived `note_links`
//! table. This is the only module that knows which columns exist
//! and which are NULL for which item type; the link and migration
//! engines never see the flat shape.
//!
//! # Row Format
//!
//! Expected columns (in order, see [`ITEM_COLUMNS`]):
//! shared base (id..archived_at), then note fields, task fields, event
//! fields. Booleans are 0/1 integers, timestamps RFC3339 text.
//!
//! Semantic mismatches (unknown discriminators, unparsable timestamps,
//! required-but-NULL columns) are reported through
//! [`crate::models::ValidationError`] wrapped in a row conversion error.

use crate::db::error::DatabaseError;
use crate::db::sql::{bool_to_int, int_or_null, text_or_null, InsertBuilder, UpdateBuilder};
use crate::models::{
    Item, ItemKind, NoteLinkEdge, Reminder, ReminderStatus, TaskPriority, TaskStatus,
    ValidationError,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Row, Value};

fn validation(e: ValidationError) -> DatabaseError {
    DatabaseError::row_conversion(e.to_string())
}

/// Column list for every `items` SELECT, in the order `row_to_item` reads
pub const ITEM_COLUMNS: &str = "id, type, title, body, area_id, created_at, updated_at, \
     archived_at, note_pinned, note_favorite, task_status, task_priority, \
     task_scheduled_at, task_due_at, task_completed_at, task_estimate_min, \
     task_actual_min, event_start_at, event_end_at, event_all_day, event_location";

/// Parse a stored timestamp - handles both RFC3339 and SQLite formats
///
/// Rows written by this crate carry RFC3339 ("YYYY-MM-DDTHH:MM:SSZ");
/// rows touched by raw SQL may carry SQLite CURRENT_TIMESTAMP
/// ("YYYY-MM-DD HH:MM:SS").
fn parse_timestamp(column: &'static str, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(validation(ValidationError::InvalidTimestamp {
        column,
        value: s.to_string(),
    }))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn get_string(row: &Row, idx: i32, column: &'static str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::row_conversion(format!("{}: {}", column, e)))
}

fn get_opt_string(row: &Row, idx: i32, column: &'static str) -> Result<Option<String>, DatabaseError> {
    row.get::<Option<String>>(idx)
        .map_err(|e| DatabaseError::row_conversion(format!("{}: {}", column, e)))
}

fn get_opt_i64(row: &Row, idx: i32, column: &'static str) -> Result<Option<i64>, DatabaseError> {
    row.get::<Option<i64>>(idx)
        .map_err(|e| DatabaseError::row_conversion(format!("{}: {}", column, e)))
}

fn get_timestamp(row: &Row, idx: i32, column: &'static str) -> Result<DateTime<Utc>, DatabaseError> {
    let raw = get_string(row, idx, column)?;
    parse_timestamp(column, &raw)
}

fn get_opt_timestamp(
    row: &Row,
    idx: i32,
    column: &'static str,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match get_opt_string(row, idx, column)? {
        Some(raw) => Ok(Some(parse_timestamp(column, &raw)?)),
        None => Ok(None),
    }
}

fn required_timestamp(
    value: Option<DateTime<Utc>>,
    column: &'static str,
    item_type: &'static str,
) -> Result<DateTime<Utc>, DatabaseError> {
    value.ok_or_else(|| validation(ValidationError::MissingColumn { column, item_type }))
}

/// Convert an `items` row (selected via [`ITEM_COLUMNS`]) into an [`Item`]
pub fn row_to_item(row: &Row) -> Result<Item, DatabaseError> {
    let id = get_string(row, 0, "id")?;
    let item_type = get_string(row, 1, "type")?;
    let title = get_string(row, 2, "title")?;
    let body = get_opt_string(row, 3, "body")?;
    let area_id = get_opt_string(row, 4, "area_id")?;
    let created_at = get_timestamp(row, 5, "created_at")?;
    let updated_at = get_timestamp(row, 6, "updated_at")?;
    let archived_at = get_opt_timestamp(row, 7, "archived_at")?;

    let kind = match item_type.as_str() {
        "note" => ItemKind::Note {
            pinned: get_opt_i64(row, 8, "note_pinned")? == Some(1),
            favorite: get_opt_i64(row, 9, "note_favorite")? == Some(1),
        },
        "task" => {
            let status_raw = get_opt_string(row, 10, "task_status")?.ok_or_else(|| {
                validation(ValidationError::MissingColumn {
                    column: "task_status",
                    item_type: "task",
                })
            })?;
            let priority_raw = get_opt_string(row, 11, "task_priority")?.ok_or_else(|| {
                validation(ValidationError::MissingColumn {
                    column: "task_priority",
                    item_type: "task",
                })
            })?;
            ItemKind::Task {
                status: TaskStatus::parse(&status_raw).map_err(validation)?,
                priority: TaskPriority::parse(&priority_raw).map_err(validation)?,
                scheduled_at: get_opt_timestamp(row, 12, "task_scheduled_at")?,
                due_at: get_opt_timestamp(row, 13, "task_due_at")?,
                completed_at: get_opt_timestamp(row, 14, "task_completed_at")?,
                estimate_min: get_opt_i64(row, 15, "task_estimate_min")?,
                actual_min: get_opt_i64(row, 16, "task_actual_min")?,
            }
        }
        "event" => ItemKind::Event {
            start_at: required_timestamp(
                get_opt_timestamp(row, 17, "event_start_at")?,
                "event_start_at",
                "event",
            )?,
            end_at: get_opt_timestamp(row, 18, "event_end_at")?,
            all_day: get_opt_i64(row, 19, "event_all_day")? == Some(1),
            location: get_opt_string(row, 20, "event_location")?,
        },
        other => return Err(validation(ValidationError::UnknownItemType(other.to_string()))),
    };

    Ok(Item {
        id,
        title,
        body,
        area_id,
        created_at,
        updated_at,
        archived_at,
        kind,
    })
}

fn kind_columns(builder: InsertBuilder, kind: &ItemKind) -> InsertBuilder {
    match kind {
        ItemKind::Note { pinned, favorite } => builder
            .column("note_pinned", bool_to_int(*pinned))
            .column("note_favorite", bool_to_int(*favorite)),
        ItemKind::Task {
            status,
            priority,
            scheduled_at,
            due_at,
            completed_at,
            estimate_min,
            actual_min,
        } => builder
            .column("task_status", Value::Text(status.as_str().to_string()))
            .column("task_priority", Value::Text(priority.as_str().to_string()))
            .column(
                "task_scheduled_at",
                text_or_null(scheduled_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .column(
                "task_due_at",
                text_or_null(due_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .column(
                "task_completed_at",
                text_or_null(completed_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .column("task_estimate_min", int_or_null(*estimate_min))
            .column("task_actual_min", int_or_null(*actual_min)),
        ItemKind::Event {
            start_at,
            end_at,
            all_day,
            location,
        } => builder
            .column("event_start_at", Value::Text(format_timestamp(start_at)))
            .column(
                "event_end_at",
                text_or_null(end_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .column("event_all_day", bool_to_int(*all_day))
            .column("event_location", text_or_null(location.as_deref())),
    }
}

/// Build the single INSERT statement for an item
///
/// Only the columns applicable to the item's type are listed; the rest
/// stay NULL in the row.
pub fn item_to_insert(item: &Item) -> (String, Vec<Value>) {
    let builder = InsertBuilder::new("items")
        .column("id", Value::Text(item.id.clone()))
        .column("type", Value::Text(item.kind.type_str().to_string()))
        .column("title", Value::Text(item.title.clone()))
        .column("body", text_or_null(item.body.as_deref()))
        .column("area_id", text_or_null(item.area_id.as_deref()))
        .column("created_at", Value::Text(format_timestamp(&item.created_at)))
        .column("updated_at", Value::Text(format_timestamp(&item.updated_at)))
        .column(
            "archived_at",
            text_or_null(item.archived_at.map(|t| format_timestamp(&t)).as_deref()),
        );
    kind_columns(builder, &item.kind).build()
}

fn kind_assignments(builder: UpdateBuilder, kind: &ItemKind) -> UpdateBuilder {
    match kind {
        ItemKind::Note { pinned, favorite } => builder
            .set("note_pinned", bool_to_int(*pinned))
            .set("note_favorite", bool_to_int(*favorite)),
        ItemKind::Task {
            status,
            priority,
            scheduled_at,
            due_at,
            completed_at,
            estimate_min,
            actual_min,
        } => builder
            .set("task_status", Value::Text(status.as_str().to_string()))
            .set("task_priority", Value::Text(priority.as_str().to_string()))
            .set(
                "task_scheduled_at",
                text_or_null(scheduled_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .set(
                "task_due_at",
                text_or_null(due_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .set(
                "task_completed_at",
                text_or_null(completed_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .set("task_estimate_min", int_or_null(*estimate_min))
            .set("task_actual_min", int_or_null(*actual_min)),
        ItemKind::Event {
            start_at,
            end_at,
            all_day,
            location,
        } => builder
            .set("event_start_at", Value::Text(format_timestamp(start_at)))
            .set(
                "event_end_at",
                text_or_null(end_at.map(|t| format_timestamp(&t)).as_deref()),
            )
            .set("event_all_day", bool_to_int(*all_day))
            .set("event_location", text_or_null(location.as_deref())),
    }
}

/// Build the single UPDATE statement writing an item's current state back
/// to its row (keyed by id; the type column never changes)
pub fn item_to_update(item: &Item) -> (String, Vec<Value>) {
    let builder = UpdateBuilder::new("items")
        .set("title", Value::Text(item.title.clone()))
        .set("body", text_or_null(item.body.as_deref()))
        .set("area_id", text_or_null(item.area_id.as_deref()))
        .set("updated_at", Value::Text(format_timestamp(&item.updated_at)))
        .set(
            "archived_at",
            text_or_null(item.archived_at.map(|t| format_timestamp(&t)).as_deref()),
        );
    kind_assignments(builder, &item.kind)
        .where_eq("id", Value::Text(item.id.clone()))
        .build()
}

/// Column list for every `reminders` SELECT, in the order
/// `row_to_reminder` reads
pub const REMINDER_COLUMNS: &str =
    "id, title, fire_at, repeat_rule, item_id, status, snooze_until, created_at, updated_at";

/// Convert a `reminders` row (selected via [`REMINDER_COLUMNS`]) into a
/// [`Reminder`]
pub fn row_to_reminder(row: &Row) -> Result<Reminder, DatabaseError> {
    Ok(Reminder {
        id: get_string(row, 0, "id")?,
        title: get_string(row, 1, "title")?,
        fire_at: get_timestamp(row, 2, "fire_at")?,
        repeat_rule: get_opt_string(row, 3, "repeat_rule")?,
        item_id: get_opt_string(row, 4, "item_id")?,
        status: ReminderStatus::parse(&get_string(row, 5, "status")?).map_err(validation)?,
        snooze_until: get_opt_timestamp(row, 6, "snooze_until")?,
        created_at: get_timestamp(row, 7, "created_at")?,
        updated_at: get_timestamp(row, 8, "updated_at")?,
    })
}

/// Build the single INSERT statement for a reminder
pub fn reminder_to_insert(reminder: &Reminder) -> (String, Vec<Value>) {
    InsertBuilder::new("reminders")
        .column("id", Value::Text(reminder.id.clone()))
        .column("title", Value::Text(reminder.title.clone()))
        .column("fire_at", Value::Text(format_timestamp(&reminder.fire_at)))
        .column("repeat_rule", text_or_null(reminder.repeat_rule.as_deref()))
        .column("item_id", text_or_null(reminder.item_id.as_deref()))
        .column("status", Value::Text(reminder.status.as_str().to_string()))
        .column(
            "snooze_until",
            text_or_null(
                reminder
                    .snooze_until
                    .map(|t| format_timestamp(&t))
                    .as_deref(),
            ),
        )
        .column(
            "created_at",
            Value::Text(format_timestamp(&reminder.created_at)),
        )
        .column(
            "updated_at",
            Value::Text(format_timestamp(&reminder.updated_at)),
        )
        .build()
}

/// Build the single UPDATE statement writing a reminder's current state
/// back to its row (keyed by id)
pub fn reminder_to_update(reminder: &Reminder) -> (String, Vec<Value>) {
    UpdateBuilder::new("reminders")
        .set("title", Value::Text(reminder.title.clone()))
        .set("fire_at", Value::Text(format_timestamp(&reminder.fire_at)))
        .set("repeat_rule", text_or_null(reminder.repeat_rule.as_deref()))
        .set("item_id", text_or_null(reminder.item_id.as_deref()))
        .set("status", Value::Text(reminder.status.as_str().to_string()))
        .set(
            "snooze_until",
            text_or_null(
                reminder
                    .snooze_until
                    .map(|t| format_timestamp(&t))
                    .as_deref(),
            ),
        )
        .set(
            "updated_at",
            Value::Text(format_timestamp(&reminder.updated_at)),
        )
        .where_eq("id", Value::Text(reminder.id.clone()))
        .build()
}

/// Column list for every `note_links` SELECT, in the order `row_to_edge`
/// reads
pub const NOTE_LINK_COLUMNS: &str = "from_note_id, to_note_id, created_at, raw_text";

/// Convert a `note_links` row (selected via [`NOTE_LINK_COLUMNS`]) into a
/// [`NoteLinkEdge`]
pub fn row_to_edge(row: &Row) -> Result<NoteLinkEdge, DatabaseError> {
    Ok(NoteLinkEdge {
        from_note_id: get_string(row, 0, "from_note_id")?,
        to_note_id: get_string(row, 1, "to_note_id")?,
        created_at: get_timestamp(row, 2, "created_at")?,
        raw_text: get_string(row, 3, "raw_text")?,
    })
}

/// Build the upsert statement for a backlink edge
///
/// `INSERT OR REPLACE` collapses duplicate references onto the
/// `(from, to)` primary key, keeping the latest raw text.
pub fn edge_to_insert(edge: &NoteLinkEdge) -> (String, Vec<Value>) {
    InsertBuilder::new("note_links")
        .or_replace()
        .column("from_note_id", Value::Text(edge.from_note_id.clone()))
        .column("to_note_id", Value::Text(edge.to_note_id.clone()))
        .column("created_at", Value::Text(format_timestamp(&edge.created_at)))
        .column("raw_text", Value::Text(edge.raw_text.clone()))
        .build()
}
