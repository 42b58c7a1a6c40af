//! Data Models
//!
//! Core data structures used throughout VaultOps:
//!
//! - `Item` - the note/task/event tagged variant over one physical row
//! - Link types - parsed/resolved links, persisted backlink edges, and
//!   the note snapshot projection the link engine works from
//! - `Area` / `Tag` - grouping mechanisms
//! - `Reminder` - standalone reminders, optionally linked to items

mod item;
mod links;
mod organizer;
mod reminder;

pub use item::{Item, ItemKind, ItemUpdate, TaskPriority, TaskStatus, ValidationError};
pub use links::{LinkTarget, NoteLinkEdge, NoteSnapshot, ParsedLink, ResolvedLink};
pub use organizer::{Area, Tag};
pub use reminder::{Reminder, ReminderStatus, ReminderUpdate};
