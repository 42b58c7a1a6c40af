//! Areas and Tags
//!
//! The two lightweight grouping mechanisms: a small fixed-ish set of
//! life areas (seeded by the initial migration, user-editable) and
//! free-form tags attached to items through `item_tags`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A life area grouping items (home, health, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub name: String,
    pub sort_order: i64,
}

/// A free-form tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
