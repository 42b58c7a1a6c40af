//! Note Link Types
//!
//! Types shared by the link parser, resolver, and backlink index:
//!
//! - [`ParsedLink`] - a raw `[[...]]` token extracted from note text
//! - [`ResolvedLink`] - a parsed link with its candidate note ids
//! - [`NoteLinkEdge`] - a persisted row of the derived `note_links` table
//! - [`NoteSnapshot`] - the id/title/body projection the link engine reads
//!
//! Parsed and resolved links are per-invocation values and are never
//! persisted; only edges reach the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a `[[...]]` token points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LinkTarget {
    /// `[[note-id:<uuid>]]` - an exact note id
    NoteId { id: String },
    /// `[[Some Title]]` - display text matched against note titles at
    /// resolution time (trimmed, otherwise verbatim)
    Title { title: String },
}

/// A single wiki-style reference extracted from note text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLink {
    /// The exact matched substring, brackets included
    pub raw: String,
    pub target: LinkTarget,
}

/// A parsed link matched against a note snapshot set
///
/// The candidate count is the terminal outcome: zero means the reference
/// is dead, one means it resolved, more than one means the caller has to
/// disambiguate. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub link: ParsedLink,
    /// Candidate note ids in note-set insertion order
    pub candidates: Vec<String>,
}

impl ResolvedLink {
    pub fn is_unresolved(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    /// The target id if the link resolved to exactly one note
    pub fn unambiguous_target(&self) -> Option<&str> {
        match self.candidates.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}

/// A persisted backlink edge, keyed by `(from_note_id, to_note_id)`
///
/// Owned exclusively by the link index service; derived from note text
/// and always rebuildable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLinkEdge {
    pub from_note_id: String,
    pub to_note_id: String,
    pub created_at: DateTime<Utc>,
    pub raw_text: String,
}

/// The note projection used for link resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSnapshot {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
}

impl NoteSnapshot {
    /// Combined text the parser runs over: title and body joined by a
    /// newline, skipping empty parts.
    pub fn text(&self) -> String {
        match self.body.as_deref() {
            Some(body) if !body.is_empty() => format!("{}\n{}", self.title, body),
            _ => self.title.clone(),
        }
    }
}
