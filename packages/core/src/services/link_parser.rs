//! Wiki-Style Link Parser
//!
//! Extracts `[[...]]` references from note text. Two forms:
//!
//! - `[[note-id:<uuid>]]` resolves by exact id
//! - `[[Some Title]]` resolves by title at lookup time
//!
//! Pure text processing; no store access. Malformed or empty references
//! degrade to plain text or a title token, never to an error.

use crate::models::{LinkTarget, ParsedLink};
use regex::Regex;
use std::sync::OnceLock;

/// Matches `[[...]]` with content free of `[`, left to right.
/// An unclosed `[[` never swallows the rest of the document.
static LINK_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Canonical UUID shape: 8-4-4-4-12 hex with version 1-5 and RFC variant
static UUID_PATTERN: OnceLock<Regex> = OnceLock::new();

const NOTE_ID_PREFIX: &str = "note-id:";

fn link_pattern() -> &'static Regex {
    LINK_PATTERN.get_or_init(|| {
        Regex::new(r"\[\[([^\[]+?)\]\]").expect("link regex is valid")
    })
}

fn uuid_pattern() -> &'static Regex {
    UUID_PATTERN.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$",
        )
        .expect("uuid regex is valid")
    })
}

/// Extract all link tokens from note text, in document order
///
/// # Examples
///
/// ```
/// use vaultops_core::services::link_parser::parse;
/// use vaultops_core::models::LinkTarget;
///
/// let links = parse("see [[Weekly Review]] and [[Groceries]]");
/// assert_eq!(links.len(), 2);
/// assert_eq!(
///     links[0].target,
///     LinkTarget::Title { title: "Weekly Review".to_string() }
/// );
/// ```
pub fn parse(text: &str) -> Vec<ParsedLink> {
    let mut links = Vec::new();

    for capture in link_pattern().captures_iter(text) {
        let raw = capture[0].to_string();
        let content = capture[1].trim();
        if content.is_empty() {
            continue;
        }

        let target = match content.strip_prefix(NOTE_ID_PREFIX) {
            Some(id_part) => {
                let id = id_part.trim();
                if uuid_pattern().is_match(id) {
                    LinkTarget::NoteId { id: id.to_string() }
                } else {
                    // Not a well-formed id; treat the whole content as a title
                    LinkTarget::Title {
                        title: content.to_string(),
                    }
                }
            }
            None => LinkTarget::Title {
                title: content.to_string(),
            },
        };

        links.push(ParsedLink { raw, target });
    }

    links
}
