//! Link Resolver
//!
//! Matches parsed links against a note reference set. Pure; the caller
//! supplies the snapshot and decides what to do with the candidate sets.
//!
//! Title matching uses one canonical form: trimmed, lowercased, interior
//! whitespace runs collapsed to single spaces. No stemming, no fuzzy
//! matching, no punctuation stripping.

use crate::models::{LinkTarget, NoteSnapshot, ParsedLink, ResolvedLink};

/// Canonical form used for title comparison
pub fn canonicalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolve each link against the note set
///
/// Id links get the id as their only candidate iff a note with that id
/// exists. Title links collect every note whose canonical title matches,
/// in `notes` order. Zero, one, and many candidates are all ordinary
/// outcomes recorded on the [`ResolvedLink`].
pub fn resolve(links: &[ParsedLink], notes: &[NoteSnapshot]) -> Vec<ResolvedLink> {
    links
        .iter()
        .map(|link| {
            let candidates = match &link.target {
                LinkTarget::NoteId { id } => {
                    if notes.iter().any(|n| n.id == *id) {
                        vec![id.clone()]
                    } else {
                        Vec::new()
                    }
                }
                LinkTarget::Title { title } => {
                    let wanted = canonicalize_title(title);
                    notes
                        .iter()
                        .filter(|n| canonicalize_title(&n.title) == wanted)
                        .map(|n| n.id.clone())
                        .collect()
                }
            };
            ResolvedLink {
                link: link.clone(),
                candidates,
            }
        })
        .collect()
}
