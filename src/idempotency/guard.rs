//! Idempotency guard.
//!
//! Decides from an incident's accumulated work notes whether it has already
//! been processed. Pure: it never re-queries the ticket source.

use crate::idempotency::markers::all_completion_markers;
use crate::model::Incident;

/// First completion marker found in `notes`, if any.
pub fn find_completion_marker(notes: &str) -> Option<&'static str> {
    all_completion_markers().find(|marker| notes.contains(marker))
}

/// Whether the incident carries any record marker: a family completion
/// marker, the review token, or a legacy phrase.
///
/// Family-agnostic: the guard runs before classification.
pub fn is_already_processed(incident: &Incident) -> bool {
    find_completion_marker(&incident.work_notes).is_some()
}
