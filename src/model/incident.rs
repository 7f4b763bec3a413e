//! Incident as read from the ticket source.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A ticket requesting a change.
///
/// Read-only to this crate except for appending work notes through
/// [`crate::clients::TicketSource::append_annotation`]. `work_notes` holds the
/// accumulated annotation text as fetched; it only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub number: String,
    pub short_description: String,
    pub description: String,
    pub assignment_group: String,
    pub state: String,
    pub created_at: Option<NaiveDateTime>,
    pub work_notes: String,
}

impl Incident {
    /// Text the extractor parses: the description, or the short description
    /// when the description is blank.
    pub fn parse_text(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.short_description
        } else {
            &self.description
        }
    }

    /// Whether the incident falls inside a `from_date` window. Incidents with
    /// no known creation time are kept; the source already filtered them.
    pub fn created_on_or_after(&self, from_date: NaiveDate) -> bool {
        match self.created_at {
            Some(created) => created.date() >= from_date,
            None => true,
        }
    }

    /// Whether the incident belongs to the work group. `None` or an empty
    /// filter accepts everything.
    pub fn in_work_group(&self, filter: Option<&str>) -> bool {
        match filter {
            Some(group) if !group.is_empty() => self.assignment_group == group,
            _ => true,
        }
    }
}
