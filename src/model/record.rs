//! Processing records: the audit trail of one processing attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::OperationOutcome;
use super::request::{OperationFamily, ParseFailure, ParsedRequest};
use crate::idempotency::markers::record_tokens;

/// Terminal state reached by one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "terminal", rename_all = "snake_case")]
pub enum Disposition {
    Unclassified,
    ParseFailed { failure: ParseFailure },
    Executed { outcome: OperationOutcome },
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Unclassified => "unclassified",
            Disposition::ParseFailed { .. } => "parse_failed",
            Disposition::Executed { .. } => "executed",
        }
    }
}

/// Immutable record of one processing attempt, appended to the incident (as
/// rendered text) and to the history store (as JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub incident_number: String,
    pub short_description: String,
    pub family: OperationFamily,
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub request: Option<ParsedRequest>,
    pub disposition: Disposition,
    pub marker_tokens: Vec<String>,
    /// History-only; never rendered into the ticket.
    pub backup_location: Option<String>,
    /// SHA-256 of the rendered annotation.
    pub annotation_digest: Option<String>,
}

impl ProcessingRecord {
    pub fn new(
        incident_number: &str,
        short_description: &str,
        family: OperationFamily,
        timestamp: DateTime<Utc>,
        run_id: &str,
        request: Option<ParsedRequest>,
        disposition: Disposition,
    ) -> Self {
        let marker_tokens = record_tokens(family, &disposition)
            .iter()
            .map(|t| t.to_string())
            .collect();
        Self {
            incident_number: incident_number.to_string(),
            short_description: short_description.to_string(),
            family,
            timestamp,
            run_id: run_id.to_string(),
            request,
            disposition,
            marker_tokens,
            backup_location: None,
            annotation_digest: None,
        }
    }

    pub fn outcome(&self) -> Option<&OperationOutcome> {
        match &self.disposition {
            Disposition::Executed { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// Whether the operation ran and every item succeeded or was skipped.
    pub fn succeeded(&self) -> bool {
        self.outcome().map(|o| o.success).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::markers::{family_markers, REVIEW_TOKEN};
    use crate::model::outcome::{ItemAction, ItemResult};
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 8, 16, 50, 0).unwrap()
    }

    #[test]
    fn test_executed_record_carries_family_markers() {
        let outcome = OperationOutcome::new(
            vec![ItemResult::new("user7", ItemAction::Failed, "timeout")],
            "failed",
        );
        let record = ProcessingRecord::new(
            "INC1",
            "",
            OperationFamily::DatabaseUserLifecycle,
            ts(),
            "run-1",
            None,
            Disposition::Executed { outcome },
        );
        assert!(!record.succeeded());
        for marker in family_markers(OperationFamily::DatabaseUserLifecycle) {
            assert!(record.marker_tokens.iter().any(|t| t == marker));
        }
    }

    #[test]
    fn test_unclassified_record_carries_review_token_only() {
        let record = ProcessingRecord::new(
            "INC2",
            "printer jam",
            OperationFamily::Unknown,
            ts(),
            "run-1",
            None,
            Disposition::Unclassified,
        );
        assert_eq!(record.marker_tokens, vec![REVIEW_TOKEN.to_string()]);
        assert!(!record.succeeded());
        assert_eq!(record.disposition.as_str(), "unclassified");
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = ProcessingRecord::new(
            "INC3",
            "",
            OperationFamily::NetworkRuleChange,
            ts(),
            "run-1",
            None,
            Disposition::Executed {
                outcome: OperationOutcome::new(
                    vec![ItemResult::new("10.0.0.0/8", ItemAction::Added, "added")],
                    "1 added",
                ),
            },
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"terminal\":\"executed\""));
        let back: ProcessingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
