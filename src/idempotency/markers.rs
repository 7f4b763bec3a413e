//! Marker tokens stamped into ticket annotations.
//!
//! These strings are an external contract: the guard and downstream
//! reporting match them by exact substring. Never change an existing token;
//! add a new one and keep recognising the old.

use crate::model::{Disposition, OperationFamily};

/// Completion marker for database-user records.
pub const DB_USER_MARKER: &str = "[RMD-DBUSER-PROCESSED]";

/// Completion marker for network-rule records.
pub const NETWORK_RULE_MARKER: &str = "[RMD-NETRULE-PROCESSED]";

/// Stamped on unclassified and parse-failed records. The guard treats it as
/// terminal: the ticket waits for an operator and is never annotated twice.
pub const REVIEW_TOKEN: &str = "[RMD-REVIEW-REQUIRED]";

/// Completion phrases written by the earlier tooling.
pub const LEGACY_MARKERS: &[&str] = &[
    "TASK COMPLETED",
    "TASK 2 COMPLETED",
    "Incident already processed",
    "User successfully created",
    "Redshift user already exists",
];

/// (family, marker) table over every executable family.
pub const COMPLETION_MARKERS: &[(OperationFamily, &str)] = &[
    (OperationFamily::DatabaseUserLifecycle, DB_USER_MARKER),
    (OperationFamily::NetworkRuleChange, NETWORK_RULE_MARKER),
];

/// Completion markers the audit recorder stamps for `family`.
pub fn family_markers(family: OperationFamily) -> Vec<&'static str> {
    COMPLETION_MARKERS
        .iter()
        .filter(|(f, _)| *f == family)
        .map(|(_, marker)| *marker)
        .collect()
}

/// Every string the guard treats as proof that a record was appended.
pub fn all_completion_markers() -> impl Iterator<Item = &'static str> {
    COMPLETION_MARKERS
        .iter()
        .map(|(_, marker)| *marker)
        .chain(std::iter::once(REVIEW_TOKEN))
        .chain(LEGACY_MARKERS.iter().copied())
}

/// Tokens carried by a record with the given terminal state.
pub fn record_tokens(family: OperationFamily, disposition: &Disposition) -> Vec<&'static str> {
    match disposition {
        Disposition::Executed { .. } => family_markers(family),
        Disposition::Unclassified | Disposition::ParseFailed { .. } => vec![REVIEW_TOKEN],
    }
}
