//! Database-user request extraction.

use lazy_static::lazy_static;

use crate::extraction::rules::FieldRule;
use crate::model::{DatabaseUserParams, OperationFamily, ParseFailure, ParsedRequest, RequestParameters};

/// Words that follow "user" in prose but are never a user name.
const NOT_A_USERNAME: &[&str] = &[
    "a", "an", "the", "named", "name", "in", "on", "for", "to", "with", "and", "request",
    "account", "access", "creation", "group", "redshift", "database",
];

lazy_static! {
    static ref USERNAME: FieldRule = FieldRule::new(
        "username",
        &[
            r"(?i)\buser\s*name\s*[:=]\s*(\w+)",
            r"(?i)\buser\s+named\s+(\w+)",
            r"(?i)\busername\s+(\w+)",
            r"(?i)\bdatabase\s+user\s+(\w+)",
            r"(?i)\buser\s+(\w+)\s+to\s+the\s+group",
            r"(?i)\bcreate\s+(?:a\s+)?(?:new\s+)?(?:database\s+|redshift\s+)?user\s+(\w+)",
        ],
    )
    .rejecting(NOT_A_USERNAME);

    static ref CLUSTER: FieldRule = FieldRule::new(
        "cluster",
        &[
            r"(?i)\bredshift[\s:_-]*cluster[\s:_-]*(\d+)\b",
            r"(?i)\bcluster\s*(?:id|identifier|name)?\s*[:\s]\s*([a-z][a-z0-9]*(?:-[a-z0-9]+)+)\b",
            r"(?i)\bcluster[\s:-]*(\d+)\b",
        ],
    );
}

/// Extract a user name and cluster reference. Both are required.
pub fn extract_database_user(text: &str) -> Result<ParsedRequest, ParseFailure> {
    let mut raw_matches = Vec::new();
    let username = USERNAME.find(text, &mut raw_matches);
    let cluster = CLUSTER.find(text, &mut raw_matches);

    match (username, cluster) {
        (Some(username), Some(cluster_ref)) => Ok(ParsedRequest {
            target: username,
            parameters: RequestParameters::DatabaseUser(DatabaseUserParams { cluster_ref }),
            raw_matches,
        }),
        (username, cluster) => {
            let mut missing_fields = Vec::new();
            if username.is_none() {
                missing_fields.push(USERNAME.field.to_string());
            }
            if cluster.is_none() {
                missing_fields.push(CLUSTER.field.to_string());
            }
            Err(ParseFailure {
                family: OperationFamily::DatabaseUserLifecycle,
                missing_fields,
                raw_matches,
            })
        }
    }
}
