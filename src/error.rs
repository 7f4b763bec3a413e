//! Error taxonomy for the collaborators this crate talks to.
//!
//! Classification and extraction outcomes (unknown type, missing fields) are
//! values, not errors; see [`crate::model::ParseFailure`].

use thiserror::Error;

/// Ticket-source transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("incident not found: {0}")]
    NotFound(String),

    #[error("ticket source returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// Cloud control-plane failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("could not run `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("invalid response from `{command}`: {reason}")]
    Decode { command: String, reason: String },

    #[error("statement {statement_id} {status}: {reason}")]
    StatementFailed {
        statement_id: String,
        status: String,
        reason: String,
    },

    #[error("statement {0} did not complete within the timeout")]
    Timeout(String),

    #[error("rejected before submission: {0}")]
    Rejected(String),
}

impl CloudError {
    /// Whether the provider refused the change because it is already in place.
    pub fn is_already_exists(&self) -> bool {
        let text = match self {
            CloudError::CommandFailed { stderr, .. } => stderr,
            CloudError::StatementFailed { reason, .. } => reason,
            _ => return false,
        };
        let lower = text.to_lowercase();
        lower.contains("already exists") || lower.contains("duplicate")
    }
}

/// Startup configuration errors. These are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {key}={value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// History store failures.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history record encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_detection() {
        let err = CloudError::CommandFailed {
            command: "aws ec2 authorize-security-group-ingress".to_string(),
            stderr: "An error occurred (InvalidPermission.Duplicate)".to_string(),
        };
        assert!(err.is_already_exists());

        let err = CloudError::StatementFailed {
            statement_id: "abc".to_string(),
            status: "FAILED".to_string(),
            reason: "ERROR: user \"user7\" already exists".to_string(),
        };
        assert!(err.is_already_exists());

        assert!(!CloudError::Timeout("abc".to_string()).is_already_exists());
    }

    #[test]
    fn test_missing_lists_every_key() {
        let err = ConfigError::Missing(vec![
            "SERVICENOW_INSTANCE_URL".to_string(),
            "SERVICENOW_PASSWORD".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "missing required environment variables: SERVICENOW_INSTANCE_URL, SERVICENOW_PASSWORD"
        );
    }
}
