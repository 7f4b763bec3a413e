//! Secret redaction for text bound for a ticket.
//!
//! Cloud error output can echo credentials and account identifiers. Anything
//! that reaches a work note passes through [`redact_secrets`] first:
//! - Access key ids
//! - Secret access keys and session tokens
//! - Account ids inside ARNs

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Access key id (long-term and temporary)
    static ref ACCESS_KEY_PATTERN: Regex = Regex::new(
        r"\b(?:AKIA|ASIA)[A-Z0-9]{16}\b"
    ).unwrap();

    /// `aws_secret_access_key = ...`, `SessionToken: ...`
    static ref SECRET_ASSIGNMENT_PATTERN: Regex = Regex::new(
        r#"(?i)\b(aws_secret_access_key|secret_?access_?key|aws_session_token|session_?token)(["']?\s*[:=]\s*["']?)[A-Za-z0-9/+=]{16,}"#
    ).unwrap();

    /// Account id inside an ARN
    static ref ARN_ACCOUNT_PATTERN: Regex = Regex::new(
        r"\b(arn:aws[a-z-]*:[a-z0-9-]*:[a-z0-9-]*:)\d{12}(:)"
    ).unwrap();
}

/// Redaction result.
#[derive(Debug, Default)]
pub struct RedactionResult {
    pub access_keys_found: usize,
    pub secrets_found: usize,
    pub account_ids_found: usize,
}

impl RedactionResult {
    pub fn total(&self) -> usize {
        self.access_keys_found + self.secrets_found + self.account_ids_found
    }
}

/// Redact secrets from `text`, reporting what was replaced.
pub fn redact_with_result(text: &str) -> (String, RedactionResult) {
    let mut result = RedactionResult::default();
    let mut redacted = text.to_string();

    let secrets = SECRET_ASSIGNMENT_PATTERN.find_iter(&redacted).count();
    if secrets > 0 {
        result.secrets_found += secrets;
        redacted = SECRET_ASSIGNMENT_PATTERN
            .replace_all(&redacted, "${1}${2}[REDACTED]")
            .to_string();
    }

    let keys = ACCESS_KEY_PATTERN.find_iter(&redacted).count();
    if keys > 0 {
        result.access_keys_found += keys;
        redacted = ACCESS_KEY_PATTERN
            .replace_all(&redacted, "[ACCESS_KEY_ID]")
            .to_string();
    }

    let accounts = ARN_ACCOUNT_PATTERN.find_iter(&redacted).count();
    if accounts > 0 {
        result.account_ids_found += accounts;
        redacted = ARN_ACCOUNT_PATTERN
            .replace_all(&redacted, "${1}[ACCOUNT]${2}")
            .to_string();
    }

    (redacted, result)
}

/// Redact secrets from `text`.
pub fn redact_secrets(text: &str) -> String {
    redact_with_result(text).0
}
