//! Executor interface.

use crate::error::CloudError;
use crate::logging::structured::LogContext;
use crate::model::{OperationFamily, OperationOutcome, ParsedRequest};
use crate::security::redaction::redact_secrets;

/// Runs the cloud call sequence for one operation family.
///
/// Per-item failures are reported inside the returned outcome. `Err` is for
/// failures that stop the whole request before any item was attempted; the
/// caller turns those into a single failed item.
pub trait Executor: Send + Sync {
    fn family(&self) -> OperationFamily;

    fn execute(
        &self,
        request: &ParsedRequest,
        ctx: &LogContext,
    ) -> Result<OperationOutcome, CloudError>;
}

/// Ticket-safe description of a failed step.
pub fn failure_detail(step: &str, error: &CloudError) -> String {
    redact_secrets(&format!("{}: {}", step, error))
}

pub(crate) fn wrong_request(family: OperationFamily) -> CloudError {
    CloudError::Rejected(format!("request is not a {} request", family.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_detail_is_redacted() {
        let err = CloudError::CommandFailed {
            command: "aws ec2 authorize-security-group-ingress".to_string(),
            stderr: "User: arn:aws:iam::123456789012:user/ops is not authorized".to_string(),
        };
        let detail = failure_detail("authorize failed", &err);
        assert!(detail.starts_with("authorize failed: "));
        assert!(!detail.contains("123456789012"));
    }
}
