//! Family dispatch for extraction.

use crate::extraction::database_user::extract_database_user;
use crate::extraction::network_rule::extract_network_rule;
use crate::model::{OperationFamily, ParseFailure, ParsedRequest};

/// Region used when a ticket names none.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Rule description used when a ticket gives none.
pub const DEFAULT_RULE_DESCRIPTION: &str = "Ticket Remediation Automation";

/// Pattern extractor with its configured defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    pub default_region: String,
    pub default_description: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_string(),
            default_description: DEFAULT_RULE_DESCRIPTION.to_string(),
        }
    }
}

impl Extractor {
    pub fn new(default_region: &str, default_description: &str) -> Self {
        Self {
            default_region: default_region.to_string(),
            default_description: default_description.to_string(),
        }
    }

    /// Extract a request for `family` from `text`.
    ///
    /// `Unknown` has no fields to extract and always fails with
    /// `operation_type` missing.
    pub fn extract(
        &self,
        family: OperationFamily,
        text: &str,
    ) -> Result<ParsedRequest, ParseFailure> {
        match family {
            OperationFamily::DatabaseUserLifecycle => extract_database_user(text),
            OperationFamily::NetworkRuleChange => {
                extract_network_rule(text, &self.default_region, &self.default_description)
            }
            OperationFamily::Unknown => Err(ParseFailure {
                family,
                missing_fields: vec!["operation_type".to_string()],
                raw_matches: Vec::new(),
            }),
        }
    }
}

/// Extract with the default region and description.
pub fn extract(family: OperationFamily, text: &str) -> Result<ParsedRequest, ParseFailure> {
    Extractor::default().extract(family, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_family() {
        let req = extract(
            OperationFamily::DatabaseUserLifecycle,
            "Create user named user7 in redshift cluster 1",
        )
        .unwrap();
        assert_eq!(req.family(), OperationFamily::DatabaseUserLifecycle);

        let req = extract(
            OperationFamily::NetworkRuleChange,
            "add inbound rule sg-0a1b2c3d4e port: 22 10.0.0.0/8",
        )
        .unwrap();
        assert_eq!(req.family(), OperationFamily::NetworkRuleChange);
    }

    #[test]
    fn test_configured_defaults_apply() {
        let extractor = Extractor::new("ap-south-1", "ops-automation");
        let req = extractor
            .extract(
                OperationFamily::NetworkRuleChange,
                "add inbound rule sg-0a1b2c3d4e port: 22 10.0.0.0/8",
            )
            .unwrap();
        let params = req.network_rule().unwrap();
        assert_eq!(params.region, "ap-south-1");
        assert_eq!(params.description, "ops-automation");
    }

    #[test]
    fn test_unknown_family_fails() {
        let failure = extract(OperationFamily::Unknown, "anything").unwrap_err();
        assert_eq!(failure.missing_fields, vec!["operation_type"]);
    }
}
