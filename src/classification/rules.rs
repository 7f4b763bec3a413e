//! Classifier rule sets, one per executable family.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::OperationFamily;

/// Network-rule triggers. Matched against lowercased text.
pub const NETWORK_RULE_PATTERNS: &[&str] = &[
    r"security\s+group",
    r"sg-[a-z0-9]+",
    r"inbound\s+rule",
    r"outbound\s+rule",
    r"add\s+(an?\s+)?inbound",
    r"add\s+(an?\s+)?outbound",
    r"remove\s+(an?\s+)?inbound",
    r"remove\s+(an?\s+)?outbound",
    r"cidr\s+range",
    r"firewall\s+rule",
];

/// Database-user triggers. Matched against lowercased text.
///
/// Group and grant phrasing ("add user bob to group analysts") routes here
/// on purpose: the executor creates the named user and leaves memberships
/// and privileges to the operator.
pub const DATABASE_USER_PATTERNS: &[&str] = &[
    r"redshift.*user",
    r"create.*user.*redshift",
    r"user.*redshift.*cluster",
    r"database\s+user",
    r"add.*user.*group",
    r"grant.*privilege",
    r"redshift-cluster-\d+",
    r"username[:\s]",
    r"schema\s+access",
];

/// Compiled patterns of one family.
pub struct FamilyRules {
    pub family: OperationFamily,
    pub patterns: Vec<Regex>,
}

impl FamilyRules {
    fn compile(family: OperationFamily, sources: &[&str]) -> Self {
        Self {
            family,
            patterns: sources.iter().map(|p| Regex::new(p).unwrap()).collect(),
        }
    }

    /// First pattern of this family that matches `text`.
    pub fn first_match(&self, text: &str) -> Option<&Regex> {
        self.patterns.iter().find(|p| p.is_match(text))
    }
}

lazy_static! {
    /// Evaluation order. The first family with any matching pattern wins.
    ///
    /// Network rules come first: a rule ticket commonly names the Redshift
    /// cluster behind the group ("redshift cluster user access"), while a
    /// user ticket never names a security group or CIDR range.
    pub static ref RULE_SETS: Vec<FamilyRules> = vec![
        FamilyRules::compile(OperationFamily::NetworkRuleChange, NETWORK_RULE_PATTERNS),
        FamilyRules::compile(OperationFamily::DatabaseUserLifecycle, DATABASE_USER_PATTERNS),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_sets_cover_every_executable_family() {
        let families: Vec<_> = RULE_SETS.iter().map(|r| r.family).collect();
        assert!(families.contains(&OperationFamily::NetworkRuleChange));
        assert!(families.contains(&OperationFamily::DatabaseUserLifecycle));
        assert!(!families.contains(&OperationFamily::Unknown));
    }

    #[test]
    fn test_patterns_compile() {
        for rules in RULE_SETS.iter() {
            assert!(!rules.patterns.is_empty());
        }
    }
}
