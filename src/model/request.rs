//! Operation families and the structured requests extracted for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of operation families this engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationFamily {
    DatabaseUserLifecycle,
    NetworkRuleChange,
    Unknown,
}

impl OperationFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationFamily::DatabaseUserLifecycle => "database_user_lifecycle",
            OperationFamily::NetworkRuleChange => "network_rule_change",
            OperationFamily::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OperationFamily::DatabaseUserLifecycle => "Database user lifecycle",
            OperationFamily::NetworkRuleChange => "Network rule change",
            OperationFamily::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OperationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "database_user_lifecycle" | "database_user" | "db_user" => {
                Ok(OperationFamily::DatabaseUserLifecycle)
            }
            "network_rule_change" | "network_rule" | "security_group" => {
                Ok(OperationFamily::NetworkRuleChange)
            }
            "unknown" => Ok(OperationFamily::Unknown),
            other => Err(format!("unknown operation family: {}", other)),
        }
    }
}

/// Traffic direction of a security-group rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    pub fn is_egress(&self) -> bool {
        matches!(self, Direction::Outbound)
    }
}

/// Requested mutation of a security-group rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Add,
    Remove,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Add => "add",
            RuleAction::Remove => "remove",
        }
    }
}

/// IP protocol of a rule. `All` is `-1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    All,
}

impl Protocol {
    pub fn wire(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::All => "-1",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "tcp" | "6" => Some(Protocol::Tcp),
            "udp" | "17" => Some(Protocol::Udp),
            "icmp" | "1" => Some(Protocol::Icmp),
            "all" | "-1" => Some(Protocol::All),
            _ => None,
        }
    }
}

/// One rule to authorize or revoke; a single CIDR of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub cidr: String,
    pub port: u16,
    pub protocol: Protocol,
    pub direction: Direction,
    pub description: Option<String>,
}

/// Parameters of a database-user request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseUserParams {
    /// Cluster reference as written in the ticket (`1`, `redshift-cluster-1`).
    pub cluster_ref: String,
}

impl DatabaseUserParams {
    /// Cluster identifier used against the control plane. A bare number `N`
    /// resolves to `redshift-cluster-N`.
    pub fn cluster_identifier(&self) -> String {
        if !self.cluster_ref.is_empty() && self.cluster_ref.chars().all(|c| c.is_ascii_digit()) {
            format!("redshift-cluster-{}", self.cluster_ref)
        } else {
            self.cluster_ref.clone()
        }
    }
}

/// Parameters of a security-group rule request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRuleParams {
    pub region: String,
    pub direction: Direction,
    pub action: RuleAction,
    pub port: u16,
    pub protocol: Protocol,
    pub description: String,
    /// Ordered, de-duplicated.
    pub cidrs: Vec<String>,
    /// Cluster whose association with the group should be checked.
    pub cluster: Option<String>,
    pub service_hint: Option<String>,
}

impl NetworkRuleParams {
    /// Rule specs in CIDR order.
    pub fn rule_specs(&self) -> Vec<RuleSpec> {
        self.cidrs
            .iter()
            .map(|cidr| RuleSpec {
                cidr: cidr.clone(),
                port: self.port,
                protocol: self.protocol,
                direction: self.direction,
                description: Some(self.description.clone()),
            })
            .collect()
    }
}

/// Family-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestParameters {
    DatabaseUser(DatabaseUserParams),
    NetworkRule(NetworkRuleParams),
}

/// A pattern hit, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMatch {
    pub field: String,
    pub pattern: String,
    pub value: String,
}

/// A fully populated request for one family.
///
/// Only the extractor builds these, and only when every required field is
/// present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRequest {
    /// User name or security-group id.
    pub target: String,
    pub parameters: RequestParameters,
    pub raw_matches: Vec<RawMatch>,
}

impl ParsedRequest {
    pub fn family(&self) -> OperationFamily {
        match self.parameters {
            RequestParameters::DatabaseUser(_) => OperationFamily::DatabaseUserLifecycle,
            RequestParameters::NetworkRule(_) => OperationFamily::NetworkRuleChange,
        }
    }

    pub fn database_user(&self) -> Option<&DatabaseUserParams> {
        match &self.parameters {
            RequestParameters::DatabaseUser(p) => Some(p),
            _ => None,
        }
    }

    pub fn network_rule(&self) -> Option<&NetworkRuleParams> {
        match &self.parameters {
            RequestParameters::NetworkRule(p) => Some(p),
            _ => None,
        }
    }
}

/// The family matched but required fields are missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub family: OperationFamily,
    pub missing_fields: Vec<String>,
    pub raw_matches: Vec<RawMatch>,
}

impl ParseFailure {
    /// Whether `field` is absent or was given with an invalid value
    /// (`"port (invalid: 70000)"`).
    pub fn is_missing(&self, field: &str) -> bool {
        self.missing_fields.iter().any(|f| {
            f == field
                || f.strip_prefix(field)
                    .map_or(false, |rest| rest.starts_with(" (invalid: "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_identifier_resolution() {
        let numeric = DatabaseUserParams {
            cluster_ref: "1".to_string(),
        };
        assert_eq!(numeric.cluster_identifier(), "redshift-cluster-1");

        let named = DatabaseUserParams {
            cluster_ref: "analytics-prod-3".to_string(),
        };
        assert_eq!(named.cluster_identifier(), "analytics-prod-3");
    }

    #[test]
    fn test_protocol_wire_values() {
        assert_eq!(Protocol::All.wire(), "-1");
        assert_eq!(Protocol::from_wire("ALL"), Some(Protocol::All));
        assert_eq!(Protocol::from_wire("-1"), Some(Protocol::All));
        assert_eq!(Protocol::from_wire("tcp"), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_wire("gre"), None);
    }

    #[test]
    fn test_family_from_str() {
        assert_eq!(
            "network-rule".parse::<OperationFamily>(),
            Ok(OperationFamily::NetworkRuleChange)
        );
        assert_eq!(
            "database_user_lifecycle".parse::<OperationFamily>(),
            Ok(OperationFamily::DatabaseUserLifecycle)
        );
        assert!("firewall".parse::<OperationFamily>().is_err());
    }

    #[test]
    fn test_rule_specs_follow_cidr_order() {
        let params = NetworkRuleParams {
            region: "us-east-1".to_string(),
            direction: Direction::Inbound,
            action: RuleAction::Add,
            port: 5439,
            protocol: Protocol::Tcp,
            description: "Ticket Remediation Automation".to_string(),
            cidrs: vec!["11.0.0.0/8".to_string(), "10.0.0.0/8".to_string()],
            cluster: None,
            service_hint: None,
        };
        let specs = params.rule_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].cidr, "11.0.0.0/8");
        assert_eq!(specs[1].cidr, "10.0.0.0/8");
        assert_eq!(specs[1].port, 5439);
    }
}
