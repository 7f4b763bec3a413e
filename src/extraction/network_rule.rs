//! Network-rule request extraction.

use lazy_static::lazy_static;
use regex::Regex;

use crate::extraction::cidr::parse_cidr_list;
use crate::extraction::rules::FieldRule;
use crate::security::identifiers::validate_region;
use crate::model::{
    Direction, NetworkRuleParams, OperationFamily, ParseFailure, ParsedRequest, Protocol, RawMatch,
    RequestParameters, RuleAction,
};

/// Longest free-text rule description taken from a ticket.
pub const MAX_RULE_DESCRIPTION: usize = 100;

lazy_static! {
    /// "add an inbound rule", "remove outbound rule".
    static ref OPERATION: Regex =
        Regex::new(r"(?i)\b(add|remove)\s+(?:an?\s+)?(inbound|outbound)\s+rule").unwrap();

    static ref ACTION: FieldRule = FieldRule::new(
        "action",
        &[r"(?i)\baction\s*[:=]\s*(add|remove|authorize|revoke)\b"],
    );

    static ref DIRECTION: FieldRule = FieldRule::new(
        "direction",
        &[r"(?i)\bdirection\s*[:=]\s*(inbound|outbound|ingress|egress)\b"],
    );

    static ref SECURITY_GROUP: FieldRule = FieldRule::new(
        "security_group_id",
        &[
            r"(?i)security\s+group\s+id\s*[:\s]+\s*(sg-[a-zA-Z0-9]+)",
            r"(?i)\bsg[-_]?id\s*[:\s]+\s*(sg-[a-zA-Z0-9]+)",
            r"\b(sg-[a-zA-Z0-9]{8,})\b",
        ],
    );

    /// A labeled value is taken as written and validated afterwards, so a
    /// malformed region is reported instead of replaced by the default.
    static ref REGION: FieldRule = FieldRule::new(
        "region",
        &[
            r"(?i)\bregion\s*[:=]\s*([a-z0-9-]+)",
            r"(?i)\bregion\s+([a-z]{2}(?:-gov)?-[a-z]+-\d{1,2})\b",
        ],
    );

    static ref PORT: FieldRule = FieldRule::new("port", &[r"(?i)\bport\s*[:\s]+\s*(\d+)"]);

    static ref PROTOCOL: FieldRule = FieldRule::new(
        "protocol",
        &[r"(?i)\bprotocol\s*[:\s]+\s*(tcp|udp|icmp|all)\b"],
    );

    static ref SERVICE_TYPE: FieldRule = FieldRule::new(
        "type",
        &[r"(?i)\btype\s*[:\s]+\s*(\w+)"],
    );

    static ref CLUSTER: FieldRule = FieldRule::new(
        "cluster",
        &[r"(?i)\bredshift[-_]cluster[-_](\d+)\b"],
    );

    static ref DESCRIPTION: FieldRule = FieldRule::new(
        "description",
        &[r"(?im)^\s*(?:rule\s+)?description\s*:\s*([^\n]+)"],
    );
}

/// Default port for a named service.
pub fn service_port(service: &str) -> Option<u16> {
    match service.to_lowercase().as_str() {
        "redshift" => Some(5439),
        "postgresql" | "postgres" => Some(5432),
        "mysql" => Some(3306),
        "ssh" => Some(22),
        "https" => Some(443),
        "http" => Some(80),
        _ => None,
    }
}

fn parse_action(value: &str) -> Option<RuleAction> {
    match value.to_lowercase().as_str() {
        "add" | "authorize" => Some(RuleAction::Add),
        "remove" | "revoke" => Some(RuleAction::Remove),
        _ => None,
    }
}

fn parse_direction(value: &str) -> Option<Direction> {
    match value.to_lowercase().as_str() {
        "inbound" | "ingress" => Some(Direction::Inbound),
        "outbound" | "egress" => Some(Direction::Outbound),
        _ => None,
    }
}

/// Action and direction from the "add an inbound rule" phrase, falling back
/// to labeled `action:` / `direction:` fields.
fn find_operation(
    text: &str,
    raw: &mut Vec<RawMatch>,
) -> (Option<RuleAction>, Option<Direction>) {
    if let Some(caps) = OPERATION.captures(text) {
        raw.push(RawMatch {
            field: "operation".to_string(),
            pattern: OPERATION.as_str().to_string(),
            value: caps[0].to_string(),
        });
        return (parse_action(&caps[1]), parse_direction(&caps[2]));
    }

    let action = ACTION.find(text, raw).and_then(|v| parse_action(&v));
    let direction = DIRECTION.find(text, raw).and_then(|v| parse_direction(&v));
    (action, direction)
}

fn invalid(field: &str, value: &str) -> String {
    format!("{} (invalid: {})", field, value)
}

/// Port: explicit value, else the service hint's default, else 5439 when
/// the ticket is about Redshift. All-protocol and ICMP rules carry none.
///
/// `Err` holds the entry for `missing_fields`.
fn resolve_port(
    text: &str,
    protocol: Protocol,
    service_hint: Option<&str>,
    raw: &mut Vec<RawMatch>,
) -> Result<u16, String> {
    if let Some(explicit) = PORT.find(text, raw) {
        return explicit.parse::<u16>().map_err(|_| invalid("port", &explicit));
    }
    if matches!(protocol, Protocol::All | Protocol::Icmp) {
        return Ok(0);
    }
    if let Some(port) = service_hint.and_then(service_port) {
        return Ok(port);
    }
    if text.to_lowercase().contains("redshift") {
        if let Some(port) = service_port("redshift") {
            return Ok(port);
        }
    }
    Err("port".to_string())
}

/// Region as written, the default when none is given, or the
/// `missing_fields` entry when the written value is not a region.
fn resolve_region(text: &str, default_region: &str, raw: &mut Vec<RawMatch>) -> Result<String, String> {
    match REGION.find(text, raw) {
        Some(value) => {
            let region = value.to_lowercase();
            validate_region(&region)
                .map(|_| region)
                .map_err(|_| invalid("region", &value))
        }
        None => Ok(default_region.to_string()),
    }
}

/// Extract a security-group rule change.
///
/// Required: security group id, action, direction, at least one CIDR, and a
/// port (explicit or implied). Region, protocol and description default.
pub fn extract_network_rule(
    text: &str,
    default_region: &str,
    default_description: &str,
) -> Result<ParsedRequest, ParseFailure> {
    let mut raw = Vec::new();

    let (action, direction) = find_operation(text, &mut raw);
    let group_id = SECURITY_GROUP.find(text, &mut raw);
    let region = resolve_region(text, default_region, &mut raw);
    let protocol = PROTOCOL
        .find(text, &mut raw)
        .and_then(|p| Protocol::from_wire(&p))
        .unwrap_or(Protocol::Tcp);
    let service_hint = SERVICE_TYPE.find(text, &mut raw).map(|t| t.to_lowercase());
    let port = resolve_port(text, protocol, service_hint.as_deref(), &mut raw);
    let cluster = CLUSTER
        .find(text, &mut raw)
        .map(|n| format!("redshift-cluster-{}", n));
    let description = DESCRIPTION
        .find(text, &mut raw)
        .filter(|d| d.len() < MAX_RULE_DESCRIPTION)
        .unwrap_or_else(|| default_description.to_string());

    let cidrs = parse_cidr_list(text);
    for cidr in &cidrs {
        raw.push(RawMatch {
            field: "cidrs".to_string(),
            pattern: "cidr".to_string(),
            value: cidr.clone(),
        });
    }

    let mut missing_fields = Vec::new();
    if group_id.is_none() {
        missing_fields.push("security_group_id".to_string());
    }
    if action.is_none() {
        missing_fields.push("action".to_string());
    }
    if direction.is_none() {
        missing_fields.push("direction".to_string());
    }
    if cidrs.is_empty() {
        missing_fields.push("cidrs".to_string());
    }
    if let Err(entry) = &port {
        missing_fields.push(entry.clone());
    }
    if let Err(entry) = &region {
        missing_fields.push(entry.clone());
    }

    match (group_id, action, direction, port, region) {
        (Some(group_id), Some(action), Some(direction), Ok(port), Ok(region))
            if missing_fields.is_empty() =>
        {
            Ok(ParsedRequest {
                target: group_id,
                parameters: RequestParameters::NetworkRule(NetworkRuleParams {
                    region,
                    direction,
                    action,
                    port,
                    protocol,
                    description,
                    cidrs,
                    cluster,
                    service_hint,
                }),
                raw_matches: raw,
            })
        }
        _ => Err(ParseFailure {
            family: OperationFamily::NetworkRuleChange,
            missing_fields,
            raw_matches: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_DESCRIPTION: &str = "Ticket Remediation Automation";

    fn extract(text: &str) -> Result<ParsedRequest, ParseFailure> {
        extract_network_rule(text, "us-east-1", DEFAULT_DESCRIPTION)
    }

    #[test]
    fn test_inline_request() {
        let req = extract(
            "Add an inbound rule: security group id: sg-abc123, region: us-east-1, \
             cidr range to be added: 10.0.0.0/8, 11.0.0.0/8, port: 5439",
        )
        .unwrap();
        assert_eq!(req.target, "sg-abc123");
        let params = req.network_rule().unwrap();
        assert_eq!(params.action, RuleAction::Add);
        assert_eq!(params.direction, Direction::Inbound);
        assert_eq!(params.cidrs, vec!["10.0.0.0/8", "11.0.0.0/8"]);
        assert_eq!(params.port, 5439);
        assert_eq!(params.protocol, Protocol::Tcp);
        assert_eq!(params.region, "us-east-1");
        assert_eq!(params.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_multiline_request() {
        let text = "Remove outbound rule\n\
                    Security Group ID: sg-0123456789abcdef0\n\
                    Region: eu-west-2\n\
                    Protocol: udp\n\
                    Port: 53\n\
                    Description: DNS egress cleanup\n\
                    CIDR ranges:\n\
                    172.16.0.0/12\n\
                    192.168.0.0/16";
        let req = extract(text).unwrap();
        let params = req.network_rule().unwrap();
        assert_eq!(params.action, RuleAction::Remove);
        assert_eq!(params.direction, Direction::Outbound);
        assert_eq!(params.region, "eu-west-2");
        assert_eq!(params.protocol, Protocol::Udp);
        assert_eq!(params.port, 53);
        assert_eq!(params.description, "DNS egress cleanup");
        assert_eq!(params.cidrs, vec!["172.16.0.0/12", "192.168.0.0/16"]);
    }

    #[test]
    fn test_type_hint_supplies_port() {
        let req = extract(
            "add inbound rule sg-0a1b2c3d4e for type: ssh from 203.0.113.0/24",
        )
        .unwrap();
        let params = req.network_rule().unwrap();
        assert_eq!(params.port, 22);
        assert_eq!(params.service_hint.as_deref(), Some("ssh"));
    }

    #[test]
    fn test_explicit_port_overrides_type_hint() {
        let req = extract(
            "add inbound rule sg-0a1b2c3d4e type: mysql port: 3307 cidr 10.1.0.0/16",
        )
        .unwrap();
        assert_eq!(req.network_rule().unwrap().port, 3307);
    }

    #[test]
    fn test_cluster_reference() {
        let req = extract(
            "Add inbound rule for redshift-cluster-2, security group id: sg-abc123, 10.0.0.0/8",
        )
        .unwrap();
        let params = req.network_rule().unwrap();
        assert_eq!(params.cluster.as_deref(), Some("redshift-cluster-2"));
        assert_eq!(params.port, 5439);
    }

    #[test]
    fn test_protocol_all_needs_no_port() {
        let req = extract("add outbound rule sg-0a1b2c3d4e protocol: all 0.0.0.0/0").unwrap();
        let params = req.network_rule().unwrap();
        assert_eq!(params.protocol, Protocol::All);
        assert_eq!(params.port, 0);
    }

    #[test]
    fn test_labeled_action_and_direction() {
        let req = extract(
            "Security group id: sg-abc123\nAction: remove\nDirection: ingress\nPort: 443\n10.0.0.0/8",
        )
        .unwrap();
        let params = req.network_rule().unwrap();
        assert_eq!(params.action, RuleAction::Remove);
        assert_eq!(params.direction, Direction::Inbound);
    }

    #[test]
    fn test_missing_fields_are_named() {
        let failure = extract("Please update the security group for the web tier").unwrap_err();
        assert_eq!(failure.family, OperationFamily::NetworkRuleChange);
        assert!(failure.is_missing("security_group_id"));
        assert!(failure.is_missing("action"));
        assert!(failure.is_missing("direction"));
        assert!(failure.is_missing("cidrs"));
        assert!(failure.is_missing("port"));
    }

    #[test]
    fn test_missing_cidrs_only() {
        let failure = extract("Add inbound rule security group id: sg-abc123 port: 443").unwrap_err();
        assert_eq!(failure.missing_fields, vec!["cidrs"]);
    }

    #[test]
    fn test_gov_cloud_region_is_kept() {
        let req = extract(
            "Add an inbound rule: security group id: sg-abc12345, region: us-gov-west-1, \
             cidr range to be added: 10.0.0.0/8, port: 5439",
        )
        .unwrap();
        assert_eq!(req.network_rule().unwrap().region, "us-gov-west-1");

        let unlabeled = extract("add inbound rule sg-0a1b2c3d4e in region us-gov-east-1 port: 22 10.0.0.0/8")
            .unwrap();
        assert_eq!(unlabeled.network_rule().unwrap().region, "us-gov-east-1");
    }

    #[test]
    fn test_unparseable_region_is_reported() {
        let failure = extract(
            "Add an inbound rule: security group id: sg-abc12345, region: useast1, \
             cidr range to be added: 10.0.0.0/8, port: 5439",
        )
        .unwrap_err();
        assert_eq!(failure.missing_fields, vec!["region (invalid: useast1)"]);
        assert!(failure.is_missing("region"));
    }

    #[test]
    fn test_absent_region_uses_default() {
        let req = extract("add inbound rule sg-0a1b2c3d4e port: 22 10.0.0.0/8").unwrap();
        assert_eq!(req.network_rule().unwrap().region, "us-east-1");
    }

    #[test]
    fn test_out_of_range_port_is_invalid_not_missing() {
        let failure = extract("add inbound rule sg-0a1b2c3d4e port: 70000 10.0.0.0/8").unwrap_err();
        assert_eq!(failure.missing_fields, vec!["port (invalid: 70000)"]);
        assert!(failure.is_missing("port"));
    }

    #[test]
    fn test_long_description_falls_back_to_default() {
        let text = format!(
            "add inbound rule sg-0a1b2c3d4e port: 22 10.0.0.0/8\ndescription: {}",
            "x".repeat(150)
        );
        let req = extract(&text).unwrap();
        assert_eq!(req.network_rule().unwrap().description, DEFAULT_DESCRIPTION);
    }
}
