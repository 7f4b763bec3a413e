//! Terraform backup documents for security-group changes.
//!
//! A Markdown file with the group's rules before and after the change as HCL,
//! the per-CIDR change table, and the CLI commands that undo it. The file
//! path goes into the history record only.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::clients::aws::ip_permissions;
use crate::error::HistoryError;
use crate::model::{
    BackupSnapshot, ItemAction, NetworkRuleParams, OperationOutcome, ParsedRequest, RuleSpec,
    SecurityGroup, SecurityGroupRule,
};

pub const GENERATED_BY: &str = "Ticket Remediation Automation";

/// `sg-<group>_<incident>_<YYYYmmdd_HHMMSS>.md`
pub fn backup_file_name(group_id: &str, incident: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "sg-{}_{}_{}.md",
        group_id,
        incident,
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// HCL resource name for a group: non-alphanumerics become underscores.
fn resource_name(group: &SecurityGroup) -> String {
    let base = if group.group_name.is_empty() {
        &group.group_id
    } else {
        &group.group_name
    };
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn write_group_hcl(doc: &mut String, group: &SecurityGroup, rules: &[SecurityGroupRule], state: &str) {
    let name = resource_name(group);
    let _ = writeln!(doc, "```hcl");
    let _ = writeln!(doc, "# State: {}", state);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "resource \"aws_security_group\" \"{}\" {{", name);
    let _ = writeln!(doc, "  name        = \"{}\"", group.group_name);
    let _ = writeln!(
        doc,
        "  description = \"{}\"",
        group.description.as_deref().unwrap_or("")
    );
    let _ = writeln!(doc, "  vpc_id      = \"{}\"", group.vpc_id.as_deref().unwrap_or("unknown"));
    let _ = writeln!(doc, "}}");

    for (index, rule) in rules.iter().enumerate() {
        let kind = if rule.is_egress { "egress" } else { "ingress" };
        let _ = writeln!(doc);
        let _ = writeln!(doc, "# Rule ID: {}", rule.rule_id);
        let _ = writeln!(
            doc,
            "resource \"aws_security_group_rule\" \"{}_{}_{}\" {{",
            name, kind, index
        );
        let _ = writeln!(doc, "  type              = \"{}\"", kind);
        let _ = writeln!(doc, "  from_port         = {}", rule.from_port.unwrap_or(0));
        let _ = writeln!(doc, "  to_port           = {}", rule.to_port.unwrap_or(0));
        let _ = writeln!(doc, "  protocol          = \"{}\"", rule.protocol);
        let _ = writeln!(
            doc,
            "  cidr_blocks       = [\"{}\"]",
            rule.cidr.as_deref().unwrap_or("0.0.0.0/0")
        );
        let _ = writeln!(doc, "  security_group_id = aws_security_group.{}.id", name);
        let _ = writeln!(
            doc,
            "  description       = \"{}\"",
            rule.description.as_deref().unwrap_or("")
        );
        let _ = writeln!(doc, "}}");
    }
    let _ = writeln!(doc, "```");
}

fn write_rules_table(doc: &mut String, rules: &[SecurityGroupRule]) {
    let _ = writeln!(doc, "| Rule ID | Direction | CIDR | Port Range | Protocol | Description |");
    let _ = writeln!(doc, "|---------|-----------|------|------------|----------|-------------|");
    for rule in rules {
        let direction = if rule.is_egress { "Outbound" } else { "Inbound" };
        let ports = match (rule.from_port, rule.to_port) {
            (Some(from), Some(to)) => format!("{}-{}", from, to),
            _ => "all".to_string(),
        };
        let description: String = rule
            .description
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(40)
            .collect();
        let _ = writeln!(
            doc,
            "| `{}` | {} | `{}` | {} | {} | {} |",
            rule.rule_id,
            direction,
            rule.cidr.as_deref().unwrap_or("N/A"),
            ports,
            rule.protocol,
            description
        );
    }
}

fn rollback_command(
    group_id: &str,
    params: &NetworkRuleParams,
    spec: &RuleSpec,
    action: ItemAction,
    external_id: Option<&str>,
) -> Option<String> {
    let direction = if spec.direction.is_egress() { "egress" } else { "ingress" };
    match (action, external_id) {
        (ItemAction::Added, Some(rule_id)) => Some(format!(
            "aws ec2 revoke-security-group-{} --group-id {} --security-group-rule-ids {} --region {} --no-cli-pager",
            direction, group_id, rule_id, params.region
        )),
        (ItemAction::Added, None) | (ItemAction::Removed, _) => {
            let verb = if action == ItemAction::Added { "revoke" } else { "authorize" };
            Some(format!(
                "aws ec2 {}-security-group-{} --group-id {} --ip-permissions '{}' --region {} --no-cli-pager",
                verb,
                direction,
                group_id,
                ip_permissions(spec),
                params.region
            ))
        }
        _ => None,
    }
}

/// Markdown backup document for a network-rule outcome.
///
/// `None` when the outcome carries no security-group snapshot.
pub fn render_backup(
    incident: &str,
    request: &ParsedRequest,
    outcome: &OperationOutcome,
    timestamp: DateTime<Utc>,
) -> Option<String> {
    let params = request.network_rule()?;
    let (group, before, after) = match &outcome.backup {
        Some(BackupSnapshot::SecurityGroupRules { group, before, after }) => (group, before, after),
        _ => return None,
    };
    let operation = format!("{} {} rule", params.action.as_str(), params.direction.as_str());

    let mut doc = String::new();
    let _ = writeln!(doc, "# Security Group Backup - {}", group.group_id);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "## Incident Information");
    let _ = writeln!(doc, "- **Incident Number:** {}", incident);
    let _ = writeln!(doc, "- **Operation:** {}", operation);
    let _ = writeln!(doc, "- **Timestamp:** {}", timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(doc, "- **Generated By:** {}", GENERATED_BY);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "## Security Group Details");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "| Property | Value |");
    let _ = writeln!(doc, "|----------|-------|");
    let _ = writeln!(doc, "| Security Group ID | `{}` |", group.group_id);
    let _ = writeln!(doc, "| Security Group Name | `{}` |", group.group_name);
    let _ = writeln!(doc, "| VPC ID | `{}` |", group.vpc_id.as_deref().unwrap_or("unknown"));
    let _ = writeln!(doc, "| Description | {} |", group.description.as_deref().unwrap_or(""));
    let _ = writeln!(doc, "| Owner ID | {} |", group.owner_id.as_deref().unwrap_or(""));
    let _ = writeln!(doc);
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "## Change Summary");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "| CIDR | Port | Protocol | Result | Reference |");
    let _ = writeln!(doc, "|------|------|----------|--------|-----------|");
    for item in &outcome.items {
        let _ = writeln!(
            doc,
            "| `{}` | {} | {} | {} | {} |",
            item.target,
            params.port,
            params.protocol.wire(),
            item.action.label(),
            item.external_id.as_deref().unwrap_or("")
        );
    }
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Rule description: {}", params.description);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "## Before State");
    let _ = writeln!(doc);
    write_group_hcl(&mut doc, group, before, "BEFORE operation");
    let _ = writeln!(doc);
    write_rules_table(&mut doc, before);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "## After State");
    let _ = writeln!(doc);
    write_group_hcl(&mut doc, group, after, "AFTER operation");
    let _ = writeln!(doc);
    write_rules_table(&mut doc, after);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "## Rollback Instructions");
    let _ = writeln!(doc);

    let commands: Vec<String> = params
        .rule_specs()
        .iter()
        .filter_map(|spec| {
            let item = outcome.items.iter().find(|i| i.target == spec.cidr)?;
            rollback_command(&group.group_id, params, spec, item.action, item.external_id.as_deref())
        })
        .collect();
    if commands.is_empty() {
        let _ = writeln!(doc, "No rules were changed; nothing to roll back.");
    } else {
        let _ = writeln!(doc, "```bash");
        for command in commands {
            let _ = writeln!(doc, "{}", command);
        }
        let _ = writeln!(doc, "```");
    }
    Some(doc)
}

/// Write the backup document into `dir`, returning its path.
pub fn write_backup(
    dir: &Path,
    incident: &str,
    request: &ParsedRequest,
    outcome: &OperationOutcome,
    timestamp: DateTime<Utc>,
) -> Result<Option<PathBuf>, HistoryError> {
    let doc = match render_backup(incident, request, outcome, timestamp) {
        Some(doc) => doc,
        None => return Ok(None),
    };
    fs::create_dir_all(dir)?;
    let path = dir.join(backup_file_name(&request.target, incident, timestamp));
    fs::write(&path, doc)?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::rule_from_spec;
    use crate::model::{Direction, ItemResult, Protocol, RequestParameters, RuleAction};
    use chrono::TimeZone;

    fn request(action: RuleAction) -> ParsedRequest {
        ParsedRequest {
            target: "sg-abc123".to_string(),
            parameters: RequestParameters::NetworkRule(NetworkRuleParams {
                region: "us-east-1".to_string(),
                direction: Direction::Inbound,
                action,
                port: 5439,
                protocol: Protocol::Tcp,
                description: "Ticket Remediation Automation".to_string(),
                cidrs: vec!["10.0.0.0/8".to_string(), "11.0.0.0/8".to_string()],
                cluster: None,
                service_hint: None,
            }),
            raw_matches: Vec::new(),
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 8, 16, 50, 0).unwrap()
    }

    fn added_outcome(req: &ParsedRequest) -> OperationOutcome {
        let specs = req.network_rule().unwrap().rule_specs();
        let after = vec![rule_from_spec("sg-abc123", "sgr-00000001", &specs[0])];
        OperationOutcome::new(
            vec![
                ItemResult::new("10.0.0.0/8", ItemAction::Added, "inbound rule added")
                    .with_external_id(Some("sgr-00000001".to_string())),
                ItemResult::new("11.0.0.0/8", ItemAction::Failed, "authorize failed"),
            ],
            "1 of 2",
        )
        .with_backup(BackupSnapshot::SecurityGroupRules {
            group: SecurityGroup {
                group_id: "sg-abc123".to_string(),
                group_name: "redshift-access".to_string(),
                vpc_id: Some("vpc-1".to_string()),
                ..Default::default()
            },
            before: Vec::new(),
            after,
        })
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            backup_file_name("sg-abc123", "INC0010040", ts()),
            "sg-sg-abc123_INC0010040_20260108_165000.md"
        );
    }

    #[test]
    fn test_render_backup_sections() {
        let req = request(RuleAction::Add);
        let doc = render_backup("INC0010040", &req, &added_outcome(&req), ts()).unwrap();
        assert!(doc.contains("# Security Group Backup - sg-abc123"));
        assert!(doc.contains("# State: BEFORE operation"));
        assert!(doc.contains("# State: AFTER operation"));
        assert!(doc.contains("resource \"aws_security_group_rule\" \"redshift_access_ingress_0\""));
        assert!(doc.contains("| `10.0.0.0/8` | 5439 | tcp | ADDED | sgr-00000001 |"));
        assert!(doc.contains(
            "aws ec2 revoke-security-group-ingress --group-id sg-abc123 --security-group-rule-ids sgr-00000001"
        ));
        assert_eq!(doc.matches("aws ec2 ").count(), 1);
    }

    #[test]
    fn test_no_backup_without_snapshot() {
        let req = request(RuleAction::Add);
        let outcome = OperationOutcome::fatal("sg-abc123", "security group not found");
        assert!(render_backup("INC1", &req, &outcome, ts()).is_none());
    }

    #[test]
    fn test_write_backup() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(RuleAction::Add);
        let path = write_backup(dir.path(), "INC0010040", &req, &added_outcome(&req), ts())
            .unwrap()
            .unwrap();
        assert!(path.ends_with("sg-sg-abc123_INC0010040_20260108_165000.md"));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Rollback Instructions"));
    }
}
