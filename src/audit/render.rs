//! Ticket annotation rendering.
//!
//! The output is an external contract: the marker tokens it carries are what
//! the idempotency guard and downstream reporting match on. Rendering is pure;
//! the same record always renders the same text.

use crate::model::{
    BackupSnapshot, Disposition, ItemAction, ItemResult, OperationFamily, OperationOutcome,
    ParseFailure, ParsedRequest, Protocol, RequestParameters, ProcessingRecord,
};

/// Delimiter line opening and closing every annotation.
pub const DELIMITER: &str = "═══════════════════════════════════════════";

/// Timestamp format used in annotations.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Render `record` as a work-note block.
///
/// Only fields that apply to the record's family are written. The backup
/// location and raw pattern matches stay in the history store.
pub fn render(record: &ProcessingRecord) -> String {
    let mut lines: Vec<String> = vec![
        DELIMITER.to_string(),
        format!("Remediation Record: {}", record.family.display_name()),
        DELIMITER.to_string(),
        String::new(),
        format!("Incident: {}", record.incident_number),
        format!("Result: {}", result_label(&record.disposition)),
        String::new(),
    ];

    match &record.disposition {
        Disposition::Unclassified => render_unclassified(&mut lines),
        Disposition::ParseFailed { failure } => render_parse_failure(&mut lines, failure),
        Disposition::Executed { outcome } => {
            render_outcome(&mut lines, record.request.as_ref(), outcome)
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Timestamp: {}",
        record.timestamp.format(TIMESTAMP_FORMAT)
    ));
    lines.push(format!("Run: {}", record.run_id));
    lines.extend(record.marker_tokens.iter().cloned());
    lines.push(DELIMITER.to_string());

    lines.join("\n")
}

fn result_label(disposition: &Disposition) -> &'static str {
    match disposition {
        Disposition::Unclassified => "UNCLASSIFIED",
        Disposition::ParseFailed { .. } => "MISSING REQUIRED FIELDS",
        Disposition::Executed { outcome } => {
            let counts = outcome.counts();
            if outcome.success {
                "SUCCESS"
            } else if counts.succeeded() + counts.skipped > 0 {
                "PARTIAL FAILURE"
            } else {
                "FAILED"
            }
        }
    }
}

fn render_unclassified(lines: &mut Vec<String>) {
    lines.push("Could not determine the operation type from the incident description.".to_string());
    lines.push("No changes were made. Route the ticket manually.".to_string());
}

fn render_parse_failure(lines: &mut Vec<String>, failure: &ParseFailure) {
    lines.push(format!(
        "Recognised as: {}",
        failure.family.display_name()
    ));
    lines.push("Missing required fields:".to_string());
    for field in &failure.missing_fields {
        lines.push(format!("  - {}", field));
    }
    lines.push("No changes were made. Complete the request manually or raise a new ticket with the missing fields.".to_string());
}

fn render_outcome(
    lines: &mut Vec<String>,
    request: Option<&ParsedRequest>,
    outcome: &OperationOutcome,
) {
    let counts = outcome.counts();
    lines.push(format!("Total Items Processed: {}", counts.total()));
    lines.push(format!("  ✓ Success: {}", counts.succeeded()));
    lines.push(format!("  ⊘ Skipped (already exists): {}", counts.skipped));
    lines.push(format!("  ✗ Failed: {}", counts.failed));
    lines.push(String::new());

    for item in &outcome.items {
        lines.push(item_line(request, item));
        if let Some(id) = &item.external_id {
            lines.push(format!("    {}: {}", external_id_label(request, item.action), id));
        }
    }

    lines.push(String::new());
    lines.push(format!("Summary: {}", outcome.summary));

    if let Some(request) = request {
        lines.push(String::new());
        match &request.parameters {
            RequestParameters::NetworkRule(params) => {
                let group_name = match &outcome.backup {
                    Some(BackupSnapshot::SecurityGroupRules { group, .. }) => {
                        group.group_name.as_str()
                    }
                    _ => "N/A",
                };
                lines.push(format!("Security Group: {} ({})", request.target, group_name));
                lines.push(format!("Region: {}", params.region));
                lines.push(format!("Direction: {}", params.direction.as_str()));
                lines.push(format!("Protocol: {}", protocol_label(params.protocol)));
                lines.push(format!("Port: {}", port_label(params.protocol, params.port)));
                lines.push(format!("Description: {}", params.description));
                if let Some(cluster) = &params.cluster {
                    lines.push(format!("Cluster: {}", cluster));
                }
            }
            RequestParameters::DatabaseUser(params) => {
                lines.push(format!("User: {}", request.target));
                lines.push(format!("Cluster: {}", params.cluster_identifier()));
            }
        }
    }

    for note in &outcome.notes {
        lines.push(format!("Note: {}", note));
    }
}

fn item_line(request: Option<&ParsedRequest>, item: &ItemResult) -> String {
    let target = match request.and_then(|r| r.network_rule()) {
        Some(params) if !matches!(params.protocol, Protocol::All | Protocol::Icmp) => {
            format!("{}:{}", item.target, params.port)
        }
        _ => item.target.clone(),
    };
    format!("{} {} - {}", item.action.symbol(), target, item.detail)
}

fn external_id_label(request: Option<&ParsedRequest>, action: ItemAction) -> &'static str {
    let family = request
        .map(|r| r.family())
        .unwrap_or(OperationFamily::Unknown);
    match (family, action) {
        (OperationFamily::NetworkRuleChange, ItemAction::SkippedDuplicate) => "Existing Rule ID",
        (OperationFamily::NetworkRuleChange, _) => "Rule ID",
        (OperationFamily::DatabaseUserLifecycle, _) => "Statement ID",
        (OperationFamily::Unknown, _) => "Reference",
    }
}

fn protocol_label(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::All => "all",
        other => other.wire(),
    }
}

fn port_label(protocol: Protocol, port: u16) -> String {
    match protocol {
        Protocol::All | Protocol::Icmp => "all".to_string(),
        _ => port.to_string(),
    }
}
