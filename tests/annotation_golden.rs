//! Golden annotation text.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use ticket_remediator::audit::{render, DELIMITER};
use ticket_remediator::model::{
    BackupSnapshot, DatabaseUserParams, Direction, Disposition, ItemAction, ItemResult,
    NetworkRuleParams, OperationFamily, OperationOutcome, ParseFailure, ParsedRequest,
    ProcessingRecord, Protocol, RequestParameters, RuleAction, SecurityGroup,
};

fn network_record() -> ProcessingRecord {
    let request = ParsedRequest {
        target: "sg-abc123".to_string(),
        parameters: RequestParameters::NetworkRule(NetworkRuleParams {
            region: "us-east-1".to_string(),
            direction: Direction::Inbound,
            action: RuleAction::Add,
            port: 5439,
            protocol: Protocol::Tcp,
            description: "Ticket Remediation Automation".to_string(),
            cidrs: vec!["10.0.0.0/8".to_string(), "11.0.0.0/8".to_string()],
            cluster: None,
            service_hint: None,
        }),
        raw_matches: Vec::new(),
    };
    let outcome = OperationOutcome::new(
        vec![
            ItemResult::new("10.0.0.0/8", ItemAction::Added, "inbound rule added")
                .with_external_id(Some("sgr-00000001".to_string())),
            ItemResult::new("11.0.0.0/8", ItemAction::SkippedDuplicate, "inbound rule already present")
                .with_external_id(Some("sgr-00000002".to_string())),
        ],
        "1 of 2 inbound rules added on sg-abc123; 1 skipped, 0 failed",
    )
    .with_backup(BackupSnapshot::SecurityGroupRules {
        group: SecurityGroup {
            group_id: "sg-abc123".to_string(),
            group_name: "redshift-access".to_string(),
            ..Default::default()
        },
        before: Vec::new(),
        after: Vec::new(),
    });
    let mut record = ProcessingRecord::new(
        "INC0010040",
        "Security group change",
        OperationFamily::NetworkRuleChange,
        Utc.with_ymd_and_hms(2026, 1, 8, 16, 50, 0).unwrap(),
        "run-0a1b2c3d",
        Some(request),
        Disposition::Executed { outcome },
    );
    record.backup_location = Some("backups/sg-sg-abc123_INC0010040_20260108_165000.md".to_string());
    record
}

#[test]
fn test_network_rule_annotation() {
    let expected = [
        DELIMITER,
        "Remediation Record: Network rule change",
        DELIMITER,
        "",
        "Incident: INC0010040",
        "Result: SUCCESS",
        "",
        "Total Items Processed: 2",
        "  ✓ Success: 1",
        "  ⊘ Skipped (already exists): 1",
        "  ✗ Failed: 0",
        "",
        "✓ 10.0.0.0/8:5439 - inbound rule added",
        "    Rule ID: sgr-00000001",
        "⊘ 11.0.0.0/8:5439 - inbound rule already present",
        "    Existing Rule ID: sgr-00000002",
        "",
        "Summary: 1 of 2 inbound rules added on sg-abc123; 1 skipped, 0 failed",
        "",
        "Security Group: sg-abc123 (redshift-access)",
        "Region: us-east-1",
        "Direction: inbound",
        "Protocol: tcp",
        "Port: 5439",
        "Description: Ticket Remediation Automation",
        "",
        "Timestamp: 2026-01-08 16:50:00 UTC",
        "Run: run-0a1b2c3d",
        "[RMD-NETRULE-PROCESSED]",
        DELIMITER,
    ]
    .join("\n");

    let record = network_record();
    assert_eq!(render(&record), expected);
    assert_eq!(render(&record), render(&record.clone()));
}

#[test]
fn test_parse_failure_annotation() {
    let record = ProcessingRecord::new(
        "INC0010023",
        "Redshift user request",
        OperationFamily::DatabaseUserLifecycle,
        Utc.with_ymd_and_hms(2026, 1, 9, 8, 0, 5).unwrap(),
        "run-0a1b2c3d",
        None,
        Disposition::ParseFailed {
            failure: ParseFailure {
                family: OperationFamily::DatabaseUserLifecycle,
                missing_fields: vec!["cluster".to_string()],
                raw_matches: Vec::new(),
            },
        },
    );

    let expected = [
        DELIMITER,
        "Remediation Record: Database user lifecycle",
        DELIMITER,
        "",
        "Incident: INC0010023",
        "Result: MISSING REQUIRED FIELDS",
        "",
        "Recognised as: Database user lifecycle",
        "Missing required fields:",
        "  - cluster",
        "No changes were made. Complete the request manually or raise a new ticket with the missing fields.",
        "",
        "Timestamp: 2026-01-09 08:00:05 UTC",
        "Run: run-0a1b2c3d",
        "[RMD-REVIEW-REQUIRED]",
        DELIMITER,
    ]
    .join("\n");

    assert_eq!(render(&record), expected);
}

#[test]
fn test_failed_user_annotation_carries_marker() {
    let request = ParsedRequest {
        target: "user7".to_string(),
        parameters: RequestParameters::DatabaseUser(DatabaseUserParams {
            cluster_ref: "1".to_string(),
        }),
        raw_matches: Vec::new(),
    };
    let record = ProcessingRecord::new(
        "INC0010024",
        "",
        OperationFamily::DatabaseUserLifecycle,
        Utc.with_ymd_and_hms(2026, 1, 9, 8, 0, 5).unwrap(),
        "run-0a1b2c3d",
        Some(request),
        Disposition::Executed {
            outcome: OperationOutcome::fatal("user7", "create failed: statement stmt-1 did not complete within the timeout"),
        },
    );

    let text = render(&record);
    assert!(text.contains("Result: FAILED"));
    assert!(text.contains("✗ user7 - create failed: statement stmt-1 did not complete within the timeout"));
    assert!(text.contains("User: user7"));
    assert!(text.contains("[RMD-DBUSER-PROCESSED]"));
}
