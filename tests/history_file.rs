//! JSON-lines history and backup documents on disk.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use ticket_remediator::audit::{HistoryFilter, HistoryStore, JsonlHistory};
use ticket_remediator::clients::{MemoryDatabase, MemoryNetwork, MemoryTicketSource};
use ticket_remediator::executors::ExecutorRegistry;
use ticket_remediator::model::{Disposition, Incident, OperationFamily, ProcessingRecord};
use ticket_remediator::pipeline::{IncidentProcessor, RunContext};

fn unclassified(number: &str) -> ProcessingRecord {
    ProcessingRecord::new(
        number,
        "printer",
        OperationFamily::Unknown,
        Utc.with_ymd_and_hms(2026, 1, 8, 9, 0, 0).unwrap(),
        "run-1",
        None,
        Disposition::Unclassified,
    )
}

#[test]
fn test_jsonl_history_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history.jsonl");

    let store = JsonlHistory::new(&path);
    store.append(&unclassified("INC1")).unwrap();
    store.append(&unclassified("INC2")).unwrap();

    let reopened = JsonlHistory::new(&path);
    let records = reopened.list(&HistoryFilter::default()).unwrap();
    let numbers: Vec<&str> = records.iter().map(|r| r.incident_number.as_str()).collect();
    assert_eq!(numbers, vec!["INC2", "INC1"]);
    assert_eq!(records[1], unclassified("INC1"));
}

#[test]
fn test_malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");
    let store = JsonlHistory::new(&path);
    store.append(&unclassified("INC1")).unwrap();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(file, "{{not json").unwrap();
    writeln!(file).unwrap();
    drop(file);
    store.append(&unclassified("INC2")).unwrap();

    let records = store
        .list(&HistoryFilter {
            limit: Some(5),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_processor_writes_backup_outside_annotation() {
    let dir = tempfile::tempdir().unwrap();
    let tickets = Arc::new(MemoryTicketSource::with_incidents(vec![Incident {
        id: "sys-1".to_string(),
        number: "INC0010040".to_string(),
        short_description: "Security group change".to_string(),
        description: "Add an inbound rule: security group id: sg-abc123, cidr range to be added: 10.0.0.0/8, port: 5439"
            .to_string(),
        assignment_group: "WG101".to_string(),
        ..Default::default()
    }]));
    let history = Arc::new(JsonlHistory::new(dir.path().join("history.jsonl")));
    let processor = IncidentProcessor::new(
        tickets.clone(),
        ExecutorRegistry::new(
            Arc::new(MemoryDatabase::new()),
            Arc::new(MemoryNetwork::new().with_group("sg-abc123", "redshift-access")),
        ),
        history.clone(),
    )
    .with_backup_dir(dir.path().join("backups"));

    let report = processor
        .process_number("INC0010040", &RunContext::with_id("run-bkp00001"))
        .unwrap();
    let record = report.record.unwrap();

    let location = record.backup_location.clone().unwrap();
    let backup = std::fs::read_to_string(&location).unwrap();
    assert!(backup.contains("# Security Group Backup - sg-abc123"));
    assert!(backup.contains("aws ec2 revoke-security-group-ingress --group-id sg-abc123"));

    let annotation = &tickets.annotations_for("INC0010040")[0];
    assert!(!annotation.contains(&location));
    assert!(!annotation.contains("backups"));

    let stored = history.list(&HistoryFilter::default()).unwrap();
    assert_eq!(stored[0].backup_location, Some(location));
}
