//! Property tests over the pure components.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use ticket_remediator::audit::render;
use ticket_remediator::classification::classify;
use ticket_remediator::extraction::parse_cidr_list;
use ticket_remediator::idempotency::find_completion_marker;
use ticket_remediator::model::{
    Disposition, ItemAction, ItemResult, OperationFamily, OperationOutcome, ProcessingRecord,
};

fn cidr() -> impl Strategy<Value = String> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>(), 0u8..=32)
        .prop_map(|(a, b, c, d, p)| format!("{}.{}.{}.{}/{}", a, b, c, d, p))
}

fn separator() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(", "), Just(","), Just(" "), Just("\n"), Just(",\n"), Just("  ")]
}

proptest! {
    #[test]
    fn classify_is_deterministic(short in ".{0,60}", description in ".{0,200}") {
        let first = classify(&short, &description);
        prop_assert_eq!(first, classify(&short, &description));
    }

    #[test]
    fn cidr_list_dedups_in_first_seen_order(
        entries in prop::collection::vec((cidr(), separator()), 1..12),
        repeat in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let mut values: Vec<String> = entries.iter().map(|(c, _)| c.clone()).collect();
        for index in &repeat {
            let pick = values[index.index(entries.len())].clone();
            values.push(pick);
        }

        let mut text = String::new();
        for (i, value) in values.iter().enumerate() {
            text.push_str(value);
            text.push_str(entries[i % entries.len()].1);
        }

        let mut expected: Vec<String> = Vec::new();
        for value in &values {
            if !expected.contains(value) {
                expected.push(value.clone());
            }
        }
        prop_assert_eq!(parse_cidr_list(&text), expected);
    }

    #[test]
    fn executed_annotation_always_marks_completion(
        prior in "[a-zA-Z0-9 .,\n]{0,200}",
        failed in any::<bool>(),
    ) {
        let action = if failed { ItemAction::Failed } else { ItemAction::Added };
        let family = if failed {
            OperationFamily::NetworkRuleChange
        } else {
            OperationFamily::DatabaseUserLifecycle
        };
        let record = ProcessingRecord::new(
            "INC1",
            "",
            family,
            Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap(),
            "run-1",
            None,
            Disposition::Executed {
                outcome: OperationOutcome::new(vec![ItemResult::new("t", action, "d")], "s"),
            },
        );
        let notes = format!("{}\n\n{}", prior, render(&record));
        prop_assert!(find_completion_marker(&notes).is_some());
    }
}
