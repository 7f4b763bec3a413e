//! Type classifier.
//!
//! Maps incident text to an operation family with ordered rule sets. Pure
//! and deterministic; no I/O.

use crate::classification::rules::RULE_SETS;
use crate::model::OperationFamily;

/// The family a text classified to and the pattern that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub family: OperationFamily,
    pub pattern: Option<String>,
}

/// Text the rule sets are matched against.
fn classification_text(short_description: &str, description: &str) -> String {
    format!("{} {}", description, short_description).to_lowercase()
}

/// Classify with the deciding pattern, for diagnostics.
pub fn classify_explained(short_description: &str, description: &str) -> Classification {
    let text = classification_text(short_description, description);

    // RULE_SETS order is the tie-break between families (network rules
    // before database users); see `rules::RULE_SETS`.
    for rules in RULE_SETS.iter() {
        if let Some(pattern) = rules.first_match(&text) {
            return Classification {
                family: rules.family,
                pattern: Some(pattern.as_str().to_string()),
            };
        }
    }

    Classification {
        family: OperationFamily::Unknown,
        pattern: None,
    }
}

/// Classify an incident's text. `Unknown` when no family matches.
pub fn classify(short_description: &str, description: &str) -> OperationFamily {
    classify_explained(short_description, description).family
}
