//! Executor outcomes and the cloud resources they report on.

use serde::{Deserialize, Serialize};

use super::request::{Protocol, RuleSpec};

/// What happened to one sub-target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Added,
    Removed,
    SkippedDuplicate,
    Failed,
}

impl ItemAction {
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemAction::Failed)
    }

    /// Symbol used in ticket annotations.
    pub fn symbol(&self) -> &'static str {
        match self {
            ItemAction::Added => "✓",
            ItemAction::Removed => "✓",
            ItemAction::SkippedDuplicate => "⊘",
            ItemAction::Failed => "✗",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemAction::Added => "ADDED",
            ItemAction::Removed => "REMOVED",
            ItemAction::SkippedDuplicate => "SKIPPED (already present)",
            ItemAction::Failed => "FAILED",
        }
    }
}

/// Result for one sub-target (a CIDR, or the single user of a user request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub target: String,
    pub action: ItemAction,
    pub detail: String,
    pub external_id: Option<String>,
}

impl ItemResult {
    pub fn new(target: &str, action: ItemAction, detail: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            action,
            detail: detail.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, id: Option<String>) -> Self {
        self.external_id = id;
        self
    }
}

/// Per-action tallies over an outcome's items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub added: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn tally(items: &[ItemResult]) -> Self {
        let mut counts = OutcomeCounts::default();
        for item in items {
            match item.action {
                ItemAction::Added => counts.added += 1,
                ItemAction::Removed => counts.removed += 1,
                ItemAction::SkippedDuplicate => counts.skipped += 1,
                ItemAction::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn succeeded(&self) -> usize {
        self.added + self.removed
    }

    pub fn total(&self) -> usize {
        self.added + self.removed + self.skipped + self.failed
    }
}

/// Security group as described by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub vpc_id: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<String>,
}

/// One rule of a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub rule_id: String,
    pub group_id: String,
    pub is_egress: bool,
    /// Wire protocol (`tcp`, `udp`, `icmp`, `-1`).
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub cidr: Option<String>,
    pub description: Option<String>,
}

impl SecurityGroupRule {
    /// Same CIDR, port, protocol and direction as `spec`. All-protocol and
    /// ICMP rules carry no port, so only the other fields are compared.
    pub fn matches(&self, spec: &RuleSpec) -> bool {
        if self.cidr.as_deref() != Some(spec.cidr.as_str()) {
            return false;
        }
        if self.is_egress != spec.direction.is_egress() {
            return false;
        }
        if Protocol::from_wire(&self.protocol) != Some(spec.protocol) {
            return false;
        }
        if matches!(spec.protocol, Protocol::All | Protocol::Icmp) {
            return true;
        }
        let port = i32::from(spec.port);
        self.from_port == Some(port) && self.to_port == Some(port)
    }
}

/// Database user as read back from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseUser {
    pub name: String,
    pub can_create_db: bool,
    pub superuser: bool,
}

/// Before/after state captured for rollback documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackupSnapshot {
    SecurityGroupRules {
        group: SecurityGroup,
        before: Vec<SecurityGroupRule>,
        after: Vec<SecurityGroupRule>,
    },
    DatabaseUser {
        cluster: String,
        before: Option<DatabaseUser>,
        after: Option<DatabaseUser>,
    },
}

/// Result of one executor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// True iff no item failed.
    pub success: bool,
    pub items: Vec<ItemResult>,
    pub summary: String,
    pub backup: Option<BackupSnapshot>,
    /// Non-blocking observations (e.g. a cluster association mismatch).
    pub notes: Vec<String>,
}

impl OperationOutcome {
    pub fn new(items: Vec<ItemResult>, summary: impl Into<String>) -> Self {
        let success = items.iter().all(|i| !i.action.is_failure());
        Self {
            success,
            items,
            summary: summary.into(),
            backup: None,
            notes: Vec::new(),
        }
    }

    /// A single failed item for a precondition or transport failure that
    /// stopped the executor before any mutation.
    pub fn fatal(target: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            vec![ItemResult::new(target, ItemAction::Failed, detail.clone())],
            detail,
        )
    }

    pub fn with_backup(mut self, backup: BackupSnapshot) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.items)
    }
}
