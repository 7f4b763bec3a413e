//! In-memory collaborators.
//!
//! Deterministic stand-ins for the ticket system and the cloud, used by the
//! test suites and by the `classify` dry path. State sits behind
//! `parking_lot` mutexes so the trait methods can take `&self`.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::clients::traits::{DatabaseUserClient, NetworkRuleClient, TicketSource};
use crate::error::{CloudError, TransportError};
use crate::model::{DatabaseUser, Incident, Protocol, RuleSpec, SecurityGroup, SecurityGroupRule};

/// Separator between appended work notes.
const NOTE_SEPARATOR: &str = "\n\n";

/// Ticket source backed by a vector, in insertion order.
#[derive(Default)]
pub struct MemoryTicketSource {
    incidents: Mutex<Vec<Incident>>,
    annotations: Mutex<Vec<(String, String)>>,
    failing_appends: Mutex<HashSet<String>>,
    failing_gets: Mutex<HashSet<String>>,
    list_calls: Mutex<usize>,
    ignore_filters: bool,
}

impl MemoryTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_incidents(incidents: Vec<Incident>) -> Self {
        Self {
            incidents: Mutex::new(incidents),
            ..Self::default()
        }
    }

    /// Return every incident from `list_incidents`, ignoring the date and
    /// work-group arguments.
    pub fn ignoring_filters(mut self) -> Self {
        self.ignore_filters = true;
        self
    }

    pub fn insert(&self, incident: Incident) {
        self.incidents.lock().push(incident);
    }

    pub fn incident(&self, number: &str) -> Option<Incident> {
        self.incidents
            .lock()
            .iter()
            .find(|i| i.number == number)
            .cloned()
    }

    /// Notes appended to `number`, oldest first.
    pub fn annotations_for(&self, number: &str) -> Vec<String> {
        self.annotations
            .lock()
            .iter()
            .filter(|(n, _)| n == number)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.lock().len()
    }

    pub fn fail_appends_for(&self, number: &str) {
        self.failing_appends.lock().insert(number.to_string());
    }

    pub fn restore_appends_for(&self, number: &str) {
        self.failing_appends.lock().remove(number);
    }

    pub fn fail_gets_for(&self, number: &str) {
        self.failing_gets.lock().insert(number.to_string());
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock()
    }
}

impl TicketSource for MemoryTicketSource {
    fn get_incident(&self, number: &str) -> Result<Incident, TransportError> {
        if self.failing_gets.lock().contains(number) {
            return Err(TransportError::Connection("connection reset by peer".to_string()));
        }
        self.incident(number)
            .ok_or_else(|| TransportError::NotFound(number.to_string()))
    }

    fn list_incidents(
        &self,
        from_date: NaiveDate,
        work_group: Option<&str>,
    ) -> Result<Vec<Incident>, TransportError> {
        *self.list_calls.lock() += 1;
        let incidents = self.incidents.lock();
        if self.ignore_filters {
            return Ok(incidents.clone());
        }
        Ok(incidents
            .iter()
            .filter(|i| i.created_on_or_after(from_date) && i.in_work_group(work_group))
            .cloned()
            .collect())
    }

    fn append_annotation(&self, number: &str, text: &str) -> Result<(), TransportError> {
        if self.failing_appends.lock().contains(number) {
            return Err(TransportError::Http {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        let mut incidents = self.incidents.lock();
        let incident = incidents
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| TransportError::NotFound(number.to_string()))?;

        if !incident.work_notes.is_empty() {
            incident.work_notes.push_str(NOTE_SEPARATOR);
        }
        incident.work_notes.push_str(text);

        self.annotations
            .lock()
            .push((number.to_string(), text.to_string()));
        Ok(())
    }
}

/// Database clusters and their users.
#[derive(Default)]
pub struct MemoryDatabase {
    clusters: Mutex<HashMap<String, Vec<DatabaseUser>>>,
    failing_creates: Mutex<HashMap<String, CloudError>>,
    invisible_after_create: Mutex<HashSet<String>>,
    create_calls: Mutex<usize>,
    next_statement: Mutex<u64>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(self, cluster: &str) -> Self {
        self.clusters.lock().entry(cluster.to_string()).or_default();
        self
    }

    pub fn add_user(&self, cluster: &str, name: &str) {
        self.clusters
            .lock()
            .entry(cluster.to_string())
            .or_default()
            .push(DatabaseUser {
                name: name.to_string(),
                can_create_db: false,
                superuser: false,
            });
    }

    pub fn user_names(&self, cluster: &str) -> Vec<String> {
        self.clusters
            .lock()
            .get(cluster)
            .map(|users| users.iter().map(|u| u.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Make `create_user` for `name` fail with `error`.
    pub fn fail_create_for(&self, name: &str, error: CloudError) {
        self.failing_creates.lock().insert(name.to_string(), error);
    }

    /// Accept `create_user` for `name` but never make the user visible.
    pub fn hide_after_create(&self, name: &str) {
        self.invisible_after_create.lock().insert(name.to_string());
    }

    pub fn create_calls(&self) -> usize {
        *self.create_calls.lock()
    }

    fn cluster_missing(cluster: &str) -> CloudError {
        CloudError::NotFound(format!("cluster {}", cluster))
    }
}

impl DatabaseUserClient for MemoryDatabase {
    fn user_exists(&self, cluster: &str, name: &str) -> Result<bool, CloudError> {
        let clusters = self.clusters.lock();
        let users = clusters
            .get(cluster)
            .ok_or_else(|| Self::cluster_missing(cluster))?;
        Ok(users.iter().any(|u| u.name == name))
    }

    fn create_user(&self, cluster: &str, name: &str) -> Result<String, CloudError> {
        *self.create_calls.lock() += 1;

        if let Some(error) = self.failing_creates.lock().get(name) {
            return Err(error.clone());
        }

        let mut next = self.next_statement.lock();
        *next += 1;
        let statement_id = format!("stmt-{:04}", *next);

        let mut clusters = self.clusters.lock();
        let users = clusters
            .get_mut(cluster)
            .ok_or_else(|| Self::cluster_missing(cluster))?;
        if users.iter().any(|u| u.name == name) {
            return Err(CloudError::StatementFailed {
                statement_id,
                status: "FAILED".to_string(),
                reason: format!("ERROR: user \"{}\" already exists", name),
            });
        }
        if !self.invisible_after_create.lock().contains(name) {
            users.push(DatabaseUser {
                name: name.to_string(),
                can_create_db: false,
                superuser: false,
            });
        }
        Ok(statement_id)
    }

    fn describe_user(&self, cluster: &str, name: &str) -> Result<Option<DatabaseUser>, CloudError> {
        let clusters = self.clusters.lock();
        let users = clusters
            .get(cluster)
            .ok_or_else(|| Self::cluster_missing(cluster))?;
        Ok(users.iter().find(|u| u.name == name).cloned())
    }
}

/// Security groups, rules and cluster attachments. Regions are ignored.
#[derive(Default)]
pub struct MemoryNetwork {
    groups: Mutex<HashMap<String, SecurityGroup>>,
    rules: Mutex<Vec<SecurityGroupRule>>,
    clusters: Mutex<HashMap<String, Vec<String>>>,
    failing_cidrs: Mutex<HashSet<String>>,
    mutation_calls: Mutex<usize>,
    next_rule: Mutex<u64>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, group_id: &str, group_name: &str) -> Self {
        self.groups.lock().insert(
            group_id.to_string(),
            SecurityGroup {
                group_id: group_id.to_string(),
                group_name: group_name.to_string(),
                vpc_id: Some("vpc-0example".to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn attach_cluster(&self, cluster: &str, group_id: &str) {
        self.clusters
            .lock()
            .entry(cluster.to_string())
            .or_default()
            .push(group_id.to_string());
    }

    /// Seed an existing rule.
    pub fn add_rule(&self, group_id: &str, spec: &RuleSpec) -> String {
        let rule_id = self.next_rule_id();
        self.rules.lock().push(rule_from_spec(group_id, &rule_id, spec));
        rule_id
    }

    /// Make every mutation touching `cidr` fail.
    pub fn fail_cidr(&self, cidr: &str) {
        self.failing_cidrs.lock().insert(cidr.to_string());
    }

    pub fn rules_for(&self, group_id: &str) -> Vec<SecurityGroupRule> {
        self.rules
            .lock()
            .iter()
            .filter(|r| r.group_id == group_id)
            .cloned()
            .collect()
    }

    /// Authorize and revoke calls made so far.
    pub fn mutation_calls(&self) -> usize {
        *self.mutation_calls.lock()
    }

    fn next_rule_id(&self) -> String {
        let mut next = self.next_rule.lock();
        *next += 1;
        format!("sgr-{:08x}", *next)
    }

    fn check_cidr(&self, operation: &str, cidr: &str) -> Result<(), CloudError> {
        if self.failing_cidrs.lock().contains(cidr) {
            return Err(CloudError::CommandFailed {
                command: format!("aws ec2 {}", operation),
                stderr: format!(
                    "An error occurred (UnauthorizedOperation) when calling the {} operation for {}",
                    operation, cidr
                ),
            });
        }
        Ok(())
    }
}

/// The rule a provider would report for `spec`.
pub fn rule_from_spec(group_id: &str, rule_id: &str, spec: &RuleSpec) -> SecurityGroupRule {
    let (from_port, to_port) = match spec.protocol {
        Protocol::All => (None, None),
        Protocol::Icmp => (Some(-1), Some(-1)),
        Protocol::Tcp | Protocol::Udp => (Some(i32::from(spec.port)), Some(i32::from(spec.port))),
    };
    SecurityGroupRule {
        rule_id: rule_id.to_string(),
        group_id: group_id.to_string(),
        is_egress: spec.direction.is_egress(),
        protocol: spec.protocol.wire().to_string(),
        from_port,
        to_port,
        cidr: Some(spec.cidr.clone()),
        description: spec.description.clone(),
    }
}

impl NetworkRuleClient for MemoryNetwork {
    fn describe_security_group(
        &self,
        _region: &str,
        group_id: &str,
    ) -> Result<Option<SecurityGroup>, CloudError> {
        Ok(self.groups.lock().get(group_id).cloned())
    }

    fn cluster_security_groups(&self, _region: &str, cluster: &str) -> Result<Vec<String>, CloudError> {
        self.clusters
            .lock()
            .get(cluster)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("cluster {}", cluster)))
    }

    fn list_rules(&self, _region: &str, group_id: &str) -> Result<Vec<SecurityGroupRule>, CloudError> {
        Ok(self.rules_for(group_id))
    }

    fn authorize(
        &self,
        _region: &str,
        group_id: &str,
        rule: &RuleSpec,
    ) -> Result<Option<String>, CloudError> {
        *self.mutation_calls.lock() += 1;
        let operation = if rule.direction.is_egress() {
            "authorize-security-group-egress"
        } else {
            "authorize-security-group-ingress"
        };
        if !self.groups.lock().contains_key(group_id) {
            return Err(CloudError::NotFound(format!("security group {}", group_id)));
        }
        self.check_cidr(operation, &rule.cidr)?;
        if self.rules_for(group_id).iter().any(|r| r.matches(rule)) {
            return Err(CloudError::CommandFailed {
                command: format!("aws ec2 {}", operation),
                stderr: "An error occurred (InvalidPermission.Duplicate): the specified rule already exists"
                    .to_string(),
            });
        }
        Ok(Some(self.add_rule(group_id, rule)))
    }

    fn revoke(&self, _region: &str, rule: &SecurityGroupRule) -> Result<(), CloudError> {
        *self.mutation_calls.lock() += 1;
        let operation = if rule.is_egress {
            "revoke-security-group-egress"
        } else {
            "revoke-security-group-ingress"
        };
        if let Some(cidr) = &rule.cidr {
            self.check_cidr(operation, cidr)?;
        }
        let mut rules = self.rules.lock();
        let before = rules.len();
        rules.retain(|r| r.rule_id != rule.rule_id);
        if rules.len() == before {
            return Err(CloudError::NotFound(format!("rule {}", rule.rule_id)));
        }
        Ok(())
    }
}
