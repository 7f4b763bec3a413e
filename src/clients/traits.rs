//! Collaborator interfaces.
//!
//! The engine talks to the ticket system and the cloud only through these
//! traits. Implementations are synchronous request/response; any async job
//! polling on the provider side stays inside the implementation.

use chrono::NaiveDate;

use crate::error::{CloudError, TransportError};
use crate::model::{DatabaseUser, Incident, RuleSpec, SecurityGroup, SecurityGroupRule};

/// Ticket system.
pub trait TicketSource: Send + Sync {
    /// Fetch one incident by its human-readable number.
    fn get_incident(&self, number: &str) -> Result<Incident, TransportError>;

    /// Incidents created on or after `from_date`, restricted to `work_group`
    /// when given, in source order.
    fn list_incidents(
        &self,
        from_date: NaiveDate,
        work_group: Option<&str>,
    ) -> Result<Vec<Incident>, TransportError>;

    /// Append a work note. Never replaces earlier notes.
    fn append_annotation(&self, number: &str, text: &str) -> Result<(), TransportError>;
}

/// Database users on a warehouse cluster.
pub trait DatabaseUserClient: Send + Sync {
    fn user_exists(&self, cluster: &str, name: &str) -> Result<bool, CloudError>;

    /// Create the user; returns the provider's statement id.
    fn create_user(&self, cluster: &str, name: &str) -> Result<String, CloudError>;

    fn describe_user(&self, cluster: &str, name: &str) -> Result<Option<DatabaseUser>, CloudError>;
}

/// Security groups and their rules.
pub trait NetworkRuleClient: Send + Sync {
    /// `None` when the group does not exist.
    fn describe_security_group(
        &self,
        region: &str,
        group_id: &str,
    ) -> Result<Option<SecurityGroup>, CloudError>;

    /// Ids of the security groups attached to a cluster.
    fn cluster_security_groups(&self, region: &str, cluster: &str) -> Result<Vec<String>, CloudError>;

    fn list_rules(&self, region: &str, group_id: &str) -> Result<Vec<SecurityGroupRule>, CloudError>;

    /// Add a rule; returns the new rule id when the provider reports one.
    fn authorize(
        &self,
        region: &str,
        group_id: &str,
        rule: &RuleSpec,
    ) -> Result<Option<String>, CloudError>;

    /// Remove an existing rule.
    fn revoke(&self, region: &str, rule: &SecurityGroupRule) -> Result<(), CloudError>;
}
