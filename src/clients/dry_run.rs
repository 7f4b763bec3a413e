//! Dry-run wrappers.
//!
//! Reads pass through to the wrapped client. Every mutation is replaced by a
//! log line and a synthetic success, so a full pass can be rehearsed against
//! live systems without changing them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::clients::traits::{DatabaseUserClient, NetworkRuleClient, TicketSource};
use crate::error::{CloudError, TransportError};
use crate::logging::structured::LogContext;
use crate::model::{DatabaseUser, Incident, RuleSpec, SecurityGroup, SecurityGroupRule};

/// Id reported for synthetic mutations.
pub const DRY_RUN_ID: &str = "dry-run";

pub struct DryRunTicketSource {
    inner: Arc<dyn TicketSource>,
    ctx: LogContext,
}

impl DryRunTicketSource {
    pub fn new(inner: Arc<dyn TicketSource>, ctx: LogContext) -> Self {
        Self { inner, ctx }
    }
}

impl TicketSource for DryRunTicketSource {
    fn get_incident(&self, number: &str) -> Result<Incident, TransportError> {
        self.inner.get_incident(number)
    }

    fn list_incidents(
        &self,
        from_date: NaiveDate,
        work_group: Option<&str>,
    ) -> Result<Vec<Incident>, TransportError> {
        self.inner.list_incidents(from_date, work_group)
    }

    fn append_annotation(&self, number: &str, text: &str) -> Result<(), TransportError> {
        log::info!(
            "{} DRY_RUN_ANNOTATION incident={} bytes={}\n{}",
            self.ctx.with_incident(number),
            number,
            text.len(),
            text
        );
        Ok(())
    }
}

pub struct DryRunDatabase {
    inner: Arc<dyn DatabaseUserClient>,
    ctx: LogContext,
    created: Mutex<HashSet<(String, String)>>,
}

impl DryRunDatabase {
    pub fn new(inner: Arc<dyn DatabaseUserClient>, ctx: LogContext) -> Self {
        Self {
            inner,
            ctx,
            created: Mutex::new(HashSet::new()),
        }
    }
}

impl DatabaseUserClient for DryRunDatabase {
    fn user_exists(&self, cluster: &str, name: &str) -> Result<bool, CloudError> {
        self.inner.user_exists(cluster, name)
    }

    fn create_user(&self, cluster: &str, name: &str) -> Result<String, CloudError> {
        log::info!(
            "{} DRY_RUN_CREATE_USER cluster={} user={}",
            self.ctx,
            cluster,
            name
        );
        self.created
            .lock()
            .insert((cluster.to_string(), name.to_string()));
        Ok(DRY_RUN_ID.to_string())
    }

    /// Users "created" in this run read back as plain users.
    fn describe_user(&self, cluster: &str, name: &str) -> Result<Option<DatabaseUser>, CloudError> {
        let key = (cluster.to_string(), name.to_string());
        if self.created.lock().contains(&key) {
            return Ok(Some(DatabaseUser {
                name: name.to_string(),
                can_create_db: false,
                superuser: false,
            }));
        }
        self.inner.describe_user(cluster, name)
    }
}

pub struct DryRunNetwork {
    inner: Arc<dyn NetworkRuleClient>,
    ctx: LogContext,
}

impl DryRunNetwork {
    pub fn new(inner: Arc<dyn NetworkRuleClient>, ctx: LogContext) -> Self {
        Self { inner, ctx }
    }
}

impl NetworkRuleClient for DryRunNetwork {
    fn describe_security_group(
        &self,
        region: &str,
        group_id: &str,
    ) -> Result<Option<SecurityGroup>, CloudError> {
        self.inner.describe_security_group(region, group_id)
    }

    fn cluster_security_groups(&self, region: &str, cluster: &str) -> Result<Vec<String>, CloudError> {
        self.inner.cluster_security_groups(region, cluster)
    }

    fn list_rules(&self, region: &str, group_id: &str) -> Result<Vec<SecurityGroupRule>, CloudError> {
        self.inner.list_rules(region, group_id)
    }

    fn authorize(
        &self,
        region: &str,
        group_id: &str,
        rule: &RuleSpec,
    ) -> Result<Option<String>, CloudError> {
        log::info!(
            "{} DRY_RUN_AUTHORIZE region={} group={} direction={} cidr={} port={} protocol={}",
            self.ctx,
            region,
            group_id,
            rule.direction.as_str(),
            rule.cidr,
            rule.port,
            rule.protocol.wire()
        );
        Ok(Some(DRY_RUN_ID.to_string()))
    }

    fn revoke(&self, region: &str, rule: &SecurityGroupRule) -> Result<(), CloudError> {
        log::info!(
            "{} DRY_RUN_REVOKE region={} group={} rule={}",
            self.ctx,
            region,
            rule.group_id,
            rule.rule_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::{MemoryDatabase, MemoryNetwork, MemoryTicketSource};
    use crate::model::{Direction, Protocol};

    fn ctx() -> LogContext {
        LogContext::new("run-test")
    }

    #[test]
    fn test_annotation_is_not_written() {
        let source = MemoryTicketSource::with_incidents(vec![Incident {
            number: "INC1".to_string(),
            ..Default::default()
        }]);
        let dry = DryRunTicketSource::new(Arc::new(source), ctx());
        dry.append_annotation("INC1", "note").unwrap();
        assert!(dry.get_incident("INC1").unwrap().work_notes.is_empty());
    }

    #[test]
    fn test_user_creation_is_simulated() {
        let dry = DryRunDatabase::new(Arc::new(MemoryDatabase::new().with_cluster("c1")), ctx());
        assert_eq!(dry.create_user("c1", "user7").unwrap(), DRY_RUN_ID);
        assert!(!dry.user_exists("c1", "user7").unwrap());
        assert!(dry.describe_user("c1", "user7").unwrap().is_some());
    }

    #[test]
    fn test_rule_changes_are_simulated() {
        let net = MemoryNetwork::new().with_group("sg-abc123", "sg");
        let dry = DryRunNetwork::new(Arc::new(net), ctx());
        let spec = RuleSpec {
            cidr: "10.0.0.0/8".to_string(),
            port: 22,
            protocol: Protocol::Tcp,
            direction: Direction::Inbound,
            description: None,
        };
        dry.authorize("us-east-1", "sg-abc123", &spec).unwrap();
        assert!(dry.list_rules("us-east-1", "sg-abc123").unwrap().is_empty());
    }
}
