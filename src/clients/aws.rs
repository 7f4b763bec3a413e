//! AWS CLI adapter.
//!
//! Every call shells out to the `aws` executable with JSON output and the
//! pager disabled, then parses stdout. Identifiers are validated before they
//! become arguments or SQL. Redshift Data API statements are asynchronous on
//! the provider side; this adapter submits, polls and collects them so that
//! callers see one blocking call.

use std::ops::{Deref, DerefMut};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::clients::traits::{DatabaseUserClient, NetworkRuleClient};
use crate::config::AwsConfig;
use crate::error::CloudError;
use crate::model::{DatabaseUser, Protocol, RuleSpec, SecurityGroup, SecurityGroupRule};
use crate::security::identifiers::{
    sql_identifier, validate_cidr, validate_cluster_identifier, validate_region,
    validate_security_group_id,
};
use crate::security::redaction::redact_secrets;

/// Interval between `describe-statement` polls.
pub const STATEMENT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A [`Command`] preconfigured for non-interactive JSON output.
///
/// Derefs to [`Command`]; `label` is the redacted `aws <service> <op>` form
/// used in errors and logs.
pub struct AwsCommand {
    inner: Command,
    label: String,
}

impl Deref for AwsCommand {
    type Target = Command;

    fn deref(&self) -> &Command {
        &self.inner
    }
}

impl DerefMut for AwsCommand {
    fn deref_mut(&mut self) -> &mut Command {
        &mut self.inner
    }
}

impl AwsCommand {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run and parse stdout as JSON. Empty stdout is `Value::Null`.
    pub fn run_json(mut self) -> Result<Value, CloudError> {
        let output = self.inner.output().map_err(|e| CloudError::Spawn {
            command: self.label.clone(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CloudError::CommandFailed {
                command: self.label,
                stderr: redact_secrets(stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout).map_err(|e| CloudError::Decode {
            command: self.label,
            reason: e.to_string(),
        })
    }
}

/// Build `aws <service> <operation>` for `region`.
pub fn aws_command(config: &AwsConfig, region: &str, service: &str, operation: &str) -> AwsCommand {
    let mut cmd = Command::new(&config.cli);
    cmd.args([service, operation])
        .args(["--region", region])
        .args(["--output", "json", "--no-cli-pager"])
        .env("AWS_PAGER", "");
    if let Some(profile) = &config.profile {
        cmd.args(["--profile", profile.as_str()]);
    }
    AwsCommand {
        inner: cmd,
        label: format!("aws {} {}", service, operation),
    }
}

fn decode_error(command: &str, reason: &str) -> CloudError {
    CloudError::Decode {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn port_field(value: &Value, key: &str) -> Option<i32> {
    value
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|p| i32::try_from(p).ok())
}

/// First group of a `describe-security-groups` response.
pub fn parse_security_group(response: &Value) -> Option<SecurityGroup> {
    let group = response.get("SecurityGroups")?.as_array()?.first()?;
    Some(SecurityGroup {
        group_id: str_field(group, "GroupId")?,
        group_name: str_field(group, "GroupName").unwrap_or_default(),
        vpc_id: str_field(group, "VpcId"),
        description: str_field(group, "Description"),
        owner_id: str_field(group, "OwnerId"),
    })
}

/// IPv4 rules of a `describe-security-group-rules` response. Rules that
/// reference prefix lists or other groups carry no CIDR and are kept with
/// `cidr: None`.
pub fn parse_rules(response: &Value) -> Vec<SecurityGroupRule> {
    response
        .get("SecurityGroupRules")
        .and_then(|r| r.as_array())
        .map(|rules| {
            rules
                .iter()
                .filter_map(|rule| {
                    Some(SecurityGroupRule {
                        rule_id: str_field(rule, "SecurityGroupRuleId")?,
                        group_id: str_field(rule, "GroupId").unwrap_or_default(),
                        is_egress: rule.get("IsEgress").and_then(|v| v.as_bool()).unwrap_or(false),
                        protocol: str_field(rule, "IpProtocol").unwrap_or_else(|| "-1".to_string()),
                        from_port: port_field(rule, "FromPort"),
                        to_port: port_field(rule, "ToPort"),
                        cidr: str_field(rule, "CidrIpv4"),
                        description: str_field(rule, "Description"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `--ip-permissions` document for one rule.
pub fn ip_permissions(rule: &RuleSpec) -> Value {
    let mut range = json!({ "CidrIp": rule.cidr });
    if let Some(description) = &rule.description {
        range["Description"] = json!(description);
    }
    let mut permission = json!({
        "IpProtocol": rule.protocol.wire(),
        "IpRanges": [range],
    });
    match rule.protocol {
        Protocol::All => {}
        Protocol::Icmp => {
            permission["FromPort"] = json!(-1);
            permission["ToPort"] = json!(-1);
        }
        Protocol::Tcp | Protocol::Udp => {
            permission["FromPort"] = json!(rule.port);
            permission["ToPort"] = json!(rule.port);
        }
    }
    json!([permission])
}

/// Column value of a Data API record field.
fn field_string(field: &Value) -> Option<String> {
    field.get("stringValue").and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn field_bool(field: &Value) -> bool {
    field
        .get("booleanValue")
        .and_then(|v| v.as_bool())
        .or_else(|| field_string(field).map(|s| s == "t" || s == "true"))
        .unwrap_or(false)
}

/// Rows of `SELECT usename, usecreatedb, usesuper ...`.
pub fn parse_user_records(response: &Value) -> Vec<DatabaseUser> {
    response
        .get("Records")
        .and_then(|r| r.as_array())
        .map(|records| {
            records
                .iter()
                .filter_map(|row| {
                    let row = row.as_array()?;
                    Some(DatabaseUser {
                        name: field_string(row.first()?)?,
                        can_create_db: row.get(1).map(field_bool).unwrap_or(false),
                        superuser: row.get(2).map(field_bool).unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// AWS CLI implementation of both cloud clients.
pub struct AwsCli {
    config: AwsConfig,
    poll_interval: Duration,
}

impl AwsCli {
    pub fn new(config: AwsConfig) -> Self {
        Self {
            config,
            poll_interval: STATEMENT_POLL_INTERVAL,
        }
    }

    fn command(&self, region: &str, service: &str, operation: &str) -> Result<AwsCommand, CloudError> {
        validate_region(region)?;
        Ok(aws_command(&self.config, region, service, operation))
    }

    /// Submit `sql` and wait for it to finish. Returns the statement id.
    fn execute_statement(&self, cluster: &str, sql: &str) -> Result<String, CloudError> {
        validate_cluster_identifier(cluster)?;
        let mut cmd = self.command(&self.config.region, "redshift-data", "execute-statement")?;
        cmd.args(["--cluster-identifier", cluster])
            .args(["--database", self.config.database.as_str()])
            .args(["--db-user", self.config.db_user.as_str()])
            .args(["--sql", sql]);
        let label = cmd.label().to_string();
        let submitted = cmd.run_json()?;
        let statement_id =
            str_field(&submitted, "Id").ok_or_else(|| decode_error(&label, "missing statement Id"))?;

        self.wait_for_statement(&statement_id)?;
        Ok(statement_id)
    }

    fn wait_for_statement(&self, statement_id: &str) -> Result<(), CloudError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.statement_timeout_secs);
        loop {
            let mut cmd = self.command(&self.config.region, "redshift-data", "describe-statement")?;
            cmd.args(["--id", statement_id]);
            let described = cmd.run_json()?;
            let status = str_field(&described, "Status").unwrap_or_default();

            match status.as_str() {
                "FINISHED" => return Ok(()),
                "FAILED" | "ABORTED" => {
                    return Err(CloudError::StatementFailed {
                        statement_id: statement_id.to_string(),
                        status: status.clone(),
                        reason: redact_secrets(&str_field(&described, "Error").unwrap_or_default()),
                    })
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(CloudError::Timeout(statement_id.to_string()));
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn statement_result(&self, statement_id: &str) -> Result<Value, CloudError> {
        let mut cmd = self.command(&self.config.region, "redshift-data", "get-statement-result")?;
        cmd.args(["--id", statement_id]);
        cmd.run_json()
    }

    fn query_users(&self, cluster: &str, name: &str) -> Result<Vec<DatabaseUser>, CloudError> {
        let name = sql_identifier(name)?;
        let sql = format!(
            "SELECT usename, usecreatedb, usesuper FROM pg_user WHERE usename = '{}';",
            name
        );
        let statement_id = self.execute_statement(cluster, &sql)?;
        Ok(parse_user_records(&self.statement_result(&statement_id)?))
    }
}

impl DatabaseUserClient for AwsCli {
    fn user_exists(&self, cluster: &str, name: &str) -> Result<bool, CloudError> {
        Ok(!self.query_users(cluster, name)?.is_empty())
    }

    fn create_user(&self, cluster: &str, name: &str) -> Result<String, CloudError> {
        let name = sql_identifier(name)?;
        self.execute_statement(cluster, &format!("CREATE USER {} PASSWORD DISABLE;", name))
    }

    fn describe_user(&self, cluster: &str, name: &str) -> Result<Option<DatabaseUser>, CloudError> {
        Ok(self.query_users(cluster, name)?.into_iter().next())
    }
}

impl NetworkRuleClient for AwsCli {
    fn describe_security_group(
        &self,
        region: &str,
        group_id: &str,
    ) -> Result<Option<SecurityGroup>, CloudError> {
        validate_security_group_id(group_id)?;
        let mut cmd = self.command(region, "ec2", "describe-security-groups")?;
        cmd.args(["--group-ids", group_id]);
        match cmd.run_json() {
            Ok(response) => Ok(parse_security_group(&response)),
            Err(CloudError::CommandFailed { stderr, .. })
                if stderr.contains("InvalidGroup.NotFound") || stderr.contains("InvalidGroupId.Malformed") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn cluster_security_groups(&self, region: &str, cluster: &str) -> Result<Vec<String>, CloudError> {
        validate_cluster_identifier(cluster)?;
        let mut cmd = self.command(region, "redshift", "describe-clusters")?;
        cmd.args(["--cluster-identifier", cluster]);
        let response = match cmd.run_json() {
            Ok(response) => response,
            Err(CloudError::CommandFailed { stderr, .. }) if stderr.contains("ClusterNotFound") => {
                return Err(CloudError::NotFound(format!("cluster {}", cluster)))
            }
            Err(e) => return Err(e),
        };

        Ok(response
            .get("Clusters")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("VpcSecurityGroups"))
            .and_then(|g| g.as_array())
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|g| str_field(g, "VpcSecurityGroupId"))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_rules(&self, region: &str, group_id: &str) -> Result<Vec<SecurityGroupRule>, CloudError> {
        validate_security_group_id(group_id)?;
        let mut cmd = self.command(region, "ec2", "describe-security-group-rules")?;
        cmd.args(["--filters", format!("Name=group-id,Values={}", group_id).as_str()]);
        Ok(parse_rules(&cmd.run_json()?))
    }

    fn authorize(
        &self,
        region: &str,
        group_id: &str,
        rule: &RuleSpec,
    ) -> Result<Option<String>, CloudError> {
        validate_security_group_id(group_id)?;
        validate_cidr(&rule.cidr)?;
        let operation = if rule.direction.is_egress() {
            "authorize-security-group-egress"
        } else {
            "authorize-security-group-ingress"
        };
        let mut cmd = self.command(region, "ec2", operation)?;
        cmd.args(["--group-id", group_id])
            .args(["--ip-permissions", ip_permissions(rule).to_string().as_str()]);
        let response = cmd.run_json()?;
        Ok(parse_rules(&response).into_iter().next().map(|r| r.rule_id))
    }

    fn revoke(&self, region: &str, rule: &SecurityGroupRule) -> Result<(), CloudError> {
        validate_security_group_id(&rule.group_id)?;
        let operation = if rule.is_egress {
            "revoke-security-group-egress"
        } else {
            "revoke-security-group-ingress"
        };
        let mut cmd = self.command(region, "ec2", operation)?;
        cmd.args(["--group-id", rule.group_id.as_str()])
            .args(["--security-group-rule-ids", rule.rule_id.as_str()]);
        cmd.run_json()?;
        Ok(())
    }
}
