//! Security-group rule executor.
//!
//! Validates the group, optionally checks its cluster association, snapshots
//! the rules, then adds or removes one rule per CIDR. CIDRs are independent:
//! one failing never stops the rest.

use std::sync::Arc;

use crate::clients::traits::NetworkRuleClient;
use crate::error::CloudError;
use crate::executors::executor::{failure_detail, wrong_request, Executor};
use crate::logging::structured::LogContext;
use crate::model::{
    BackupSnapshot, ItemAction, ItemResult, NetworkRuleParams, OperationFamily, OperationOutcome,
    OutcomeCounts, ParsedRequest, RuleAction, RuleSpec, SecurityGroupRule,
};
use crate::{log_debug, log_info, log_warn};

pub struct NetworkRuleExecutor {
    client: Arc<dyn NetworkRuleClient>,
}

impl NetworkRuleExecutor {
    pub fn new(client: Arc<dyn NetworkRuleClient>) -> Self {
        Self { client }
    }

    fn cluster_note(
        &self,
        params: &NetworkRuleParams,
        group_id: &str,
        ctx: &LogContext,
    ) -> Option<String> {
        let cluster = params.cluster.as_deref()?;
        match self.client.cluster_security_groups(&params.region, cluster) {
            Ok(groups) if groups.iter().any(|g| g == group_id) => {
                log_debug!(ctx, "CLUSTER_ASSOCIATION_OK", cluster = cluster, group = group_id);
                None
            }
            Ok(groups) => {
                log_warn!(ctx, "CLUSTER_ASSOCIATION_MISMATCH", cluster = cluster, group = group_id, attached = &groups);
                Some(format!(
                    "security group {} is not attached to cluster {}",
                    group_id, cluster
                ))
            }
            Err(e) => Some(failure_detail(
                &format!("could not verify association with cluster {}", cluster),
                &e,
            )),
        }
    }

    fn add(
        &self,
        region: &str,
        group_id: &str,
        spec: &RuleSpec,
        before: &[SecurityGroupRule],
    ) -> ItemResult {
        let direction = spec.direction.as_str();
        if let Some(existing) = before.iter().find(|r| r.matches(spec)) {
            return ItemResult::new(
                &spec.cidr,
                ItemAction::SkippedDuplicate,
                format!("{} rule already present", direction),
            )
            .with_external_id(Some(existing.rule_id.clone()));
        }
        match self.client.authorize(region, group_id, spec) {
            Ok(rule_id) => ItemResult::new(
                &spec.cidr,
                ItemAction::Added,
                format!("{} rule added", direction),
            )
            .with_external_id(rule_id),
            Err(e) if e.is_already_exists() => ItemResult::new(
                &spec.cidr,
                ItemAction::SkippedDuplicate,
                format!("{} rule already present", direction),
            ),
            Err(e) => ItemResult::new(
                &spec.cidr,
                ItemAction::Failed,
                failure_detail("authorize failed", &e),
            ),
        }
    }

    fn remove(&self, region: &str, spec: &RuleSpec, before: &[SecurityGroupRule]) -> ItemResult {
        let existing = match before.iter().find(|r| r.matches(spec)) {
            Some(rule) => rule,
            None => return ItemResult::new(&spec.cidr, ItemAction::Failed, "rule not found"),
        };
        match self.client.revoke(region, existing) {
            Ok(()) => ItemResult::new(
                &spec.cidr,
                ItemAction::Removed,
                format!("{} rule removed", spec.direction.as_str()),
            )
            .with_external_id(Some(existing.rule_id.clone())),
            Err(e) => ItemResult::new(
                &spec.cidr,
                ItemAction::Failed,
                failure_detail("revoke failed", &e),
            ),
        }
    }
}

impl Executor for NetworkRuleExecutor {
    fn family(&self) -> OperationFamily {
        OperationFamily::NetworkRuleChange
    }

    fn execute(
        &self,
        request: &ParsedRequest,
        ctx: &LogContext,
    ) -> Result<OperationOutcome, CloudError> {
        let params = request
            .network_rule()
            .ok_or_else(|| wrong_request(self.family()))?;
        let group_id = request.target.as_str();
        let region = params.region.as_str();

        log_info!(
            ctx,
            "NETWORK_RULE_START",
            group = group_id,
            region = region,
            action = params.action.as_str(),
            direction = params.direction.as_str(),
            cidrs = params.cidrs.len()
        );

        let group = match self.client.describe_security_group(region, group_id)? {
            Some(group) => group,
            None => {
                let detail = format!("security group {} not found in {}", group_id, region);
                log_warn!(ctx, "SECURITY_GROUP_MISSING", group = group_id, region = region);
                return Ok(OperationOutcome::fatal(group_id, detail));
            }
        };

        let mut notes: Vec<String> = self.cluster_note(params, group_id, ctx).into_iter().collect();

        let before = self.client.list_rules(region, group_id)?;

        let items: Vec<ItemResult> = params
            .rule_specs()
            .iter()
            .map(|spec| {
                let item = match params.action {
                    RuleAction::Add => self.add(region, group_id, spec, &before),
                    RuleAction::Remove => self.remove(region, spec, &before),
                };
                if item.action.is_failure() {
                    log_warn!(ctx, "RULE_FAILED", cidr = &item.target, detail = &item.detail);
                } else {
                    log_info!(ctx, "RULE_DONE", cidr = &item.target, action = item.action.label());
                }
                item
            })
            .collect();

        let counts = OutcomeCounts::tally(&items);
        let verb = match params.action {
            RuleAction::Add => "added",
            RuleAction::Remove => "removed",
        };
        let summary = format!(
            "{} of {} {} rules {} on {}; {} skipped, {} failed",
            counts.succeeded(),
            counts.total(),
            params.direction.as_str(),
            verb,
            group_id,
            counts.skipped,
            counts.failed
        );
        let mut outcome = OperationOutcome::new(items, summary);

        match self.client.list_rules(region, group_id) {
            Ok(after) => {
                outcome.backup = Some(BackupSnapshot::SecurityGroupRules {
                    group,
                    before,
                    after,
                })
            }
            Err(e) => notes.push(failure_detail("could not read rules after the change", &e)),
        }

        Ok(outcome.with_notes(notes))
    }
}
