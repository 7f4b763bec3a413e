//! Family to executor dispatch.

use std::sync::Arc;

use crate::clients::traits::{DatabaseUserClient, NetworkRuleClient};
use crate::executors::database_user::DatabaseUserExecutor;
use crate::executors::executor::Executor;
use crate::executors::network_rule::NetworkRuleExecutor;
use crate::model::OperationFamily;

/// One executor per executable family. The match in [`for_family`] is
/// exhaustive, so adding a family without an executor fails to compile.
///
/// [`for_family`]: ExecutorRegistry::for_family
pub struct ExecutorRegistry {
    database_user: DatabaseUserExecutor,
    network_rule: NetworkRuleExecutor,
}

impl ExecutorRegistry {
    pub fn new(
        database: Arc<dyn DatabaseUserClient>,
        network: Arc<dyn NetworkRuleClient>,
    ) -> Self {
        Self {
            database_user: DatabaseUserExecutor::new(database),
            network_rule: NetworkRuleExecutor::new(network),
        }
    }

    pub fn for_family(&self, family: OperationFamily) -> Option<&dyn Executor> {
        match family {
            OperationFamily::DatabaseUserLifecycle => Some(&self.database_user),
            OperationFamily::NetworkRuleChange => Some(&self.network_rule),
            OperationFamily::Unknown => None,
        }
    }
}
