//! Database-user lifecycle executor.
//!
//! Sequence: existence check, create when absent, read back. Any step that
//! fails ends the sequence with a single failed item; nothing is retried.

use std::sync::Arc;

use crate::clients::traits::DatabaseUserClient;
use crate::error::CloudError;
use crate::executors::executor::{failure_detail, wrong_request, Executor};
use crate::logging::structured::LogContext;
use crate::model::{
    BackupSnapshot, ItemAction, ItemResult, OperationFamily, OperationOutcome, ParsedRequest,
};
use crate::security::identifiers::sql_identifier;
use crate::{log_info, log_warn};

pub struct DatabaseUserExecutor {
    client: Arc<dyn DatabaseUserClient>,
}

impl DatabaseUserExecutor {
    pub fn new(client: Arc<dyn DatabaseUserClient>) -> Self {
        Self { client }
    }

    fn failed(user: &str, detail: String, ctx: &LogContext) -> OperationOutcome {
        log_warn!(ctx, "DB_USER_FAILED", user = user, detail = &detail);
        OperationOutcome::fatal(user, detail)
    }
}

impl Executor for DatabaseUserExecutor {
    fn family(&self) -> OperationFamily {
        OperationFamily::DatabaseUserLifecycle
    }

    fn execute(
        &self,
        request: &ParsedRequest,
        ctx: &LogContext,
    ) -> Result<OperationOutcome, CloudError> {
        let params = request
            .database_user()
            .ok_or_else(|| wrong_request(self.family()))?;
        let cluster = params.cluster_identifier();

        let user = match sql_identifier(&request.target) {
            Ok(user) => user,
            Err(e) => return Ok(Self::failed(&request.target, failure_detail("invalid user name", &e), ctx)),
        };

        log_info!(ctx, "DB_USER_START", user = &user, cluster = &cluster);

        let exists = match self.client.user_exists(&cluster, &user) {
            Ok(exists) => exists,
            Err(e) => return Ok(Self::failed(&user, failure_detail("existence check failed", &e), ctx)),
        };

        if exists {
            log_info!(ctx, "DB_USER_EXISTS", user = &user, cluster = &cluster);
            let current = self.client.describe_user(&cluster, &user).ok().flatten();
            let item = ItemResult::new(
                &user,
                ItemAction::SkippedDuplicate,
                format!("user already exists on {}", cluster),
            );
            return Ok(OperationOutcome::new(
                vec![item],
                format!("User {} already exists on {}; nothing to do", user, cluster),
            )
            .with_backup(BackupSnapshot::DatabaseUser {
                cluster,
                before: current.clone(),
                after: current,
            }));
        }

        let statement_id = match self.client.create_user(&cluster, &user) {
            Ok(id) => id,
            Err(e) if e.is_already_exists() => {
                log_info!(ctx, "DB_USER_CREATE_RACE", user = &user, cluster = &cluster);
                let item = ItemResult::new(
                    &user,
                    ItemAction::SkippedDuplicate,
                    format!("user already exists on {}", cluster),
                );
                return Ok(OperationOutcome::new(
                    vec![item],
                    format!("User {} already exists on {}; nothing to do", user, cluster),
                ));
            }
            Err(e) => return Ok(Self::failed(&user, failure_detail("create failed", &e), ctx)),
        };

        let created = match self.client.describe_user(&cluster, &user) {
            Ok(Some(created)) => created,
            Ok(None) => {
                return Ok(Self::failed(
                    &user,
                    format!("user not visible on {} after creation", cluster),
                    ctx,
                ))
            }
            Err(e) => return Ok(Self::failed(&user, failure_detail("verification failed", &e), ctx)),
        };

        log_info!(
            ctx,
            "DB_USER_CREATED",
            user = &user,
            cluster = &cluster,
            statement = &statement_id
        );

        let item = ItemResult::new(
            &user,
            ItemAction::Added,
            format!("user created and verified on {}", cluster),
        )
        .with_external_id(Some(statement_id));

        Ok(OperationOutcome::new(
            vec![item],
            format!("User {} created on {}", user, cluster),
        )
        .with_backup(BackupSnapshot::DatabaseUser {
            cluster,
            before: None,
            after: Some(created),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::MemoryDatabase;
    use crate::model::{DatabaseUserParams, RequestParameters};

    const CLUSTER: &str = "redshift-cluster-1";

    fn request(user: &str, cluster_ref: &str) -> ParsedRequest {
        ParsedRequest {
            target: user.to_string(),
            parameters: RequestParameters::DatabaseUser(DatabaseUserParams {
                cluster_ref: cluster_ref.to_string(),
            }),
            raw_matches: Vec::new(),
        }
    }

    fn ctx() -> LogContext {
        LogContext::new("run-test").with_incident("INC0010022")
    }

    #[test]
    fn test_creates_missing_user() {
        let db = Arc::new(MemoryDatabase::new().with_cluster(CLUSTER));
        let executor = DatabaseUserExecutor::new(db.clone());

        let outcome = executor.execute(&request("user7", "1"), &ctx()).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].action, ItemAction::Added);
        assert!(outcome.items[0].external_id.is_some());
        assert_eq!(db.user_names(CLUSTER), vec!["user7"]);
        assert!(matches!(
            outcome.backup,
            Some(BackupSnapshot::DatabaseUser { before: None, after: Some(_), .. })
        ));
    }

    #[test]
    fn test_existing_user_is_skipped() {
        let db = Arc::new(MemoryDatabase::new().with_cluster(CLUSTER));
        db.add_user(CLUSTER, "user7");
        let executor = DatabaseUserExecutor::new(db.clone());

        let outcome = executor.execute(&request("user7", "1"), &ctx()).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.items[0].action, ItemAction::SkippedDuplicate);
        assert_eq!(db.create_calls(), 0);
    }

    #[test]
    fn test_create_failure_is_single_failed_item() {
        let db = Arc::new(MemoryDatabase::new().with_cluster(CLUSTER));
        db.fail_create_for("user7", CloudError::Timeout("stmt-1".to_string()));
        let executor = DatabaseUserExecutor::new(db);

        let outcome = executor.execute(&request("user7", "1"), &ctx()).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].action, ItemAction::Failed);
        assert!(outcome.items[0].detail.starts_with("create failed"));
    }

    #[test]
    fn test_verification_failure() {
        let db = Arc::new(MemoryDatabase::new().with_cluster(CLUSTER));
        db.hide_after_create("user7");
        let executor = DatabaseUserExecutor::new(db);

        let outcome = executor.execute(&request("user7", "1"), &ctx()).unwrap();
        assert!(!outcome.success);
        assert!(outcome.items[0].detail.contains("not visible"));
    }

    #[test]
    fn test_unknown_cluster_fails_existence_check() {
        let db = Arc::new(MemoryDatabase::new());
        let executor = DatabaseUserExecutor::new(db.clone());

        let outcome = executor.execute(&request("user7", "9"), &ctx()).unwrap();
        assert!(!outcome.success);
        assert!(outcome.items[0].detail.starts_with("existence check failed"));
        assert_eq!(db.create_calls(), 0);
    }

    #[test]
    fn test_invalid_user_name_never_reaches_cluster() {
        let db = Arc::new(MemoryDatabase::new().with_cluster(CLUSTER));
        let executor = DatabaseUserExecutor::new(db.clone());

        let outcome = executor.execute(&request("select", "1"), &ctx()).unwrap();
        assert!(!outcome.success);
        assert_eq!(db.create_calls(), 0);
    }
}
