//! Executors: the cloud call sequences behind each operation family.

pub mod database_user;
pub mod executor;
pub mod network_rule;
pub mod registry;

pub use database_user::DatabaseUserExecutor;
pub use executor::*;
pub use network_rule::NetworkRuleExecutor;
pub use registry::ExecutorRegistry;
