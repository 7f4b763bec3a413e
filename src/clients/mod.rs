//! Collaborator clients.
//!
//! - `traits`: the interfaces the engine depends on
//! - `servicenow`: ticket source over the ServiceNow Table API
//! - `aws`: cloud clients over the AWS CLI
//! - `dry_run`: mutation-free wrappers
//! - `memory`: in-memory implementations

pub mod aws;
pub mod dry_run;
pub mod memory;
pub mod servicenow;
pub mod traits;

pub use aws::AwsCli;
pub use dry_run::{DryRunDatabase, DryRunNetwork, DryRunTicketSource};
pub use memory::{MemoryDatabase, MemoryNetwork, MemoryTicketSource};
pub use servicenow::ServiceNowClient;
pub use traits::*;
