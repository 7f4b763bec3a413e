//! Domain model.
//!
//! - Incidents as read from the ticket source
//! - Operation families and parsed requests
//! - Executor outcomes and cloud resource snapshots
//! - Processing records

pub mod incident;
pub mod outcome;
pub mod record;
pub mod request;

pub use incident::*;
pub use outcome::*;
pub use record::*;
pub use request::*;
