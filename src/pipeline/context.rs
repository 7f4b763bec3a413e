//! Run context management.
//!
//! One `RunContext` per CLI invocation or monitor run; every log line and
//! processing record carries its run id.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::logging::structured::LogContext;

/// Context for one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl RunContext {
    pub fn new() -> Self {
        Self::with_id(&format!("run-{}", &Uuid::new_v4().to_string()[..8]))
    }

    pub fn with_id(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.run_id)
    }

    /// Log context for one incident of this run.
    pub fn incident_context(&self, number: &str) -> LogContext {
        self.log_context().with_incident(number)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
