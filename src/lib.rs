//! Ticket Remediator - incident processing and type-routing engine
//!
//! Reads change requests from incident tickets, classifies them into an
//! operation family, extracts the parameters, executes the change against the
//! cloud control plane, and writes an audit annotation back to the ticket.
//! The implementation prioritizes:
//!
//! 1. **Idempotency** - Marker tokens in the ticket make processing at-most-once effective
//! 2. **Logging** - Every decision point logged with run and incident context
//! 3. **Auditability** - Every processed incident gets exactly one deterministic annotation
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Incident processor and monitor loop
//! - `classification` - Operation family classification
//! - `extraction` - Parameter extraction from free text
//! - `idempotency` - Completion markers and the guard that reads them
//! - `executors` - Cloud call sequences per family
//! - `audit` - Annotation rendering, backup documents, history
//! - `clients` - Ticket source and cloud clients (REST, CLI, dry-run, in-memory)
//! - `security` - Identifier validation and secret redaction
//! - `config` - Environment configuration
//! - `logging` - Structured logging with run context

pub mod audit;
pub mod classification;
pub mod clients;
pub mod config;
pub mod error;
pub mod executors;
pub mod extraction;
pub mod idempotency;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod security;

pub use error::{CloudError, ConfigError, HistoryError, TransportError};
pub use pipeline::{IncidentProcessor, MonitorLoop, RunContext};

/// Initialize the process-wide logger at `level`. `RUST_LOG` overrides it.
pub fn init_logger(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
