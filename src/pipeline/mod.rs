//! Pipeline orchestration module.
//!
//! Coordinates per-incident processing and the polling loop:
//! - Idempotency guard
//! - Classification and extraction
//! - Execution through the executor registry
//! - Annotation, backup and history

pub mod context;
pub mod monitor;
pub mod processor;

pub use context::*;
pub use monitor::*;
pub use processor::*;
