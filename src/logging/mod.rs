//! Logging context and event macros for remediation runs.

pub mod structured;

pub use structured::*;
