//! Security module.
//!
//! Validates identifiers before they reach SQL or the cloud CLI, and redacts
//! secrets from text written to tickets.

pub mod identifiers;
pub mod redaction;

pub use identifiers::*;
pub use redaction::*;
