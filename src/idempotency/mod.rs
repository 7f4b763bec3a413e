//! Idempotency module.
//!
//! Marker tokens proving completion, and the guard that looks for them.

pub mod guard;
pub mod markers;

pub use guard::*;
pub use markers::*;
