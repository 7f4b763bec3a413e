//! Classification module.
//!
//! Maps free text to one of the closed set of operation families.

pub mod classifier;
pub mod rules;

pub use classifier::*;
pub use rules::*;
