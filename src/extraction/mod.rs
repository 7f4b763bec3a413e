//! Pattern extraction module.
//!
//! Turns ticket free text into a [`crate::model::ParsedRequest`] or a
//! [`crate::model::ParseFailure`] naming the missing fields. All patterns
//! live here, one table per family.

pub mod cidr;
pub mod database_user;
pub mod extractor;
pub mod network_rule;
pub mod rules;

pub use cidr::*;
pub use database_user::*;
pub use extractor::*;
pub use network_rule::*;
pub use rules::*;
