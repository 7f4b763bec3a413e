//! Audit trail: ticket annotations, backup documents, processing history.

pub mod backup;
pub mod history;
pub mod render;

pub use backup::{backup_file_name, render_backup, write_backup};
pub use history::*;
pub use render::{render, DELIMITER};
