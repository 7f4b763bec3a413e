//! Processing history store.
//!
//! Machine-readable counterpart of the ticket annotations. Records are
//! appended once and never rewritten; listings are newest first.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::HistoryError;
use crate::model::{OperationFamily, ProcessingRecord};

/// Filters for [`HistoryStore::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub incident: Option<String>,
    pub family: Option<OperationFamily>,
    pub success: Option<bool>,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn matches(&self, record: &ProcessingRecord) -> bool {
        if let Some(incident) = &self.incident {
            if &record.incident_number != incident {
                return false;
            }
        }
        if let Some(family) = self.family {
            if record.family != family {
                return false;
            }
        }
        if let Some(success) = self.success {
            if record.succeeded() != success {
                return false;
            }
        }
        true
    }

    fn apply(&self, records: impl DoubleEndedIterator<Item = ProcessingRecord>) -> Vec<ProcessingRecord> {
        let matching = records.rev().filter(|r| self.matches(r));
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

pub trait HistoryStore: Send + Sync {
    fn append(&self, record: &ProcessingRecord) -> Result<(), HistoryError>;

    /// Records matching `filter`, newest first.
    fn list(&self, filter: &HistoryFilter) -> Result<Vec<ProcessingRecord>, HistoryError>;
}

/// SHA-256 of a rendered annotation, hex encoded.
pub fn compute_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// JSON-lines file, one record per line.
pub struct JsonlHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonlHistory {
    fn append(&self, record: &ProcessingRecord) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<ProcessingRecord>, HistoryError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProcessingRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!(
                    "HISTORY_LINE_SKIPPED path={} line={} error={}",
                    self.path.display(),
                    index + 1,
                    e
                ),
            }
        }
        Ok(filter.apply(records.into_iter()))
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<ProcessingRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, record: &ProcessingRecord) -> Result<(), HistoryError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<ProcessingRecord>, HistoryError> {
        let records = self.records.lock().clone();
        Ok(filter.apply(records.into_iter()))
    }
}
