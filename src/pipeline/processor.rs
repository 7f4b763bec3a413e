//! Incident processor.
//!
//! One pass per incident:
//! 1. Idempotency guard (already processed ends here, nothing written)
//! 2. Classification
//! 3. Extraction
//! 4. Execution
//! 5. Backup document, annotation, history
//!
//! Every pass past the guard writes exactly one record. Executor errors become
//! failed items; only fetching the incident can fail the call.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::audit::backup::write_backup;
use crate::audit::history::{compute_digest, HistoryStore};
use crate::audit::render::render;
use crate::classification::classify_explained;
use crate::clients::traits::TicketSource;
use crate::error::TransportError;
use crate::executors::{failure_detail, ExecutorRegistry};
use crate::extraction::Extractor;
use crate::idempotency::guard::find_completion_marker;
use crate::logging::structured::LogContext;
use crate::model::{
    Disposition, Incident, OperationFamily, OperationOutcome, ParsedRequest, ProcessingRecord,
};
use crate::pipeline::context::RunContext;
use crate::{log_debug, log_error, log_info, log_warn};

/// Where one pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// A completion marker was already present; nothing was written.
    Skipped,
    Unclassified,
    ParseFailed,
    Recorded,
}

impl Terminal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Terminal::Skipped => "skipped",
            Terminal::Unclassified => "unclassified",
            Terminal::ParseFailed => "parse_failed",
            Terminal::Recorded => "recorded",
        }
    }
}

/// Result of one pass.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub incident_number: String,
    pub terminal: Terminal,
    pub record: Option<ProcessingRecord>,
    /// The annotation reached the ticket.
    pub annotated: bool,
}

impl ProcessReport {
    /// Skipped, or recorded with no failed item.
    pub fn succeeded(&self) -> bool {
        match self.terminal {
            Terminal::Skipped => true,
            Terminal::Recorded => self.record.as_ref().map(|r| r.succeeded()).unwrap_or(false),
            Terminal::Unclassified | Terminal::ParseFailed => false,
        }
    }

    /// Whether the incident needs no further attention this run.
    pub fn settled(&self) -> bool {
        self.terminal == Terminal::Skipped || self.annotated
    }
}

pub struct IncidentProcessor {
    tickets: Arc<dyn TicketSource>,
    executors: ExecutorRegistry,
    history: Arc<dyn HistoryStore>,
    extractor: Extractor,
    backup_dir: Option<PathBuf>,
}

impl IncidentProcessor {
    pub fn new(
        tickets: Arc<dyn TicketSource>,
        executors: ExecutorRegistry,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            tickets,
            executors,
            history,
            extractor: Extractor::default(),
            backup_dir: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Write Terraform backup documents for network-rule changes into `dir`.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn tickets(&self) -> &Arc<dyn TicketSource> {
        &self.tickets
    }

    /// Fetch `number` and process it.
    pub fn process_number(
        &self,
        number: &str,
        run: &RunContext,
    ) -> Result<ProcessReport, TransportError> {
        let ctx = run.incident_context(number);
        let incident = self.tickets.get_incident(number).map_err(|e| {
            log_error!(ctx, "INCIDENT_FETCH_FAILED", error = e.to_string());
            e
        })?;
        log_info!(ctx, "INCIDENT_FETCHED", state = &incident.state, group = &incident.assignment_group);
        Ok(self.process_incident(&incident, run))
    }

    /// Process an already fetched incident.
    pub fn process_incident(&self, incident: &Incident, run: &RunContext) -> ProcessReport {
        let ctx = run.incident_context(&incident.number);

        if let Some(marker) = find_completion_marker(&incident.work_notes) {
            log_info!(ctx, "INCIDENT_ALREADY_PROCESSED", marker = marker);
            return ProcessReport {
                incident_number: incident.number.clone(),
                terminal: Terminal::Skipped,
                record: None,
                annotated: false,
            };
        }

        let classification = classify_explained(&incident.short_description, &incident.description);
        let family = classification.family;
        log_info!(ctx, "INCIDENT_CLASSIFIED", family = family.as_str(), pattern = &classification.pattern);

        let (terminal, request, disposition) = self.decide(incident, family, &ctx);
        let mut record = ProcessingRecord::new(
            &incident.number,
            &incident.short_description,
            family,
            Utc::now(),
            &run.run_id,
            request,
            disposition,
        );
        record.backup_location = self.write_backup(&record, &ctx);

        let annotation = render(&record);
        record.annotation_digest = Some(compute_digest(&annotation));

        let annotated = match self.tickets.append_annotation(&incident.number, &annotation) {
            Ok(()) => {
                log_info!(ctx, "ANNOTATION_APPENDED", terminal = terminal.as_str(), bytes = annotation.len());
                true
            }
            Err(e) => {
                log_error!(ctx, "ANNOTATION_FAILED", error = e.to_string());
                false
            }
        };

        if let Err(e) = self.history.append(&record) {
            log_warn!(ctx, "HISTORY_APPEND_FAILED", error = e.to_string());
        }

        log_info!(
            ctx,
            "INCIDENT_COMPLETE",
            terminal = terminal.as_str(),
            success = record.succeeded()
        );

        ProcessReport {
            incident_number: incident.number.clone(),
            terminal,
            record: Some(record),
            annotated,
        }
    }

    fn decide(
        &self,
        incident: &Incident,
        family: OperationFamily,
        ctx: &LogContext,
    ) -> (Terminal, Option<ParsedRequest>, Disposition) {
        let executor = match self.executors.for_family(family) {
            Some(executor) => executor,
            None => {
                log_warn!(ctx, "INCIDENT_UNCLASSIFIED", short_description = &incident.short_description);
                return (Terminal::Unclassified, None, Disposition::Unclassified);
            }
        };

        let request = match self.extractor.extract(family, incident.parse_text()) {
            Ok(request) => request,
            Err(failure) => {
                log_warn!(ctx, "PARSE_FAILED", family = family.as_str(), missing = &failure.missing_fields);
                return (Terminal::ParseFailed, None, Disposition::ParseFailed { failure });
            }
        };
        for hit in &request.raw_matches {
            log_debug!(ctx, "FIELD_MATCHED", field = &hit.field, value = &hit.value);
        }
        log_info!(ctx, "REQUEST_EXTRACTED", target = &request.target);

        let outcome = executor.execute(&request, ctx).unwrap_or_else(|e| {
            log_warn!(ctx, "EXECUTOR_FAILED", error = e.to_string());
            OperationOutcome::fatal(&request.target, failure_detail("request failed", &e))
        });
        log_info!(
            ctx,
            "REQUEST_EXECUTED",
            success = outcome.success,
            items = outcome.items.len(),
            summary = &outcome.summary
        );

        (Terminal::Recorded, Some(request), Disposition::Executed { outcome })
    }

    fn write_backup(&self, record: &ProcessingRecord, ctx: &LogContext) -> Option<String> {
        let dir = self.backup_dir.as_ref()?;
        let request = record.request.as_ref()?;
        let outcome = record.outcome()?;
        match write_backup(dir, &record.incident_number, request, outcome, record.timestamp) {
            Ok(Some(path)) => {
                log_info!(ctx, "BACKUP_WRITTEN", path = path.display().to_string());
                Some(path.display().to_string())
            }
            Ok(None) => None,
            Err(e) => {
                log_warn!(ctx, "BACKUP_FAILED", error = e.to_string());
                None
            }
        }
    }
}
