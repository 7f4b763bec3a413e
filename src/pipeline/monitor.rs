//! Monitor loop.
//!
//! Polls the ticket source, filters to the work group and date window, and
//! hands each unseen, unprocessed incident to the processor. The seen-set
//! lives in a [`MonitorRunState`] owned by one run; the durable record of
//! completion is the marker in the ticket itself.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::error::TransportError;
use crate::idempotency::guard::find_completion_marker;
use crate::pipeline::context::RunContext;
use crate::pipeline::processor::{IncidentProcessor, Terminal};
use crate::{log_debug, log_error, log_info, log_warn};

/// Longest uninterrupted sleep between stop checks.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// Cooperative cancellation flag shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub from_date: NaiveDate,
    pub poll_interval: Duration,
    pub work_group: Option<String>,
    /// Stop after this many polls.
    pub max_polls: Option<u64>,
}

impl MonitorSettings {
    pub fn new(from_date: NaiveDate, poll_interval: Duration) -> Self {
        Self {
            from_date,
            poll_interval,
            work_group: None,
            max_polls: None,
        }
    }

    pub fn work_group(mut self, group: Option<String>) -> Self {
        self.work_group = group.filter(|g| !g.is_empty());
        self
    }

    pub fn max_polls(mut self, max_polls: Option<u64>) -> Self {
        self.max_polls = max_polls;
        self
    }
}

/// State of one monitor run.
#[derive(Debug, Default)]
pub struct MonitorRunState {
    seen: HashSet<String>,
    pub polls: u64,
    pub poll_errors: u64,
    /// Records written.
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Found already carrying a completion marker.
    pub already_processed: u64,
    pub annotation_failures: u64,
}

impl MonitorRunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, number: &str) -> bool {
        self.seen.contains(number)
    }

    pub fn mark_seen(&mut self, number: &str) {
        self.seen.insert(number.to_string());
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// What one poll did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub listed: usize,
    pub filtered_out: usize,
    pub skipped_seen: usize,
    pub already_processed: usize,
    pub processed: usize,
}

pub struct MonitorLoop {
    processor: IncidentProcessor,
    settings: MonitorSettings,
    stop: StopSignal,
}

impl MonitorLoop {
    pub fn new(processor: IncidentProcessor, settings: MonitorSettings) -> Self {
        Self {
            processor,
            settings,
            stop: StopSignal::new(),
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// One listing pass. Returns early, between incidents, when stopped.
    pub fn poll_once(
        &self,
        state: &mut MonitorRunState,
        run: &RunContext,
    ) -> Result<PollSummary, TransportError> {
        let ctx = run.log_context();
        let work_group = self.settings.work_group.as_deref();
        let incidents = self
            .processor
            .tickets()
            .list_incidents(self.settings.from_date, work_group)?;

        let mut summary = PollSummary {
            listed: incidents.len(),
            ..Default::default()
        };
        state.polls += 1;

        for (index, incident) in incidents.iter().enumerate() {
            if self.stop.is_stopped() {
                log_info!(ctx, "POLL_INTERRUPTED", remaining = incidents.len() - index);
                break;
            }

            let number = incident.number.as_str();
            if !incident.in_work_group(work_group)
                || !incident.created_on_or_after(self.settings.from_date)
            {
                log_debug!(ctx, "INCIDENT_FILTERED", incident = number, group = &incident.assignment_group);
                summary.filtered_out += 1;
                continue;
            }
            if state.has_seen(number) {
                summary.skipped_seen += 1;
                continue;
            }
            if let Some(marker) = find_completion_marker(&incident.work_notes) {
                log_debug!(ctx, "INCIDENT_ALREADY_PROCESSED", incident = number, marker = marker);
                state.mark_seen(number);
                state.already_processed += 1;
                summary.already_processed += 1;
                continue;
            }

            let report = self.processor.process_incident(incident, run);
            summary.processed += 1;
            if report.terminal == Terminal::Skipped {
                state.already_processed += 1;
            } else {
                state.processed += 1;
                if report.succeeded() {
                    state.succeeded += 1;
                } else {
                    state.failed += 1;
                }
            }

            if report.settled() {
                state.mark_seen(number);
            } else {
                state.annotation_failures += 1;
                log_warn!(ctx, "INCIDENT_RETRY_NEXT_POLL", incident = number);
            }
        }

        log_info!(
            ctx,
            "POLL_COMPLETE",
            poll = state.polls,
            listed = summary.listed,
            processed = summary.processed,
            already_processed = summary.already_processed,
            filtered = summary.filtered_out
        );
        Ok(summary)
    }

    /// Poll until stopped or `max_polls` is reached.
    pub fn run(&self, run: &RunContext) -> MonitorRunState {
        let ctx = run.log_context();
        let mut state = MonitorRunState::new();

        log_info!(
            ctx,
            "MONITOR_START",
            from = self.settings.from_date.to_string(),
            interval_secs = self.settings.poll_interval.as_secs(),
            group = &self.settings.work_group,
            dry_run = run.dry_run
        );

        while !self.stop.is_stopped() {
            if let Err(e) = self.poll_once(&mut state, run) {
                state.poll_errors += 1;
                log_error!(ctx, "POLL_FAILED", error = e.to_string());
            }

            let attempts = state.polls + state.poll_errors;
            if self.settings.max_polls.map_or(false, |max| attempts >= max) {
                break;
            }
            self.sleep(self.settings.poll_interval);
        }

        log_info!(
            ctx,
            "MONITOR_STOP",
            polls = state.polls,
            processed = state.processed,
            succeeded = state.succeeded,
            failed = state.failed,
            already_processed = state.already_processed
        );
        state
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.stop.is_stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
