//! `remediator` command-line entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use ticket_remediator::audit::{HistoryFilter, HistoryStore, JsonlHistory, MemoryHistory};
use ticket_remediator::classification::classify_explained;
use ticket_remediator::clients::{
    AwsCli, DatabaseUserClient, DryRunDatabase, DryRunNetwork, DryRunTicketSource,
    NetworkRuleClient, ServiceNowClient, TicketSource,
};
use ticket_remediator::config::{Config, ProcessingConfig};
use ticket_remediator::executors::ExecutorRegistry;
use ticket_remediator::extraction::{Extractor, DEFAULT_REGION};
use ticket_remediator::model::OperationFamily;
use ticket_remediator::pipeline::{
    IncidentProcessor, MonitorLoop, MonitorSettings, RunContext, StopSignal, Terminal,
};
use ticket_remediator::{init_logger, ConfigError, TransportError};

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_TRANSPORT: u8 = 3;

/// Ticket Remediator CLI
#[derive(Parser)]
#[command(name = "remediator")]
#[command(about = "Process change-request incidents against the cloud control plane", long_about = None)]
#[command(version)]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log mutations instead of performing them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single incident
    Process {
        /// Incident number, e.g. INC0010022
        number: String,
    },

    /// Poll for new incidents until interrupted
    Monitor {
        /// Only incidents created on or after this date (YYYY-MM-DD, default today)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Seconds between polls (default $POLL_INTERVAL)
        #[arg(long)]
        interval: Option<u64>,

        /// Assignment group filter (default $ASSIGNMENT_GROUP_FILTER)
        #[arg(long)]
        group: Option<String>,

        /// Stop after this many polls
        #[arg(long)]
        max_polls: Option<u64>,
    },

    /// Classify and parse a description offline
    Classify {
        /// Short description
        #[arg(long, default_value = "")]
        short: String,

        /// Incident description
        description: String,
    },

    /// Show processing history, newest first
    History {
        #[arg(long)]
        incident: Option<String>,

        #[arg(long)]
        family: Option<OperationFamily>,

        #[arg(long)]
        limit: Option<usize>,

        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    });

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else if e.downcast_ref::<TransportError>().is_some() {
                ExitCode::from(EXIT_TRANSPORT)
            } else {
                ExitCode::from(EXIT_FAILED)
            }
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let run = RunContext::new().dry_run(cli.dry_run);
    match cli.command {
        Commands::Process { number } => process(&run, &number),
        Commands::Monitor {
            from,
            interval,
            group,
            max_polls,
        } => monitor(&run, from, interval, group, max_polls),
        Commands::Classify { short, description } => classify(&short, &description),
        Commands::History {
            incident,
            family,
            limit,
            json,
        } => history(incident, family, limit, json),
    }
}

/// Wire the production collaborators, wrapped for dry runs.
fn build_processor(config: &Config, run: &RunContext) -> IncidentProcessor {
    let ctx = run.log_context();
    let aws = Arc::new(AwsCli::new(config.aws.clone()));
    let mut tickets: Arc<dyn TicketSource> =
        Arc::new(ServiceNowClient::new(config.servicenow.clone()));
    let mut database: Arc<dyn DatabaseUserClient> = aws.clone();
    let mut network: Arc<dyn NetworkRuleClient> = aws;

    let extractor = Extractor::new(&config.aws.region, &config.processing.rule_description);

    if run.dry_run {
        tickets = Arc::new(DryRunTicketSource::new(tickets, ctx.clone()));
        database = Arc::new(DryRunDatabase::new(database, ctx.clone()));
        network = Arc::new(DryRunNetwork::new(network, ctx));
        return IncidentProcessor::new(
            tickets,
            ExecutorRegistry::new(database, network),
            Arc::new(MemoryHistory::new()),
        )
        .with_extractor(extractor);
    }

    IncidentProcessor::new(
        tickets,
        ExecutorRegistry::new(database, network),
        Arc::new(JsonlHistory::new(config.processing.history_file.clone())),
    )
    .with_extractor(extractor)
    .with_backup_dir(config.processing.backup_dir.clone())
}

fn process(run: &RunContext, number: &str) -> Result<ExitCode> {
    let config = Config::from_env()?;
    let processor = build_processor(&config, run);
    let report = processor.process_number(number, run)?;

    match &report.record {
        Some(record) => {
            println!("{} {} success={}", report.incident_number, report.terminal.as_str(), record.succeeded());
            println!();
            println!("{}", ticket_remediator::audit::render(record));
        }
        None => println!("{} {}", report.incident_number, report.terminal.as_str()),
    }
    if report.terminal != Terminal::Skipped && !report.annotated {
        eprintln!("warning: annotation was not appended to {}", report.incident_number);
    }

    Ok(if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILED)
    })
}

fn monitor(
    run: &RunContext,
    from: Option<NaiveDate>,
    interval: Option<u64>,
    group: Option<String>,
    max_polls: Option<u64>,
) -> Result<ExitCode> {
    let config = Config::from_env()?;
    let processor = build_processor(&config, run);

    let settings = MonitorSettings::new(
        from.unwrap_or_else(|| Utc::now().date_naive()),
        Duration::from_secs(interval.unwrap_or(config.processing.poll_interval_secs)),
    )
    .work_group(group.or_else(|| config.processing.work_group.clone()))
    .max_polls(max_polls);

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.stop()).context("failed to install Ctrl-C handler")?;

    let state = MonitorLoop::new(processor, settings)
        .with_stop_signal(stop)
        .run(run);

    println!(
        "polls={} processed={} succeeded={} failed={} already_processed={} poll_errors={}",
        state.polls,
        state.processed,
        state.succeeded,
        state.failed,
        state.already_processed,
        state.poll_errors
    );
    Ok(ExitCode::SUCCESS)
}

fn classify(short: &str, description: &str) -> Result<ExitCode> {
    let processing = ProcessingConfig::from_env()?;
    let region = std::env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
    let extractor = Extractor::new(&region, &processing.rule_description);

    let classification = classify_explained(short, description);
    println!("family: {}", classification.family);
    if let Some(pattern) = &classification.pattern {
        println!("pattern: {}", pattern);
    }
    if classification.family == OperationFamily::Unknown {
        return Ok(ExitCode::from(EXIT_FAILED));
    }

    let text = if description.trim().is_empty() { short } else { description };
    match extractor.extract(classification.family, text) {
        Ok(request) => {
            println!("{}", serde_json::to_string_pretty(&request)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            println!("missing: {}", failure.missing_fields.join(", "));
            Ok(ExitCode::from(EXIT_FAILED))
        }
    }
}

fn history(
    incident: Option<String>,
    family: Option<OperationFamily>,
    limit: Option<usize>,
    json: bool,
) -> Result<ExitCode> {
    let processing = ProcessingConfig::from_env()?;
    let store = JsonlHistory::new(processing.history_file);
    let records = store.list(&HistoryFilter {
        incident,
        family,
        success: None,
        limit,
    })?;

    for record in &records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!(
                "{}  {:<12} {:<24} {:<13} success={:<5} run={}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.incident_number,
                record.family.as_str(),
                record.disposition.as_str(),
                record.succeeded(),
                record.run_id
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
