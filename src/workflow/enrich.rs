//! `awards enrich`: wire config, secrets and files into the orchestrator.
use super::orchestrator::{
    FileSnapshot, Orchestrator, RecordState, RunReport, RunOptions, RunSummary, StopReason,
};
use crate::checkpoint::JsonlCheckpointStore;
use crate::cli::EnrichArgs;
use crate::config::{require_secret, resolve_config, LOOKUP_API_KEY_ENV};
use crate::enrich::LookupClient;
use crate::error::FatalConfigurationError;
use crate::paths::RunPaths;
use crate::retry::SystemClock;
use crate::store::{load_records, write_json, write_records};
use crate::util::{display_path, now_epoch_ms};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

/// Current schema version for the enrich run report.
const RUN_REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct RunReportFile<'a> {
    schema_version: u32,
    run_id: &'a str,
    input: String,
    output: String,
    checkpoint: String,
    elapsed_ms: u64,
    stop: &'a StopReason,
    summary: &'a RunSummary,
    /// Awards that failed permanently, this run or earlier.
    failed: Vec<&'a str>,
    /// Awards that will be retried on the next run.
    pending_retry: Vec<&'a str>,
}

fn names_in_state(report: &RunReport, wanted: RecordState) -> Vec<&str> {
    report
        .records
        .iter()
        .zip(&report.states)
        .filter(|(_, state)| **state == wanted)
        .map(|(record, _)| record.name.as_str())
        .collect()
}

pub fn run_enrich(args: &EnrichArgs) -> Result<()> {
    let start = Instant::now();
    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(retries) = args.retries {
        config.retry.max_retries = retries;
    }
    let api_key = require_secret(LOOKUP_API_KEY_ENV)?;

    let records = load_records(&args.input)?;
    let paths = RunPaths::for_output(
        &args.output,
        args.checkpoint.as_deref(),
        args.snapshot.as_deref(),
    );
    let run_id = format!("run-{}", now_epoch_ms()?);
    let mut checkpoints = JsonlCheckpointStore::open(paths.checkpoint(), &run_id)?;
    let client = LookupClient::new(config.lookup.clone(), api_key);
    let snapshot = FileSnapshot::new(paths.snapshot().to_path_buf());
    let options = RunOptions {
        limit: args.limit,
        retry: config.retry.policy(),
        request_interval: Duration::from_millis(config.lookup.request_interval_ms),
        quiet: args.quiet,
    };

    let cwd = std::env::current_dir().ok();
    let base = cwd.as_deref();
    if !args.quiet {
        eprintln!(
            "enrich: {} records from {} (checkpoint {}, {} entries)",
            records.len(),
            display_path(&args.input, base),
            display_path(paths.checkpoint(), base),
            checkpoints.entry_count()
        );
    }

    let report =
        Orchestrator::new(&client, &mut checkpoints, &snapshot, &SystemClock, options).run(records);
    write_records(paths.output(), &report.records)?;
    let report_file = RunReportFile {
        schema_version: RUN_REPORT_SCHEMA_VERSION,
        run_id: &run_id,
        input: display_path(&args.input, base),
        output: display_path(paths.output(), base),
        checkpoint: display_path(paths.checkpoint(), base),
        elapsed_ms: start.elapsed().as_millis() as u64,
        stop: &report.stop,
        summary: &report.summary,
        failed: names_in_state(&report, RecordState::FailedPermanent),
        pending_retry: names_in_state(&report, RecordState::FailedTransientPendingRetry),
    };
    write_json(&paths.report(), &report_file)?;

    if !args.quiet {
        print_summary(&report.summary, &report.stop, paths.output(), base);
    }
    if let StopReason::Fatal(reason) = report.stop {
        return Err(FatalConfigurationError(reason).into());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, stop: &StopReason, output: &Path, base: Option<&Path>) {
    let stopped = match stop {
        StopReason::Exhausted => "all pending records processed".to_string(),
        StopReason::LimitReached => "limit reached; re-run to continue".to_string(),
        StopReason::Fatal(reason) => format!("stopped: {reason}"),
    };
    eprintln!("enrich: {stopped}");
    eprintln!("  newly enriched:            {}", summary.newly_enriched);
    eprintln!("  already enriched/skipped:  {}", summary.already_enriched);
    eprintln!("  permanently failed:        {}", summary.permanently_failed);
    eprintln!("  skipped (failed earlier):  {}", summary.skipped_permanent);
    eprintln!("  pending retry (transient): {}", summary.transient_pending_retry);
    eprintln!("  not attempted:             {}", summary.not_attempted);
    eprintln!("  service calls:             {}", summary.service_calls);
    eprintln!("enrich: wrote {}", display_path(output, base));
}
