//! Resumable enrichment loop.
//!
//! Each record moves `pending -> in_flight -> {enriched | failed_permanent |
//! failed_transient_pending_retry}`. Only terminal outcomes reach the
//! checkpoint store, and they reach it before the loop moves on, so a crash
//! at any point re-attempts at most the record that was in flight.
use crate::checkpoint::{CheckpointStore, Outcome};
use crate::enrich::{Enricher, EnrichmentPayload};
use crate::error::EnrichmentError;
use crate::record::{IdentityKey, Record};
use crate::retry::{run_with_retry, Clock, RetryPolicy};
use crate::store::write_records;
use crate::util::truncate_string;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Receives the full collection after every record outcome.
pub trait SnapshotSink {
    fn write_snapshot(&self, records: &[Record]) -> Result<()>;
}

/// Progressive snapshot file, overwritten atomically.
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SnapshotSink for FileSnapshot {
    fn write_snapshot(&self, records: &[Record]) -> Result<()> {
        write_records(&self.path, records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    InFlight,
    Enriched,
    FailedPermanent,
    FailedTransientPendingRetry,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    LimitReached,
    Fatal(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub newly_enriched: usize,
    /// Enriched before this run (input status or checkpoint).
    pub already_enriched: usize,
    /// Failed permanently during this run.
    pub permanently_failed: usize,
    /// Failed permanently in an earlier run; not retried.
    pub skipped_permanent: usize,
    pub transient_pending_retry: usize,
    /// Still pending because the run stopped early.
    pub not_attempted: usize,
    pub service_calls: u32,
}

#[derive(Debug)]
pub struct RunReport {
    pub records: Vec<Record>,
    pub states: Vec<RecordState>,
    pub summary: RunSummary,
    pub stop: StopReason,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum records sent to the service this run.
    pub limit: Option<usize>,
    pub retry: RetryPolicy,
    /// Pause between consecutive records.
    pub request_interval: Duration,
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: None,
            retry: RetryPolicy::default(),
            request_interval: Duration::ZERO,
            quiet: true,
        }
    }
}

pub struct Orchestrator<'a> {
    enricher: &'a dyn Enricher,
    checkpoints: &'a mut dyn CheckpointStore,
    snapshot: &'a dyn SnapshotSink,
    clock: &'a dyn Clock,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        enricher: &'a dyn Enricher,
        checkpoints: &'a mut dyn CheckpointStore,
        snapshot: &'a dyn SnapshotSink,
        clock: &'a dyn Clock,
        options: RunOptions,
    ) -> Self {
        Self {
            enricher,
            checkpoints,
            snapshot,
            clock,
            options,
        }
    }

    /// Enrich every pending record in `records`, in order.
    pub fn run(&mut self, mut records: Vec<Record>) -> RunReport {
        let mut summary = RunSummary::default();
        let mut states = vec![RecordState::Pending; records.len()];
        let mut pending: Vec<(usize, IdentityKey)> = Vec::new();

        for (idx, record) in records.iter_mut().enumerate() {
            let Some(key) = record.identity_key() else {
                tracing::warn!(index = idx, "record has no identity key; leaving unenriched");
                states[idx] = RecordState::FailedPermanent;
                summary.permanently_failed += 1;
                continue;
            };
            if self.restore(record, &key, &mut states[idx], &mut summary) {
                continue;
            }
            if record.is_enriched() {
                states[idx] = RecordState::Enriched;
                summary.already_enriched += 1;
            } else {
                pending.push((idx, key));
            }
        }
        tracing::info!(
            total = records.len(),
            pending = pending.len(),
            already_enriched = summary.already_enriched,
            skipped_permanent = summary.skipped_permanent,
            "resume set computed"
        );

        let total = pending.len();
        let mut attempted = 0usize;
        let mut stop = StopReason::Exhausted;
        // Keys whose retries ran out this run; they have no checkpoint entry.
        let mut deferred: HashSet<IdentityKey> = HashSet::new();
        for (position, (idx, key)) in pending.into_iter().enumerate() {
            // Duplicate keys: an earlier record in this run may have settled it.
            if self.restore(&mut records[idx], &key, &mut states[idx], &mut summary) {
                continue;
            }
            if deferred.contains(&key) {
                states[idx] = RecordState::FailedTransientPendingRetry;
                summary.transient_pending_retry += 1;
                continue;
            }
            if self.options.limit.is_some_and(|limit| attempted >= limit) {
                stop = StopReason::LimitReached;
                break;
            }
            if attempted > 0 && !self.options.request_interval.is_zero() {
                self.clock.sleep(self.options.request_interval);
            }
            attempted += 1;

            states[idx] = RecordState::InFlight;
            let enricher = self.enricher;
            let record = &records[idx];
            let outcome = run_with_retry(
                &self.options.retry,
                self.clock,
                EnrichmentError::is_transient,
                |attempt| {
                    tracing::debug!(award = %record.name, attempt, "lookup attempt");
                    enricher.enrich(record)
                },
            );
            summary.service_calls += outcome.attempts;

            let label = match outcome.result {
                Ok(payload) => {
                    if let Err(reason) = self.settle_success(&key, &payload) {
                        states[idx] = RecordState::Pending;
                        stop = StopReason::Fatal(reason);
                        break;
                    }
                    records[idx].apply_payload(&payload);
                    states[idx] = RecordState::Enriched;
                    summary.newly_enriched += 1;
                    "enriched".to_string()
                }
                Err(EnrichmentError::Permanent(reason)) => {
                    let outcome = Outcome::PermanentFailure {
                        reason: reason.clone(),
                    };
                    if let Err(err) = self.checkpoints.record_outcome(&key, outcome) {
                        states[idx] = RecordState::Pending;
                        stop = StopReason::Fatal(format!("checkpoint write failed: {err:#}"));
                        break;
                    }
                    tracing::warn!(
                        award = %records[idx].name,
                        key = key.as_str(),
                        %reason,
                        "permanent failure"
                    );
                    states[idx] = RecordState::FailedPermanent;
                    summary.permanently_failed += 1;
                    format!("failed permanently: {}", truncate_string(&reason, 120))
                }
                Err(EnrichmentError::Transient(reason)) => {
                    tracing::warn!(
                        award = %records[idx].name,
                        attempts = outcome.attempts,
                        %reason,
                        "retries exhausted; record stays pending for the next run"
                    );
                    states[idx] = RecordState::FailedTransientPendingRetry;
                    summary.transient_pending_retry += 1;
                    deferred.insert(key.clone());
                    format!(
                        "failed after {} attempts, will retry next run",
                        outcome.attempts
                    )
                }
                Err(EnrichmentError::Fatal(reason)) => {
                    tracing::error!(award = %records[idx].name, %reason, "fatal lookup failure");
                    states[idx] = RecordState::Pending;
                    stop = StopReason::Fatal(reason);
                    break;
                }
            };

            self.write_snapshot(&records);
            if !self.options.quiet {
                eprintln!(
                    "enrich: [{}/{}] {} -> {}",
                    position + 1,
                    total,
                    records[idx].name,
                    label
                );
            }
        }

        self.write_snapshot(&records);
        summary.not_attempted = states
            .iter()
            .filter(|state| **state == RecordState::Pending)
            .count();
        tracing::info!(?stop, ?summary, "enrichment run finished");
        RunReport {
            records,
            states,
            summary,
            stop,
        }
    }

    /// Apply a checkpointed outcome to `record`. Returns false if `key` has
    /// no terminal outcome yet.
    fn restore(
        &self,
        record: &mut Record,
        key: &IdentityKey,
        state: &mut RecordState,
        summary: &mut RunSummary,
    ) -> bool {
        if !self.checkpoints.has_processed(key) {
            return false;
        }
        match self.checkpoints.outcome(key) {
            Some(Outcome::Success { payload }) => {
                if !record.is_enriched() {
                    record.apply_payload(payload);
                }
                *state = RecordState::Enriched;
                summary.already_enriched += 1;
            }
            Some(Outcome::PermanentFailure { .. }) | None => {
                *state = RecordState::FailedPermanent;
                summary.skipped_permanent += 1;
            }
        }
        true
    }

    fn settle_success(
        &mut self,
        key: &IdentityKey,
        payload: &EnrichmentPayload,
    ) -> std::result::Result<(), String> {
        let outcome = Outcome::Success {
            payload: payload.clone(),
        };
        self.checkpoints
            .record_outcome(key, outcome)
            .map_err(|err| format!("checkpoint write failed: {err:#}"))
    }

    fn write_snapshot(&self, records: &[Record]) {
        if let Err(err) = self.snapshot.write_snapshot(records) {
            tracing::warn!(error = %format!("{err:#}"), "progressive snapshot write failed");
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
