use super::*;
use crate::checkpoint::MemoryCheckpointStore;
use crate::retry::tests::FakeClock;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// Enricher answering from per-award scripts; unscripted awards succeed.
#[derive(Default)]
struct ScriptedEnricher {
    scripts: RefCell<HashMap<String, VecDeque<Result<EnrichmentPayload, EnrichmentError>>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedEnricher {
    fn script(self, name: &str, replies: Vec<Result<EnrichmentPayload, EnrichmentError>>) -> Self {
        self.scripts
            .borrow_mut()
            .insert(name.to_string(), replies.into_iter().collect());
        self
    }

    fn calls_for(&self, name: &str) -> usize {
        self.calls.borrow().iter().filter(|call| *call == name).count()
    }

    fn total_calls(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Enricher for ScriptedEnricher {
    fn enrich(&self, record: &Record) -> Result<EnrichmentPayload, EnrichmentError> {
        self.calls.borrow_mut().push(record.name.clone());
        let scripted = self
            .scripts
            .borrow_mut()
            .get_mut(&record.name)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(payload_for(&record.name)))
    }
}

/// Sink that remembers how many records were enriched at each write.
#[derive(Default)]
struct RecordingSnapshot {
    enriched_counts: RefCell<Vec<usize>>,
}

impl SnapshotSink for RecordingSnapshot {
    fn write_snapshot(&self, records: &[Record]) -> Result<()> {
        let enriched = records.iter().filter(|r| r.is_enriched()).count();
        self.enriched_counts.borrow_mut().push(enriched);
        Ok(())
    }
}

struct FailingCheckpoints;

impl CheckpointStore for FailingCheckpoints {
    fn outcome(&self, _key: &IdentityKey) -> Option<&Outcome> {
        None
    }

    fn record_outcome(&mut self, _key: &IdentityKey, _outcome: Outcome) -> Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }
}

fn payload_for(name: &str) -> EnrichmentPayload {
    EnrichmentPayload::RawText(format!("about {name}"))
}

fn awards(names: &[&str]) -> Vec<Record> {
    names.iter().map(|name| Record::named(*name)).collect()
}

fn options() -> RunOptions {
    RunOptions {
        retry: RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(100),
        },
        ..RunOptions::default()
    }
}

fn run(
    enricher: &ScriptedEnricher,
    store: &mut dyn CheckpointStore,
    records: Vec<Record>,
    options: RunOptions,
) -> RunReport {
    let clock = FakeClock::default();
    let snapshot = RecordingSnapshot::default();
    Orchestrator::new(enricher, store, &snapshot, &clock, options).run(records)
}

fn transient() -> Result<EnrichmentPayload, EnrichmentError> {
    Err(EnrichmentError::Transient("503".to_string()))
}

#[test]
fn enriches_every_pending_record_in_order() {
    let enricher = ScriptedEnricher::default();
    let mut store = MemoryCheckpointStore::default();
    let report = run(&enricher, &mut store, awards(&["A", "B", "C"]), options());

    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.summary.newly_enriched, 3);
    assert_eq!(report.summary.service_calls, 3);
    assert!(report.records.iter().all(Record::is_enriched));
    assert_eq!(report.records[1].description.as_deref(), Some("about B"));
    let logged: Vec<_> = store.log.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(logged, vec!["a", "b", "c"]);
}

#[test]
fn limited_runs_resume_without_repeating_calls() {
    let names = ["A", "B", "C", "D", "E"];
    let mut store = MemoryCheckpointStore::default();

    let first = ScriptedEnricher::default();
    let report = run(
        &first,
        &mut store,
        awards(&names),
        RunOptions {
            limit: Some(2),
            ..options()
        },
    );
    assert_eq!(report.stop, StopReason::LimitReached);
    assert_eq!(report.summary.newly_enriched, 2);
    assert_eq!(report.summary.not_attempted, 3);
    assert_eq!(first.total_calls(), 2);

    // Second run starts from the unenriched input again.
    let second = ScriptedEnricher::default();
    let report = run(&second, &mut store, awards(&names), options());
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.summary.already_enriched, 2);
    assert_eq!(report.summary.newly_enriched, 3);
    assert_eq!(second.calls_for("A"), 0);
    assert_eq!(second.calls_for("B"), 0);
    assert_eq!(second.total_calls(), 3);
    // Restored records carry the checkpointed payload.
    assert_eq!(report.records[0].description.as_deref(), Some("about A"));
    assert!(report.records.iter().all(Record::is_enriched));
}

#[test]
fn fatal_stop_keeps_progress_and_next_run_finishes() {
    let names = ["A", "B", "C", "D"];
    let mut store = MemoryCheckpointStore::default();

    let first = ScriptedEnricher::default().script(
        "C",
        vec![Err(EnrichmentError::Fatal("invalid api key".to_string()))],
    );
    let report = run(&first, &mut store, awards(&names), options());
    assert_eq!(report.stop, StopReason::Fatal("invalid api key".to_string()));
    assert_eq!(report.states[2], RecordState::Pending);
    assert_eq!(report.summary.newly_enriched, 2);
    assert_eq!(report.summary.not_attempted, 2);
    assert_eq!(first.calls_for("C"), 1);
    assert_eq!(first.calls_for("D"), 0);

    let second = ScriptedEnricher::default();
    let report = run(&second, &mut store, awards(&names), options());
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(second.calls_for("A") + second.calls_for("B"), 0);
    assert_eq!(second.calls_for("C"), 1);
    assert_eq!(second.calls_for("D"), 1);

    let mut successes: Vec<_> = store
        .log
        .iter()
        .filter(|(_, outcome)| matches!(outcome, Outcome::Success { .. }))
        .map(|(key, _)| key.as_str().to_string())
        .collect();
    successes.sort();
    assert_eq!(successes, vec!["a", "b", "c", "d"]);
}

#[test]
fn permanent_failures_are_never_retried() {
    let mut store = MemoryCheckpointStore::default();
    let first = ScriptedEnricher::default().script(
        "Broken",
        vec![Err(EnrichmentError::Permanent("400 bad request".to_string()))],
    );
    let report = run(&first, &mut store, awards(&["Broken", "Fine"]), options());
    assert_eq!(report.states[0], RecordState::FailedPermanent);
    assert_eq!(report.summary.permanently_failed, 1);
    assert_eq!(first.calls_for("Broken"), 1);

    let second = ScriptedEnricher::default();
    let report = run(&second, &mut store, awards(&["Broken", "Fine"]), options());
    assert_eq!(second.total_calls(), 0);
    assert_eq!(report.summary.skipped_permanent, 1);
    assert_eq!(report.summary.already_enriched, 1);
    assert!(!report.records[0].is_enriched());
}

#[test]
fn exhausted_transient_failures_stay_pending_for_next_run() {
    let mut store = MemoryCheckpointStore::default();
    let first =
        ScriptedEnricher::default().script("Flaky", vec![transient(), transient(), transient()]);
    let report = run(&first, &mut store, awards(&["Flaky"]), options());

    assert_eq!(report.states[0], RecordState::FailedTransientPendingRetry);
    assert_eq!(report.summary.transient_pending_retry, 1);
    assert_eq!(report.summary.service_calls, 3);
    assert!(store.log.is_empty());

    let second = ScriptedEnricher::default();
    let report = run(&second, &mut store, awards(&["Flaky"]), options());
    assert_eq!(second.calls_for("Flaky"), 1);
    assert_eq!(report.states[0], RecordState::Enriched);
}

#[test]
fn transient_failure_recovers_within_budget() {
    let mut store = MemoryCheckpointStore::default();
    let enricher = ScriptedEnricher::default().script("Flaky", vec![transient()]);
    let clock = FakeClock::default();
    let snapshot = RecordingSnapshot::default();
    let report = Orchestrator::new(&enricher, &mut store, &snapshot, &clock, options())
        .run(awards(&["Flaky"]));

    assert_eq!(report.summary.newly_enriched, 1);
    assert_eq!(report.summary.service_calls, 2);
    assert_eq!(*clock.slept.borrow(), vec![Duration::from_millis(10)]);
}

#[test]
fn input_records_already_enriched_are_skipped() {
    let mut records = awards(&["Done", "Todo"]);
    records[0].apply_payload(&payload_for("Done"));
    let enricher = ScriptedEnricher::default();
    let mut store = MemoryCheckpointStore::default();
    let report = run(&enricher, &mut store, records, options());

    assert_eq!(enricher.calls_for("Done"), 0);
    assert_eq!(report.summary.already_enriched, 1);
    assert_eq!(report.summary.newly_enriched, 1);
}

#[test]
fn duplicate_names_are_enriched_once() {
    let enricher = ScriptedEnricher::default();
    let mut store = MemoryCheckpointStore::default();
    let report = run(
        &enricher,
        &mut store,
        awards(&["Hugo Award", "hugo  award"]),
        options(),
    );

    assert_eq!(enricher.total_calls(), 1);
    assert!(report.records.iter().all(Record::is_enriched));
}

#[test]
fn blank_names_fail_without_a_service_call() {
    let enricher = ScriptedEnricher::default();
    let mut store = MemoryCheckpointStore::default();
    let report = run(&enricher, &mut store, awards(&["  ", "Real"]), options());

    assert_eq!(report.states[0], RecordState::FailedPermanent);
    assert_eq!(enricher.total_calls(), 1);
    assert_eq!(store.log.len(), 1);
}

#[test]
fn snapshot_is_written_after_each_outcome() {
    let enricher = ScriptedEnricher::default();
    let mut store = MemoryCheckpointStore::default();
    let clock = FakeClock::default();
    let snapshot = RecordingSnapshot::default();
    Orchestrator::new(&enricher, &mut store, &snapshot, &clock, options())
        .run(awards(&["A", "B", "C"]));

    // One write per record plus the closing write.
    assert_eq!(*snapshot.enriched_counts.borrow(), vec![1, 2, 3, 3]);
}

#[test]
fn request_interval_spaces_out_calls() {
    let enricher = ScriptedEnricher::default();
    let mut store = MemoryCheckpointStore::default();
    let clock = FakeClock::default();
    let snapshot = RecordingSnapshot::default();
    let options = RunOptions {
        request_interval: Duration::from_millis(500),
        ..options()
    };
    Orchestrator::new(&enricher, &mut store, &snapshot, &clock, options)
        .run(awards(&["A", "B", "C"]));

    assert_eq!(*clock.slept.borrow(), vec![Duration::from_millis(500); 2]);
}

#[test]
fn checkpoint_write_failure_stops_the_run() {
    let enricher = ScriptedEnricher::default();
    let mut store = FailingCheckpoints;
    let report = run(&enricher, &mut store, awards(&["A", "B"]), options());

    match &report.stop {
        StopReason::Fatal(reason) => assert!(reason.contains("disk full")),
        other => panic!("unexpected stop: {other:?}"),
    }
    assert_eq!(enricher.total_calls(), 1);
    assert!(!report.records[0].is_enriched());
    assert_eq!(report.summary.not_attempted, 2);
}

/// Every lookup hits an endpoint that answers with `status`.
struct MisconfiguredEndpoint {
    status: u16,
    calls: RefCell<usize>,
}

impl Enricher for MisconfiguredEndpoint {
    fn enrich(&self, _record: &Record) -> Result<EnrichmentPayload, EnrichmentError> {
        *self.calls.borrow_mut() += 1;
        Err(crate::enrich::classify_error(ureq::Error::StatusCode(
            self.status,
        )))
    }
}

#[test]
fn misconfigured_endpoint_leaves_checkpoint_empty() {
    let names = ["Hugo Award", "Nebula Award", "Booker Prize"];
    let mut store = MemoryCheckpointStore::default();
    for status in [404, 400] {
        let endpoint = MisconfiguredEndpoint {
            status,
            calls: RefCell::new(0),
        };
        let clock = FakeClock::default();
        let snapshot = RecordingSnapshot::default();
        let report = Orchestrator::new(&endpoint, &mut store, &snapshot, &clock, options())
            .run(awards(&names));

        assert!(matches!(report.stop, StopReason::Fatal(_)), "status {status}");
        assert_eq!(*endpoint.calls.borrow(), 1);
        assert_eq!(report.summary.not_attempted, 3);
        assert!(store.log.is_empty());
    }

    let fixed = ScriptedEnricher::default();
    let report = run(&fixed, &mut store, awards(&names), options());
    assert_eq!(report.summary.newly_enriched, 3);
}

#[test]
fn duplicates_of_a_transient_failure_are_not_retried_in_the_same_run() {
    let mut store = MemoryCheckpointStore::default();
    let enricher =
        ScriptedEnricher::default().script("Flaky", vec![transient(), transient(), transient()]);
    let report = run(
        &enricher,
        &mut store,
        awards(&["Flaky", "Other", "flaky"]),
        options(),
    );

    assert_eq!(enricher.calls_for("Flaky") + enricher.calls_for("flaky"), 3);
    assert_eq!(report.states[2], RecordState::FailedTransientPendingRetry);
    assert_eq!(report.summary.transient_pending_retry, 2);
    assert_eq!(report.summary.service_calls, 4);
}
