//! Durable per-record checkpoints.
//!
//! The log is JSON Lines, one entry per terminal outcome. An entry is written
//! and synced before `record_outcome` returns: a crash afterwards never
//! re-bills that record, a crash before leaves it eligible for retry.
use crate::enrich::EnrichmentPayload;
use crate::record::IdentityKey;
use crate::util::now_epoch_ms;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current schema version for checkpoint log entries.
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Terminal outcome of enriching one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Success { payload: EnrichmentPayload },
    PermanentFailure { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub schema_version: u32,
    pub run_id: String,
    pub recorded_at_epoch_ms: u64,
    pub key: IdentityKey,
    pub outcome: Outcome,
}

/// "Already processed" predicate plus durable outcome recording.
pub trait CheckpointStore {
    /// Terminal outcome recorded for `key` in this or an earlier run.
    fn outcome(&self, key: &IdentityKey) -> Option<&Outcome>;

    /// Persist `outcome` for `key`; must be durable before returning.
    fn record_outcome(&mut self, key: &IdentityKey, outcome: Outcome) -> Result<()>;

    fn has_processed(&self, key: &IdentityKey) -> bool {
        self.outcome(key).is_some()
    }
}

/// Checkpoint log backed by an append-only JSONL file.
pub struct JsonlCheckpointStore {
    path: PathBuf,
    run_id: String,
    file: File,
    outcomes: HashMap<IdentityKey, Outcome>,
}

impl JsonlCheckpointStore {
    /// Load the whole log into memory, then reopen it for appending.
    ///
    /// A torn final line (crash mid-append) is truncated away; a malformed
    /// line anywhere else is an error.
    pub fn open(path: &Path, run_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create checkpoint dir {}", parent.display()))?;
        }
        let mut outcomes = HashMap::new();
        let mut needs_newline = false;
        if path.exists() {
            let bytes =
                fs::read(path).with_context(|| format!("read checkpoint {}", path.display()))?;
            let keep = load_entries(&bytes, path, &mut outcomes)?;
            needs_newline = keep > 0 && bytes[keep - 1] != b'\n';
            if keep < bytes.len() {
                tracing::warn!(
                    path = %path.display(),
                    dropped_bytes = bytes.len() - keep,
                    "dropping torn trailing checkpoint entry"
                );
                let file = OpenOptions::new()
                    .write(true)
                    .open(path)
                    .with_context(|| format!("open {}", path.display()))?;
                file.set_len(keep as u64)
                    .with_context(|| format!("truncate {}", path.display()))?;
                file.sync_all()
                    .with_context(|| format!("sync {}", path.display()))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {}", path.display()))?;
        if needs_newline {
            file.write_all(b"\n")
                .with_context(|| format!("append {}", path.display()))?;
        }
        tracing::info!(
            path = %path.display(),
            entries = outcomes.len(),
            "loaded checkpoint log"
        );
        Ok(Self {
            path: path.to_path_buf(),
            run_id: run_id.to_string(),
            file,
            outcomes,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.outcomes.len()
    }
}

/// Parse complete lines into `outcomes`. Returns how many leading bytes
/// form a valid log; anything after is a torn tail.
fn load_entries(
    bytes: &[u8],
    path: &Path,
    outcomes: &mut HashMap<IdentityKey, Outcome>,
) -> Result<usize> {
    let mut offset = 0;
    let mut line_no = 0;
    while offset < bytes.len() {
        line_no += 1;
        let (line, next, terminated) = match bytes[offset..].iter().position(|b| *b == b'\n') {
            Some(pos) => (&bytes[offset..offset + pos], offset + pos + 1, true),
            None => (&bytes[offset..], bytes.len(), false),
        };
        if line.iter().all(u8::is_ascii_whitespace) {
            offset = next;
            continue;
        }
        match serde_json::from_slice::<CheckpointEntry>(line) {
            Ok(entry) if entry.schema_version == CHECKPOINT_SCHEMA_VERSION => {
                outcomes.insert(entry.key, entry.outcome);
            }
            Ok(entry) => {
                return Err(anyhow!(
                    "{}:{line_no}: unsupported checkpoint schema_version {}",
                    path.display(),
                    entry.schema_version
                ));
            }
            Err(_) if !terminated => return Ok(offset),
            Err(err) => {
                return Err(anyhow!(
                    "{}:{line_no}: malformed checkpoint entry: {err}",
                    path.display()
                ));
            }
        }
        offset = next;
    }
    Ok(offset)
}

impl CheckpointStore for JsonlCheckpointStore {
    fn outcome(&self, key: &IdentityKey) -> Option<&Outcome> {
        self.outcomes.get(key)
    }

    fn record_outcome(&mut self, key: &IdentityKey, outcome: Outcome) -> Result<()> {
        let entry = CheckpointEntry {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            recorded_at_epoch_ms: now_epoch_ms()?,
            key: key.clone(),
            outcome,
        };
        let mut line = serde_json::to_vec(&entry).context("serialize checkpoint entry")?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .with_context(|| format!("append {}", self.path.display()))?;
        self.file
            .sync_data()
            .with_context(|| format!("sync {}", self.path.display()))?;
        self.outcomes.insert(entry.key, entry.outcome);
        Ok(())
    }
}

/// In-memory store for tests; keeps the append order for assertions.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryCheckpointStore {
    pub(crate) log: Vec<(IdentityKey, Outcome)>,
    outcomes: HashMap<IdentityKey, Outcome>,
}

#[cfg(test)]
impl CheckpointStore for MemoryCheckpointStore {
    fn outcome(&self, key: &IdentityKey) -> Option<&Outcome> {
        self.outcomes.get(key)
    }

    fn record_outcome(&mut self, key: &IdentityKey, outcome: Outcome) -> Result<()> {
        self.log.push((key.clone(), outcome.clone()));
        self.outcomes.insert(key.clone(), outcome);
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
