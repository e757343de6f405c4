//! Record collection persistence.
//!
//! Collections are written in full on every save. Writes go through a
//! temp file in the target directory and a rename, so readers polling the
//! progressive snapshot never observe a half-written file.
use crate::record::{Record, RecordEntry};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Load a JSON array of records (or bare award names).
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let bytes = fs::read(path).with_context(|| format!("read records {}", path.display()))?;
    let entries: Vec<RecordEntry> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse records JSON {}", path.display()))?;
    Ok(entries.into_iter().map(Record::from).collect())
}

/// Persist a record collection, replacing any previous file atomically.
pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    let text = serde_json::to_string_pretty(records).context("serialize records")?;
    write_atomic(path, text.as_bytes())
}

/// Write any serializable value as pretty JSON, atomically.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize JSON")?;
    write_atomic(path, text.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}
