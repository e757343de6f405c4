//! Paged reads from, and batched writes to, the collaborative store.
//!
//! The paging contract is transport-agnostic: [`RemoteTable`] hands back one
//! page plus an opaque continuation cursor, and the helpers here walk pages
//! until the cursor runs out.
mod airtable;

pub use airtable::AirtableClient;

use crate::config::RemoteFieldNames;
use crate::error::RemoteError;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Most rows the store accepts in one update request.
pub const MAX_UPDATE_BATCH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteRow {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// One page of rows. `cursor` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<RemoteRow>,
    pub cursor: Option<String>,
}

/// Field values to write onto an existing row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowUpdate {
    pub id: String,
    pub fields: Map<String, Value>,
}

pub trait RemoteTable {
    /// Fetch the page that `cursor` points at (the first page for `None`).
    fn fetch_page(&self, table: &str, cursor: Option<&str>) -> Result<Page, RemoteError>;

    /// Apply one batch of at most [`MAX_UPDATE_BATCH`] updates; returns rows updated.
    fn update_batch(&self, table: &str, rows: &[RowUpdate]) -> Result<usize, RemoteError>;
}

/// Walk every page of `table`, passing each row to `visit` in order.
fn for_each_row(
    source: &dyn RemoteTable,
    table: &str,
    mut visit: impl FnMut(RemoteRow),
) -> Result<(), RemoteError> {
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    let mut rows = 0usize;
    loop {
        let page = source.fetch_page(table, cursor.as_deref())?;
        pages += 1;
        rows += page.rows.len();
        tracing::debug!(table, page = pages, rows = page.rows.len(), "fetched page");
        page.rows.into_iter().for_each(&mut visit);
        match page.cursor {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(RemoteError::Malformed(format!(
                    "page {pages} of {table} repeated its cursor"
                )));
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    tracing::info!(table, pages, rows, "read remote table");
    Ok(())
}

/// Every non-empty value of `field` across all pages, in the order received.
pub fn fetch_all(
    source: &dyn RemoteTable,
    table: &str,
    field: &str,
) -> Result<Vec<String>, RemoteError> {
    let mut values = Vec::new();
    for_each_row(source, table, |row| {
        if let Some(value) = row.fields.get(field).and_then(field_text) {
            values.push(value);
        }
    })?;
    Ok(values)
}

/// Records for every row with a non-empty name, carrying the row id.
pub fn fetch_awards(
    source: &dyn RemoteTable,
    table: &str,
    fields: &RemoteFieldNames,
) -> Result<Vec<Record>, RemoteError> {
    let mut records = Vec::new();
    for_each_row(source, table, |row| {
        let Some(name) = row.fields.get(&fields.name).and_then(field_text) else {
            return;
        };
        let text = |column: &str| {
            row.fields
                .get(column)
                .and_then(field_text)
                .unwrap_or_default()
        };
        let mut record = Record::named(name);
        record.organization = text(&fields.organization);
        record.registration_url = text(&fields.registration_url);
        record.categories = row
            .fields
            .get(&fields.categories)
            .map(field_list)
            .unwrap_or_default();
        record.remote_id = Some(row.id);
        records.push(record);
    })?;
    Ok(records)
}

/// Send `updates` in batches the store accepts; returns rows updated.
pub fn update_rows(
    sink: &dyn RemoteTable,
    table: &str,
    updates: &[RowUpdate],
) -> Result<usize, RemoteError> {
    let mut updated = 0;
    for (batch_no, batch) in updates.chunks(MAX_UPDATE_BATCH).enumerate() {
        updated += sink.update_batch(table, batch)?;
        tracing::debug!(table, batch = batch_no + 1, rows = batch.len(), "updated rows");
    }
    tracing::info!(table, updated, "wrote rows back");
    Ok(updated)
}

/// Curated columns for a record that came from the store; `None` otherwise.
pub fn row_update_for(record: &Record, fields: &RemoteFieldNames) -> Option<RowUpdate> {
    let id = record.remote_id.as_deref()?.trim();
    if id.is_empty() {
        return None;
    }
    let mut values = Map::new();
    values.insert(fields.name.clone(), Value::from(record.name.trim()));
    values.insert(fields.organization.clone(), Value::from(record.organization.trim()));
    values.insert(
        fields.registration_url.clone(),
        Value::from(record.registration_url.trim()),
    );
    values.insert(
        fields.categories.clone(),
        Value::from(record.categories.join(", ")),
    );
    if let Some(description) = record.description.as_deref() {
        values.insert(fields.description.clone(), Value::from(description));
    }
    Some(RowUpdate {
        id: id.to_string(),
        fields: values,
    })
}

fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Categories arrive either as a multi-select list or a comma-separated string.
fn field_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(field_text).collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
