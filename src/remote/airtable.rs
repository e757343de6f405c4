//! Airtable REST transport for [`RemoteTable`].
use super::{Page, RemoteRow, RemoteTable, RowUpdate};
use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::http::{self, FailureClass};
use crate::retry::{run_with_retry, RetryPolicy, SystemClock};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<RemoteRow>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    records: &'a [RowUpdate],
}

#[derive(Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    records: Vec<RemoteRow>,
}

pub struct AirtableClient {
    agent: ureq::Agent,
    config: RemoteConfig,
    api_key: String,
    retry: RetryPolicy,
}

impl AirtableClient {
    pub fn new(config: RemoteConfig, api_key: String, retry: RetryPolicy) -> Self {
        Self {
            agent: http::agent(config.timeout_secs),
            config,
            api_key,
            retry,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.base_id,
            encode_path_segment(table)
        )
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn with_retry<T>(
        &self,
        what: &str,
        operation: impl FnMut(u32) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let outcome = run_with_retry(
            &self.retry,
            &SystemClock,
            RemoteError::is_transient,
            operation,
        );
        if outcome.attempts > 1 {
            tracing::debug!(what, attempts = outcome.attempts, "remote call retried");
        }
        outcome.result
    }
}

impl RemoteTable for AirtableClient {
    fn fetch_page(&self, table: &str, cursor: Option<&str>) -> Result<Page, RemoteError> {
        let url = self.table_url(table);
        let what = format!("table {table}");
        let page_size = self.config.page_size.to_string();
        self.with_retry(&what, |_| {
            let start = Instant::now();
            let mut request = self
                .agent
                .get(&url)
                .header("Authorization", self.authorization())
                .query("pageSize", &page_size);
            if let Some(cursor) = cursor {
                request = request.query("offset", cursor);
            }
            let mut response = request.call().map_err(|err| remote_error(err, &what))?;
            let body: ListResponse = response
                .body_mut()
                .read_json()
                .map_err(|err| RemoteError::Malformed(err.to_string()))?;
            tracing::debug!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                rows = body.records.len(),
                more = body.offset.is_some(),
                "airtable page"
            );
            Ok(Page {
                rows: body.records,
                cursor: body.offset,
            })
        })
    }

    fn update_batch(&self, table: &str, rows: &[RowUpdate]) -> Result<usize, RemoteError> {
        let url = self.table_url(table);
        let what = format!("table {table}");
        self.with_retry(&what, |_| {
            let mut response = self
                .agent
                .patch(&url)
                .header("Authorization", self.authorization())
                .send_json(&UpdateRequest { records: rows })
                .map_err(|err| remote_error(err, &what))?;
            let body: UpdateResponse = response
                .body_mut()
                .read_json()
                .map_err(|err| RemoteError::Malformed(err.to_string()))?;
            Ok(body.records.len())
        })
    }
}

fn remote_error(err: ureq::Error, what: &str) -> RemoteError {
    match err {
        ureq::Error::StatusCode(status @ (401 | 403)) => RemoteError::Unauthorized(status),
        ureq::Error::StatusCode(404) => RemoteError::NotFound(what.to_string()),
        ureq::Error::StatusCode(status) => RemoteError::Status {
            status,
            what: what.to_string(),
        },
        other => match http::classify(&other) {
            FailureClass::Transient | FailureClass::Misconfigured => {
                RemoteError::Unreachable(other.to_string())
            }
            FailureClass::Unauthorized | FailureClass::Rejected => {
                RemoteError::Malformed(other.to_string())
            }
        },
    }
}

/// Percent-encode a table name for use as a URL path segment.
fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
