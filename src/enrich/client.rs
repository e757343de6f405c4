//! Lookup client: one chat-completions request per award.
//!
//! The client holds no per-call state, so the orchestrator can call it for
//! records in any order. Failures are classified from the HTTP status or the
//! transport error kind.
use super::payload::{parse_response, EnrichmentPayload};
use crate::config::LookupConfig;
use crate::error::EnrichmentError;
use crate::http::{self, FailureClass};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const AWARD_LOOKUP_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/award_lookup.md"
));

/// Anything that can turn a record into an enrichment payload.
pub trait Enricher {
    fn enrich(&self, record: &Record) -> Result<EnrichmentPayload, EnrichmentError>;
}

/// Build the single query sent for `record`.
pub fn build_query(record: &Record) -> Result<String, EnrichmentError> {
    let name = record.name.trim();
    if name.is_empty() {
        return Err(EnrichmentError::Permanent(
            "record has an empty award name".to_string(),
        ));
    }
    let organization = record.organization.trim();
    let organization_clause = if organization.is_empty() {
        String::new()
    } else {
        format!(" organized by {organization}")
    };
    Ok(AWARD_LOOKUP_PROMPT
        .replace("{award_name}", name)
        .replace("{organization_clause}", &organization_clause))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct LookupClient {
    agent: ureq::Agent,
    config: LookupConfig,
    api_key: String,
}

impl LookupClient {
    pub fn new(config: LookupConfig, api_key: String) -> Self {
        Self {
            agent: http::agent(config.timeout_secs),
            config,
            api_key,
        }
    }

    fn request(&self, query: &str) -> Result<String, EnrichmentError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: query,
            }],
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            frequency_penalty: self.config.frequency_penalty,
            stream: false,
        };
        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&body)
            .map_err(classify_error)?;
        let parsed: ChatResponse = response.body_mut().read_json().map_err(classify_error)?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            query_bytes = query.len(),
            "lookup complete"
        );
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| EnrichmentError::Permanent("response carried no content".to_string()))
    }
}

impl Enricher for LookupClient {
    fn enrich(&self, record: &Record) -> Result<EnrichmentPayload, EnrichmentError> {
        let query = build_query(record)?;
        let content = self.request(&query)?;
        parse_response(&content)
            .ok_or_else(|| EnrichmentError::Permanent("response content was blank".to_string()))
    }
}

/// Only a refusal of this particular query is permanent; anything that would
/// fail for every record stops the run instead of reaching the checkpoint.
pub(crate) fn classify_error(err: ureq::Error) -> EnrichmentError {
    match http::classify(&err) {
        FailureClass::Transient => EnrichmentError::Transient(err.to_string()),
        FailureClass::Unauthorized => {
            EnrichmentError::Fatal(format!("lookup service rejected credentials: {err}"))
        }
        FailureClass::Misconfigured => EnrichmentError::Fatal(format!(
            "lookup service endpoint or request is misconfigured: {err}"
        )),
        FailureClass::Rejected => EnrichmentError::Permanent(err.to_string()),
    }
}
