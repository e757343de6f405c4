//! Error taxonomy for the pipeline.
//!
//! Per-record failures are values the orchestrator converts into outcomes;
//! only `FatalConfiguration` is allowed to end a run early.
use thiserror::Error;

/// A record excluded from a merge because its identity key is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record #{index} from {source_label} rejected: {reason}")]
pub struct MergeRejection {
    pub source_label: &'static str,
    pub index: usize,
    pub reason: String,
}

/// Failure of a single enrichment call, classified by category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    /// Network, timeout or rate-limit condition; retry with backoff.
    #[error("transient enrichment failure: {0}")]
    Transient(String),
    /// The record itself cannot be enriched; never retry.
    #[error("permanent enrichment failure: {0}")]
    Permanent(String),
    /// Credentials missing or rejected; stop the run.
    #[error("fatal enrichment failure: {0}")]
    Fatal(String),
}

impl EnrichmentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Failure talking to the collaborative store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unreachable: {0}")]
    Unreachable(String),
    #[error("remote store rejected credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("remote store has no {0} (check base id and table name)")]
    NotFound(String),
    #[error("remote store returned HTTP {status} for {what}")]
    Status { status: u16, what: String },
    #[error("remote store response malformed: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Whether the failure means the store cannot be used at all this run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::Unauthorized(_) | Self::NotFound(_)
        )
    }

    /// Rate limits, server errors and dropped connections are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Missing credentials, rejected credentials or an unusable remote: the run
/// stops immediately and leaves durable state as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fatal configuration error: {0}")]
pub struct FatalConfigurationError(pub String);
