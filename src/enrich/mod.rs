//! Enrichment client and response parsing.
//!
//! The client is a stateless adapter over the external lookup service; the
//! resumable loop that drives it lives in `workflow::orchestrator`.
mod client;
mod payload;

#[cfg(test)]
pub(crate) use client::classify_error;
pub use client::{Enricher, LookupClient};
pub use payload::{EnrichedFields, EnrichmentPayload};
